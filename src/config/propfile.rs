// Property file parser
// Parses simple `key = value` files with `#` comments

/// Parse property file content, invoking `handler` for each key-value pair.
///
/// Keys and values are trimmed and key case is preserved. A `#` starts a
/// comment that runs to the end of the line, including after a value. Lines
/// without `=` are skipped with a warning.
pub fn parse_propfile(data: &str, handler: &mut dyn FnMut(&str, &str)) {
    for (lineno, line) in data.lines().enumerate() {
        let line = match line.find('#') {
            Some(at) => &line[..at],
            None => line,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once('=') {
            Some((key, value)) => {
                let key = key.trim();
                if key.is_empty() {
                    log::warn!("line {}: value without key", lineno + 1);
                    continue;
                }
                handler(key, value.trim());
            }
            None => log::warn!("line {}: key without value", lineno + 1),
        }
    }
}
