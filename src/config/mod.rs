pub mod propfile;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::logging::LogLevel;
use crate::sound::formats::SampleCodec;
use crate::sound::wav::DEFAULT_BUFFER_FRAMES;

/// Largest accepted decode buffer, in frames
pub const MAX_BUFFER_FRAMES: usize = 1 << 20;

/// Application options that can be set via CLI or config file
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Frames per decode batch
    pub buffer_frames: usize,
    pub log_level: LogLevel,
    /// Codec used when writing WAV output
    pub sample_codec: SampleCodec,
    /// Print format and duration before the samples
    pub show_info: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            buffer_frames: DEFAULT_BUFFER_FRAMES,
            log_level: LogLevel::default(),
            sample_codec: SampleCodec::S16LE,
            show_info: false,
        }
    }
}

/// Load options from a property file, starting from the defaults.
///
/// Keys are matched case-insensitively. Unknown keys are logged and ignored.
pub fn load_config(path: &Path) -> Result<Options> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_config(&data).with_context(|| format!("Invalid config file {}", path.display()))
}

/// Parse options from property file content
pub fn parse_config(data: &str) -> Result<Options> {
    let mut opts = Options::default();
    let mut result = Ok(());

    propfile::parse_propfile(data, &mut |key, value| {
        if result.is_err() {
            return;
        }
        result = apply(&mut opts, key, value);
    });

    result.map(|_| opts)
}

fn apply(opts: &mut Options, key: &str, value: &str) -> Result<()> {
    match key.to_lowercase().as_str() {
        "buffer_frames" => opts.buffer_frames = parse_buffer_frames(value)?,
        "log_level" => opts.log_level = parse_log_level(value)?,
        "sample_codec" => opts.sample_codec = parse_sample_codec(value)?,
        "show_info" => opts.show_info = parse_bool(value)?,
        _ => log::warn!("Ignoring unknown config key: {}", key),
    }
    Ok(())
}

/// Parse a buffer size in frames (1 to `MAX_BUFFER_FRAMES`)
pub fn parse_buffer_frames(s: &str) -> Result<usize> {
    let frames: usize = s.trim().parse().context("Invalid buffer size")?;
    if frames == 0 || frames > MAX_BUFFER_FRAMES {
        anyhow::bail!("Buffer size out of range (1 to {})", MAX_BUFFER_FRAMES);
    }
    Ok(frames)
}

/// Parse a sample codec name such as `s16le`
pub fn parse_sample_codec(s: &str) -> Result<SampleCodec> {
    let name = s.trim().to_lowercase();
    SampleCodec::ALL
        .iter()
        .copied()
        .find(|c| c.to_string() == name)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Invalid sample codec: {}. Valid options: u8, s16le, s24le, s32le, f32le",
                s
            )
        })
}

/// Parse a log level name or number
pub fn parse_log_level(s: &str) -> Result<LogLevel> {
    LogLevel::from_name(s).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid log level: {}. Valid options: nothing, error, warning, info, debug, all",
            s
        )
    })
}

fn parse_bool(s: &str) -> Result<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => anyhow::bail!("Invalid boolean value: {}", s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_buffer_frames() {
        assert_eq!(parse_buffer_frames("256").unwrap(), 256);
        assert_eq!(parse_buffer_frames(" 1 ").unwrap(), 1);
        assert!(parse_buffer_frames("0").is_err());
        assert!(parse_buffer_frames("-4").is_err());
        assert!(parse_buffer_frames("2000000").is_err());
        assert!(parse_buffer_frames("lots").is_err());
    }

    #[test]
    fn test_parse_sample_codec() {
        assert_eq!(parse_sample_codec("u8").unwrap(), SampleCodec::U8);
        assert_eq!(parse_sample_codec("S24LE").unwrap(), SampleCodec::S24LE);
        assert_eq!(parse_sample_codec("f32le").unwrap(), SampleCodec::F32LE);
        assert!(parse_sample_codec("s12le").is_err());
    }

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("info").unwrap(), LogLevel::Info);
        assert!(parse_log_level("chatty").is_err());
    }

    #[test]
    fn test_options_default() {
        let opts = Options::default();
        assert_eq!(opts.buffer_frames, 1024);
        assert_eq!(opts.sample_codec, SampleCodec::S16LE);
        assert_eq!(opts.log_level, LogLevel::Warning);
        assert!(!opts.show_info);
    }

    #[test]
    fn test_parse_config() {
        let opts = parse_config(
            "# wavdump settings\nBUFFER_FRAMES = 64\nlog_level=debug\nshow_info = yes\nfavorite_color = blue\n",
        )
        .unwrap();
        assert_eq!(opts.buffer_frames, 64);
        assert_eq!(opts.log_level, LogLevel::Debug);
        assert!(opts.show_info);
        assert_eq!(opts.sample_codec, SampleCodec::S16LE);
    }

    #[test]
    fn test_parse_config_bad_value() {
        assert!(parse_config("buffer_frames = 0\n").is_err());
        assert!(parse_config("show_info = perhaps\n").is_err());
    }

    #[test]
    fn test_load_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sample_codec = s32le").unwrap();
        let opts = load_config(file.path()).unwrap();
        assert_eq!(opts.sample_codec, SampleCodec::S32LE);

        assert!(load_config(Path::new("/nonexistent/wavdump.cfg")).is_err());
    }
}
