use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use sound_codec::sound::{wav, Registry, SeekableSource, SniffReader};
use sound_codec::{config, logging, Cli, Options};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let options = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Options::default(),
    };
    let options = cli.merge_into_options(options)?;

    logging::init(options.log_level).context("Failed to install logging")?;
    log::info!("wavdump starting");
    log::debug!("Configuration: {:?}", options);

    if cli.convert.is_some() && cli.files.len() != 1 {
        anyhow::bail!("--convert takes exactly one input file");
    }

    let registry = Registry::with_defaults().context("Failed to register built-in formats")?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut failures = 0;

    for path in &cli.files {
        let result = open(&registry, path).and_then(|mut src| match &cli.convert {
            Some(dst) => convert(src.as_mut(), cli.seek, dst, &options),
            None => dump(src.as_mut(), cli.seek, &options, &mut out),
        });
        match result {
            Ok(frames) => log::info!("{}: {} frames", path.display(), frames),
            Err(e) => {
                log::error!("{}: {:#}", path.display(), e);
                failures += 1;
            }
        }
    }
    out.flush()?;

    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Resolve the format by content, falling back to the file extension
fn open(registry: &Registry, path: &Path) -> Result<Box<dyn SeekableSource>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = SniffReader::new(file);
    let desc = match registry.resolve_by_sniff(&mut reader, None) {
        Ok(desc) => desc,
        Err(e) => {
            log::debug!("{}: {}, trying extension", path.display(), e);
            registry.resolve_by_path(path, None)?
        }
    };
    log::info!("{}: {} format", path.display(), desc.name());
    Ok(desc.open_seeking_decoder(reader)?)
}

fn start_at(src: &mut dyn SeekableSource, seek: Option<u64>) -> Result<()> {
    if let Some(frame) = seek {
        src.seek(frame)
            .with_context(|| format!("Failed to seek to frame {}", frame))?;
    }
    Ok(())
}

fn dump(
    src: &mut dyn SeekableSource,
    seek: Option<u64>,
    opts: &Options,
    out: &mut dyn Write,
) -> Result<u64> {
    start_at(src, seek)?;
    if opts.show_info {
        writeln!(
            out,
            "# {} channels, {}, {}, {} frames, {:?}",
            src.channels(),
            src.sample_rate(),
            src.sample_kind()
                .codec()
                .map_or_else(|| "any".to_string(), |c| c.to_string()),
            src.frames(),
            src.duration()
        )?;
    }

    let channels = src.channels();
    let mut buf = vec![0.0f64; opts.buffer_frames * channels];
    let mut total = 0u64;
    loop {
        let n = match src.receive(&mut buf) {
            Ok(n) => n,
            Err(e) if e.is_end_of_stream() => break,
            Err(e) => return Err(e.into()),
        };
        // channel-major: one block per channel
        for v in &buf[..n * channels] {
            writeln!(out, "{}", v)?;
        }
        total += n as u64;
    }
    src.close()?;
    Ok(total)
}

fn convert(
    src: &mut dyn SeekableSource,
    seek: Option<u64>,
    dst: &Path,
    opts: &Options,
) -> Result<u64> {
    start_at(src, seek)?;
    let frames = wav::save(&mut *src, dst, opts.sample_codec)
        .with_context(|| format!("Failed to write {}", dst.display()))?;
    src.close()?;
    Ok(frames)
}
