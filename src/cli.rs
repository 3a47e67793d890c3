use std::path::PathBuf;

use crate::config::{parse_buffer_frames, parse_log_level, parse_sample_codec, Options};
use anyhow::{Context, Result};
use clap::Parser;

/// Dump the samples of WAV files as normalized amplitudes
#[derive(Parser, Debug, Default)]
#[command(name = "wavdump")]
#[command(version = "0.8.0")]
#[command(about = "Decode sound files and print one amplitude per line", long_about = None)]
pub struct Cli {
    /// Sound files to dump
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Configuration file path
    #[arg(short, long, value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Frames decoded per batch
    #[arg(short, long, value_name = "FRAMES")]
    pub buffer_frames: Option<String>,

    /// Log level (nothing, error, warning, info, debug, all)
    #[arg(short, long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Print format and duration before the samples
    #[arg(short, long)]
    pub info: bool,

    /// Start at this frame instead of the beginning
    #[arg(short, long, value_name = "FRAME")]
    pub seek: Option<u64>,

    /// Codec for `--convert` output (u8, s16le, s24le, s32le, f32le)
    #[arg(long, value_name = "CODEC")]
    pub codec: Option<String>,

    /// Re-encode the input to this WAV file instead of printing samples
    #[arg(long, value_name = "OUT")]
    pub convert: Option<PathBuf>,
}

impl Cli {
    /// Merge CLI arguments into the options struct
    pub fn merge_into_options(&self, mut opts: Options) -> Result<Options> {
        if let Some(ref frames) = self.buffer_frames {
            opts.buffer_frames = parse_buffer_frames(frames).context("Invalid --buffer-frames")?;
        }

        if let Some(ref level) = self.log_level {
            opts.log_level = parse_log_level(level)?;
        }

        if let Some(ref codec) = self.codec {
            opts.sample_codec = parse_sample_codec(codec)?;
        }

        if self.info {
            opts.show_info = true;
        }

        Ok(opts)
    }
}
