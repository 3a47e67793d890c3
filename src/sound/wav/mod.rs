//! RIFF/WAVE codec
//!
//! Uncompressed PCM (8, 16, 24 and 32 bit) and 32-bit IEEE float samples.
//! `riff` walks the container, `format` handles the `fmt ` chunk and the
//! sessions live in `decoder` and `encoder`.

pub mod decoder;
pub mod encoder;
pub mod format;
pub mod riff;

use std::fs::File;
use std::io::Read;
use std::path::Path;

pub use decoder::{BufferCursor, WavDecoder};
pub use encoder::WavEncoder;
pub use format::Format;

use super::error::CodecResult;
use super::formats::{Form, SampleCodec, SampleKind};
use super::registry::FormatDescriptor;
use super::session::{self, ReadSeek, SeekableSource, Sink, Source, WriteSeek};
use super::sniff::Peek;

/// Provider tag of the built-in WAV sessions
pub const PROVIDER: &str = "sound_codec::wav";

pub const NAME: &str = "wav";

pub const PRIORITY: i32 = 1000;

pub const EXTENSIONS: [&str; 2] = ["wav", "wave"];

/// Frames per decode/encode buffer unless configured otherwise
pub const DEFAULT_BUFFER_FRAMES: usize = 1024;

/// Matches a RIFF container of form type WAVE
pub fn sniff(p: &mut dyn Peek) -> bool {
    match p.peek(riff::CONTAINER_HEADER_SIZE as usize) {
        Ok(b) => b.len() == 12 && b[..4] == riff::RIFF_ID && b[8..12] == riff::WAVE_ID,
        Err(e) => {
            log::debug!("wav: sniff failed: {}", e);
            false
        }
    }
}

fn open_decoder(r: Box<dyn Read + Send>) -> CodecResult<Box<dyn Source>> {
    Ok(Box::new(WavDecoder::open(r)?))
}

fn open_seeking_decoder(r: Box<dyn ReadSeek + Send>) -> CodecResult<Box<dyn SeekableSource>> {
    Ok(Box::new(WavDecoder::open_seekable(r)?))
}

fn open_encoder(
    w: Box<dyn WriteSeek + Send>,
    form: Form,
    kind: SampleKind,
) -> CodecResult<Box<dyn Sink>> {
    let codec = kind.codec().unwrap_or(SampleCodec::S16LE);
    let format = Format::from_form(form, codec)?;
    Ok(Box::new(WavEncoder::new(format, w)?))
}

/// Registry entry for WAV
pub fn descriptor() -> FormatDescriptor {
    FormatDescriptor::new(NAME)
        .with_priority(PRIORITY)
        .with_extensions(&EXTENSIONS)
        .with_sniff(sniff)
        .with_default_kind(SampleKind::Codec(SampleCodec::S16LE))
        .with_decoder(PROVIDER, open_decoder)
        .with_seeking_decoder(PROVIDER, open_seeking_decoder)
        .with_encoder(PROVIDER, open_encoder)
}

/// Open the WAV file at `path` for seekable decoding
pub fn load<P: AsRef<Path>>(path: P) -> CodecResult<WavDecoder<File>> {
    let file = File::open(path.as_ref())?;
    WavDecoder::open_seekable(file)
}

/// Write every frame of `src` to a new WAV file at `path`.
///
/// Returns the number of frames written. `src` is not closed.
pub fn save<S, P>(src: &mut S, path: P, codec: SampleCodec) -> CodecResult<u64>
where
    S: Source + ?Sized,
    P: AsRef<Path>,
{
    let format = Format::from_form(Form::new(src.channels(), src.sample_rate()), codec)?;
    let file = File::create(path.as_ref())?;
    let mut enc = WavEncoder::new(format, file)?;
    let frames = session::copy(&mut enc, src, DEFAULT_BUFFER_FRAMES)?;
    enc.close()?;
    log::info!("wrote {} frames to {}", frames, path.as_ref().display());
    Ok(frames)
}
