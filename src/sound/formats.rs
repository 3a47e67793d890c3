//! Sample encodings and stream shapes
//!
//! `SampleCodec` converts between the raw byte groups stored in a container
//! and normalized floating amplitudes in `[-1.0, 1.0)`.

use std::fmt;
use std::time::Duration;

/// Byte encoding of a single channel sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleCodec {
    /// 8-bit unsigned, offset by 128
    U8,
    /// 16-bit signed little-endian
    S16LE,
    /// 24-bit signed little-endian
    S24LE,
    /// 32-bit signed little-endian
    S32LE,
    /// 32-bit IEEE float little-endian
    F32LE,
}

impl SampleCodec {
    /// All codecs, narrowest first
    pub const ALL: [SampleCodec; 5] = [
        SampleCodec::U8,
        SampleCodec::S16LE,
        SampleCodec::S24LE,
        SampleCodec::S32LE,
        SampleCodec::F32LE,
    ];

    /// Returns the number of bytes per sample
    pub fn bytes(&self) -> usize {
        match self {
            SampleCodec::U8 => 1,
            SampleCodec::S16LE => 2,
            SampleCodec::S24LE => 3,
            SampleCodec::S32LE | SampleCodec::F32LE => 4,
        }
    }

    /// Returns the number of significant bits per sample
    pub fn bits(&self) -> u16 {
        self.bytes() as u16 * 8
    }

    /// Returns true for floating point encodings
    pub fn is_float(&self) -> bool {
        matches!(self, SampleCodec::F32LE)
    }

    /// Full scale of an integer codec (2^(bits-1))
    fn scale(&self) -> f64 {
        (1u64 << (self.bits() - 1)) as f64
    }

    /// Decode one sample from the first `bytes()` bytes of `src`.
    ///
    /// # Panics
    /// Panics if `src` is shorter than `bytes()`.
    pub fn decode(&self, src: &[u8]) -> f64 {
        match self {
            SampleCodec::U8 => (src[0] as f64 - 128.0) / self.scale(),
            SampleCodec::S16LE => i16::from_le_bytes([src[0], src[1]]) as f64 / self.scale(),
            SampleCodec::S24LE => {
                // sign-extend through the top byte
                let v = i32::from_le_bytes([0, src[0], src[1], src[2]]) >> 8;
                v as f64 / self.scale()
            }
            SampleCodec::S32LE => {
                i32::from_le_bytes([src[0], src[1], src[2], src[3]]) as f64 / self.scale()
            }
            SampleCodec::F32LE => f32::from_le_bytes([src[0], src[1], src[2], src[3]]) as f64,
        }
    }

    /// Encode `value` into the first `bytes()` bytes of `dst`.
    ///
    /// Integer codecs round to nearest and clamp to the representable range.
    ///
    /// # Panics
    /// Panics if `dst` is shorter than `bytes()`.
    pub fn encode(&self, value: f64, dst: &mut [u8]) {
        if self.is_float() {
            dst[..4].copy_from_slice(&(value as f32).to_le_bytes());
            return;
        }
        let scale = self.scale();
        let q = (value * scale).round().clamp(-scale, scale - 1.0) as i64;
        match self {
            SampleCodec::U8 => dst[0] = (q + 128) as u8,
            SampleCodec::S16LE => dst[..2].copy_from_slice(&(q as i16).to_le_bytes()),
            SampleCodec::S24LE => dst[..3].copy_from_slice(&(q as i32).to_le_bytes()[..3]),
            SampleCodec::S32LE => dst[..4].copy_from_slice(&(q as i32).to_le_bytes()),
            SampleCodec::F32LE => unreachable!(),
        }
    }

    /// Largest round-trip error for amplitudes inside the representable range
    pub fn quantization_error(&self) -> f64 {
        if self.is_float() {
            f32::EPSILON as f64
        } else {
            0.5 / self.scale()
        }
    }
}

impl fmt::Display for SampleCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleCodec::U8 => "u8",
            SampleCodec::S16LE => "s16le",
            SampleCodec::S24LE => "s24le",
            SampleCodec::S32LE => "s32le",
            SampleCodec::F32LE => "f32le",
        };
        f.write_str(name)
    }
}

/// Sample encoding requested from or reported by a codec.
///
/// Perceptual codecs have no fixed sample encoding and report `Any`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    Any,
    Codec(SampleCodec),
}

impl SampleKind {
    /// The concrete codec, if any
    pub fn codec(&self) -> Option<SampleCodec> {
        match self {
            SampleKind::Any => None,
            SampleKind::Codec(c) => Some(*c),
        }
    }
}

impl From<SampleCodec> for SampleKind {
    fn from(codec: SampleCodec) -> Self {
        SampleKind::Codec(codec)
    }
}

/// Sampling frequency in Hertz (always positive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SampleRate(u32);

impl SampleRate {
    pub const CD: SampleRate = SampleRate(44100);

    /// Returns `None` for a zero rate
    pub fn new(hz: u32) -> Option<Self> {
        (hz > 0).then_some(SampleRate(hz))
    }

    pub fn hz(&self) -> u32 {
        self.0
    }

    /// Duration of `frames` frames, exact to the nanosecond (truncated)
    pub fn duration_of(&self, frames: u64) -> Duration {
        let nanos = frames as u128 * 1_000_000_000 / self.0 as u128;
        Duration::new(
            (nanos / 1_000_000_000) as u64,
            (nanos % 1_000_000_000) as u32,
        )
    }

    /// Number of whole frames elapsed in `d`
    pub fn frames_in(&self, d: Duration) -> u64 {
        (d.as_nanos() * self.0 as u128 / 1_000_000_000) as u64
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz", self.0)
    }
}

/// Channel count and sample rate of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Form {
    pub channels: usize,
    pub sample_rate: SampleRate,
}

impl Form {
    pub fn new(channels: usize, sample_rate: SampleRate) -> Self {
        Self {
            channels,
            sample_rate,
        }
    }

    /// Mono at 44.1kHz
    pub fn mono_cd() -> Self {
        Self::new(1, SampleRate::CD)
    }

    /// Stereo at 44.1kHz
    pub fn stereo_cd() -> Self {
        Self::new(2, SampleRate::CD)
    }
}
