//! Sound format registry and codecs
//!
//! # Architecture
//!
//! - `Registry` maps names, extensions and content sniffers to
//!   `FormatDescriptor`s, each carrying the session constructors of one
//!   provider
//! - `Source`/`SeekableSource`/`Sink` are the decode and encode sessions
//! - `SampleCodec` converts between normalized amplitudes and sample bytes
//! - `wav` is the built-in RIFF/WAVE codec

pub mod error;
pub mod formats;
pub mod registry;
pub mod session;
pub mod sniff;
pub mod wav;

pub use error::{CodecError, CodecResult};
pub use formats::{Form, SampleCodec, SampleKind, SampleRate};
pub use registry::{Capabilities, Capability, FormatDescriptor, Registry};
pub use session::{copy, RandomAccess, SeekableSource, Sink, Source};
pub use sniff::{Peek, SniffReader};
pub use wav::{WavDecoder, WavEncoder};
