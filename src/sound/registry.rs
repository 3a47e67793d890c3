// Sound format registry
//
// Provides `Registry`, which maps format names, file extensions and content
// sniffers to `FormatDescriptor`s. Each descriptor carries up to four session
// constructors (decoder, seeking decoder, encoder, random access), all of
// which must come from the same provider.

use std::fmt;
use std::io::{Read, Seek, Write};
use std::path::Path;

use super::error::{CodecError, CodecResult};
use super::formats::{Form, SampleKind};
use super::session::{
    self, RandomAccess, ReadSeek, ReadWriteSeek, SeekableSource, Sink, Source, WriteSeek,
};
use super::sniff::{Peek, SniffReader};

/// Content predicate; inspects leading bytes through `Peek` only.
pub type SniffFn = fn(&mut dyn Peek) -> bool;

pub type DecoderFn = fn(Box<dyn Read + Send>) -> CodecResult<Box<dyn Source>>;

pub type SeekingDecoderFn = fn(Box<dyn ReadSeek + Send>) -> CodecResult<Box<dyn SeekableSource>>;

pub type EncoderFn = fn(Box<dyn WriteSeek + Send>, Form, SampleKind) -> CodecResult<Box<dyn Sink>>;

pub type RandomAccessFn =
    fn(Box<dyn ReadWriteSeek + Send>, Form, SampleKind) -> CodecResult<Box<dyn RandomAccess>>;

/// A session constructor tagged with the provider that implements it
#[derive(Clone, Copy)]
pub struct Capability<F> {
    provider: &'static str,
    ctor: F,
}

impl<F: Copy> Capability<F> {
    pub fn new(provider: &'static str, ctor: F) -> Self {
        Capability { provider, ctor }
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    pub fn ctor(&self) -> F {
        self.ctor
    }
}

impl<F> fmt::Debug for Capability<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

/// Optional session constructors of a format
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    pub decoder: Option<Capability<DecoderFn>>,
    pub seeking_decoder: Option<Capability<SeekingDecoderFn>>,
    pub encoder: Option<Capability<EncoderFn>>,
    pub random_access: Option<Capability<RandomAccessFn>>,
}

impl Capabilities {
    /// Provider tags of the present capabilities, in declaration order.
    pub fn providers(&self) -> Vec<&'static str> {
        [
            self.decoder.map(|c| c.provider),
            self.seeking_decoder.map(|c| c.provider),
            self.encoder.map(|c| c.provider),
            self.random_access.map(|c| c.provider),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn is_uniform(&self) -> bool {
        let providers = self.providers();
        providers.windows(2).all(|w| w[0] == w[1])
    }
}

/// Describes one sound format and how to open sessions for it.
///
/// Lower `priority` values are preferred when several formats match.
#[derive(Clone)]
pub struct FormatDescriptor {
    name: String,
    priority: i32,
    extensions: Vec<String>,
    sniff: Option<SniffFn>,
    default_kind: SampleKind,
    capabilities: Capabilities,
}

impl FormatDescriptor {
    pub fn new(name: &str) -> Self {
        FormatDescriptor {
            name: name.to_string(),
            priority: 0,
            extensions: Vec::new(),
            sniff: None,
            default_kind: SampleKind::Any,
            capabilities: Capabilities::default(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the file extensions, without leading dot
    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| normalize_extension(e)).collect();
        self
    }

    pub fn with_sniff(mut self, sniff: SniffFn) -> Self {
        self.sniff = Some(sniff);
        self
    }

    pub fn with_default_kind(mut self, kind: SampleKind) -> Self {
        self.default_kind = kind;
        self
    }

    pub fn with_decoder(mut self, provider: &'static str, ctor: DecoderFn) -> Self {
        self.capabilities.decoder = Some(Capability::new(provider, ctor));
        self
    }

    pub fn with_seeking_decoder(mut self, provider: &'static str, ctor: SeekingDecoderFn) -> Self {
        self.capabilities.seeking_decoder = Some(Capability::new(provider, ctor));
        self
    }

    pub fn with_encoder(mut self, provider: &'static str, ctor: EncoderFn) -> Self {
        self.capabilities.encoder = Some(Capability::new(provider, ctor));
        self
    }

    pub fn with_random_access(mut self, provider: &'static str, ctor: RandomAccessFn) -> Self {
        self.capabilities.random_access = Some(Capability::new(provider, ctor));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn default_kind(&self) -> SampleKind {
        self.default_kind
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Provider of the format's sessions, `None` if it has no capability
    pub fn provider(&self) -> Option<&'static str> {
        self.capabilities.providers().first().copied()
    }

    pub fn has_decoder(&self) -> bool {
        self.capabilities.decoder.is_some()
    }

    pub fn has_seeking_decoder(&self) -> bool {
        self.capabilities.seeking_decoder.is_some()
    }

    pub fn has_encoder(&self) -> bool {
        self.capabilities.encoder.is_some()
    }

    pub fn has_random_access(&self) -> bool {
        self.capabilities.random_access.is_some()
    }

    fn matches_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| *e == ext)
    }

    fn matches_provider(&self, provider: Option<&str>) -> bool {
        match provider {
            None => true,
            Some(p) => self.provider() == Some(p),
        }
    }

    /// Run the sniff predicate; formats without one never match.
    pub fn sniff(&self, peek: &mut dyn Peek) -> bool {
        self.sniff.map_or(false, |f| f(peek))
    }

    pub fn open_decoder<R: Read + Send + 'static>(&self, r: R) -> CodecResult<Box<dyn Source>> {
        let cap = self
            .capabilities
            .decoder
            .ok_or(CodecError::UnsupportedOperation("decoder"))?;
        (cap.ctor)(Box::new(r))
    }

    pub fn open_seeking_decoder<R: Read + Seek + Send + 'static>(
        &self,
        r: R,
    ) -> CodecResult<Box<dyn SeekableSource>> {
        let cap = self
            .capabilities
            .seeking_decoder
            .ok_or(CodecError::UnsupportedOperation("seeking decoder"))?;
        (cap.ctor)(Box::new(r))
    }

    /// Open an encoder; `SampleKind::Any` selects the format's default kind.
    pub fn open_encoder<W: Write + Seek + Send + 'static>(
        &self,
        w: W,
        form: Form,
        kind: SampleKind,
    ) -> CodecResult<Box<dyn Sink>> {
        let cap = self
            .capabilities
            .encoder
            .ok_or(CodecError::UnsupportedOperation("encoder"))?;
        (cap.ctor)(Box::new(w), form, self.resolve_kind(kind))
    }

    pub fn open_random_access<S: Read + Write + Seek + Send + 'static>(
        &self,
        s: S,
        form: Form,
        kind: SampleKind,
    ) -> CodecResult<Box<dyn RandomAccess>> {
        let cap = self
            .capabilities
            .random_access
            .ok_or(CodecError::UnsupportedOperation("random access"))?;
        (cap.ctor)(Box::new(s), form, self.resolve_kind(kind))
    }

    fn resolve_kind(&self, kind: SampleKind) -> SampleKind {
        match kind {
            SampleKind::Any => self.default_kind,
            k => k,
        }
    }
}

impl fmt::Debug for FormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatDescriptor")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("extensions", &self.extensions)
            .field("sniff", &self.sniff.is_some())
            .field("default_kind", &self.default_kind)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// Lowercase, without leading dot
fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

/// Registry of sound formats.
///
/// Lookups return the matching format with the lowest priority value;
/// among equal priorities the one registered first wins.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    formats: Vec<FormatDescriptor>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Registry {
            formats: Vec::new(),
        }
    }

    /// Create a registry holding the built-in formats.
    pub fn with_defaults() -> CodecResult<Self> {
        let mut registry = Self::new();
        registry.register(&super::wav::descriptor())?;
        Ok(registry)
    }

    /// Add a copy of `desc`.
    ///
    /// Fails with `NonUniformFormat` when its capabilities name different
    /// providers; the registry is left unchanged.
    pub fn register(&mut self, desc: &FormatDescriptor) -> CodecResult<()> {
        if !desc.capabilities.is_uniform() {
            return Err(CodecError::NonUniformFormat {
                name: desc.name.clone(),
                providers: desc.capabilities.providers(),
            });
        }
        log::debug!(
            "registering format {} (priority {}, extensions {:?})",
            desc.name,
            desc.priority,
            desc.extensions
        );
        self.formats.push(desc.clone());
        Ok(())
    }

    pub fn formats(&self) -> &[FormatDescriptor] {
        &self.formats
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// Find a format by name
    pub fn get(&self, name: &str) -> Option<&FormatDescriptor> {
        self.formats.iter().find(|d| d.name == name)
    }

    /// Resolve by file extension, with or without a leading dot.
    ///
    /// With `provider` set, only formats from that provider are considered.
    pub fn resolve_by_extension(
        &self,
        ext: &str,
        provider: Option<&str>,
    ) -> CodecResult<&FormatDescriptor> {
        let ext = normalize_extension(ext);
        best(
            self.formats
                .iter()
                .filter(|d| d.matches_provider(provider) && d.matches_extension(&ext)),
        )
        .ok_or(CodecError::UnknownFormat)
    }

    /// Resolve by the extension of `path`
    pub fn resolve_by_path(
        &self,
        path: &Path,
        provider: Option<&str>,
    ) -> CodecResult<&FormatDescriptor> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or(CodecError::UnknownFormat)?;
        self.resolve_by_extension(ext, provider)
    }

    /// Resolve by content.
    ///
    /// Sniffers only peek, so every byte of `r` is still available to the
    /// session opened on it afterwards, whether or not a format matched.
    pub fn resolve_by_sniff<R: Read>(
        &self,
        r: &mut SniffReader<R>,
        provider: Option<&str>,
    ) -> CodecResult<&FormatDescriptor> {
        let mut matched = Vec::new();
        for desc in self.formats.iter().filter(|d| d.matches_provider(provider)) {
            if desc.sniff(&mut *r) {
                matched.push(desc);
            }
        }
        best(matched.into_iter()).ok_or(CodecError::UnknownFormat)
    }

    /// Wrap `r` and resolve by content.
    ///
    /// The reader is returned whether or not a format matched, with every
    /// peeked byte still unread.
    pub fn resolve_stream<R: Read>(
        &self,
        r: R,
        provider: Option<&str>,
    ) -> (CodecResult<&FormatDescriptor>, SniffReader<R>) {
        let mut reader = SniffReader::new(r);
        let found = self.resolve_by_sniff(&mut reader, provider);
        (found, reader)
    }

    /// Open an encoder on `w` for the format registered under `ext`
    pub fn encoder<W: Write + Seek + Send + 'static>(
        &self,
        w: W,
        ext: &str,
        form: Form,
        kind: SampleKind,
    ) -> CodecResult<Box<dyn Sink>> {
        self.resolve_by_extension(ext, None)?
            .open_encoder(w, form, kind)
    }

    /// Encode all of `src` into `w` in the format registered under `ext`.
    ///
    /// The sink takes the shape of `src`. It is closed even when copying
    /// fails, and the copy error is the one reported. Returns the frames
    /// written.
    pub fn encode<W, S>(&self, w: W, src: &mut S, ext: &str, kind: SampleKind) -> CodecResult<u64>
    where
        W: Write + Seek + Send + 'static,
        S: Source + ?Sized,
    {
        let form = Form::new(src.channels(), src.sample_rate());
        let mut sink = self.encoder(w, ext, form, kind)?;
        let copied = session::copy(sink.as_mut(), src, ENCODE_BATCH_FRAMES);
        let closed = sink.close();
        let frames = copied?;
        closed?;
        log::debug!("encoded {} frames as {}", frames, normalize_extension(ext));
        Ok(frames)
    }
}

/// Frames moved per batch by `Registry::encode`
const ENCODE_BATCH_FRAMES: usize = 1024;

/// Lowest priority value, first one on ties
fn best<'a>(candidates: impl Iterator<Item = &'a FormatDescriptor>) -> Option<&'a FormatDescriptor> {
    let mut best: Option<&FormatDescriptor> = None;
    for desc in candidates {
        match best {
            Some(b) if b.priority <= desc.priority => {}
            _ => best = Some(desc),
        }
    }
    best
}
