//! RIFF chunk tree walking
//!
//! A RIFF file is a container chunk (`RIFF`, length, form type) followed by a
//! sequence of tag/length/payload sub-chunks. Sub-chunks are discovered lazily,
//! one header at a time, and recorded in an index-based tree so that children
//! can refer back to their parent without owning it.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::sound::error::{CodecError, CodecResult};

/// Four character chunk identifier
pub type FourCc = [u8; 4];

pub const RIFF_ID: FourCc = *b"RIFF";
pub const WAVE_ID: FourCc = *b"WAVE";
pub const FMT_ID: FourCc = *b"fmt ";
pub const DATA_ID: FourCc = *b"data";
pub const LIST_ID: FourCc = *b"LIST";

/// Size of a tag + length pair
pub const CHUNK_HEADER_SIZE: u64 = 8;
/// Size of the container header: tag, length and form type
pub const CONTAINER_HEADER_SIZE: u64 = 12;
/// Size of the form type following the container length
pub const FORM_TYPE_SIZE: u64 = 4;

/// Index of a chunk inside a `ChunkTree`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkId(usize);

/// One chunk discovered in a stream
#[derive(Debug, Clone)]
pub struct Chunk {
    tag: FourCc,
    start: u64,
    header_len: u64,
    length: u32,
    parent: Option<ChunkId>,
    children: Vec<ChunkId>,
}

impl Chunk {
    pub fn tag(&self) -> FourCc {
        self.tag
    }

    /// Stream offset of the chunk header
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Declared payload length
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Stream offset of the first payload byte
    pub fn payload_start(&self) -> u64 {
        self.start + self.header_len
    }

    /// Stream offset just past the payload and its pad byte
    pub fn end(&self) -> u64 {
        self.payload_start() + padded(self.length)
    }

    pub fn parent(&self) -> Option<ChunkId> {
        self.parent
    }

    pub fn children(&self) -> &[ChunkId] {
        &self.children
    }

    /// True for chunks that nest other chunks
    pub fn is_list(&self) -> bool {
        self.tag == RIFF_ID || self.tag == LIST_ID
    }

    /// Position `s` at `rel` bytes into the payload
    pub fn seek<S: Seek + ?Sized>(&self, s: &mut S, rel: u64) -> io::Result<u64> {
        s.seek(SeekFrom::Start(self.payload_start() + rel))
    }
}

/// Payload length rounded up to the RIFF word boundary
fn padded(length: u32) -> u64 {
    length as u64 + (length as u64 & 1)
}

fn tag_name(tag: &[u8]) -> String {
    String::from_utf8_lossy(tag).into_owned()
}

/// Lazily discovered chunks of one RIFF stream
#[derive(Debug, Clone)]
pub struct ChunkTree {
    chunks: Vec<Chunk>,
    form_type: FourCc,
}

impl ChunkTree {
    /// Id of the container chunk
    pub const ROOT: ChunkId = ChunkId(0);

    /// Read and validate the 12-byte container header.
    ///
    /// Fails with `BadMagic` unless the stream starts with `RIFF` and the form
    /// type is `WAVE`.
    pub fn read_container<R: Read + ?Sized>(r: &mut R) -> CodecResult<Self> {
        Self::read_container_at(r, 0)
    }

    /// Like `read_container`, for a container whose header sits at stream
    /// offset `base`; chunk offsets are then absolute stream offsets.
    pub fn read_container_at<R: Read + ?Sized>(r: &mut R, base: u64) -> CodecResult<Self> {
        let mut hdr = [0u8; CONTAINER_HEADER_SIZE as usize];
        let n = read_full(r, &mut hdr)?;
        if n < 4 || hdr[..4] != RIFF_ID {
            return Err(CodecError::BadMagic {
                expected: tag_name(&RIFF_ID),
                actual: tag_name(&hdr[..n.min(4)]),
            });
        }
        if n < hdr.len() || hdr[8..12] != WAVE_ID {
            return Err(CodecError::BadMagic {
                expected: tag_name(&WAVE_ID),
                actual: tag_name(&hdr[8.min(n)..n]),
            });
        }
        let length = u32::from_le_bytes([hdr[4], hdr[5], hdr[6], hdr[7]]);
        log::debug!("RIFF container, declared length {}", length);

        Ok(Self {
            chunks: vec![Chunk {
                tag: RIFF_ID,
                start: base,
                header_len: CONTAINER_HEADER_SIZE,
                length,
                parent: None,
                children: Vec::new(),
            }],
            form_type: WAVE_ID,
        })
    }

    pub fn form_type(&self) -> FourCc {
        self.form_type
    }

    pub fn root(&self) -> &Chunk {
        &self.chunks[0]
    }

    pub fn get(&self, id: ChunkId) -> &Chunk {
        &self.chunks[id.0]
    }

    /// Number of chunks discovered so far, the container included
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Offset at which the next child of `parent` starts
    fn scan_position(&self, parent: ChunkId) -> u64 {
        let p = self.get(parent);
        match p.children.last() {
            Some(&last) => self.get(last).end(),
            None => p.payload_start(),
        }
    }

    /// Read the next chunk header of `parent` from `r`.
    ///
    /// `r` must be positioned at the scan position, i.e. right after the
    /// previous child's payload. Fails with `EndOfStream` when no complete
    /// header is left.
    pub fn next_chunk<R: Read + ?Sized>(
        &mut self,
        r: &mut R,
        parent: ChunkId,
    ) -> CodecResult<ChunkId> {
        let start = self.scan_position(parent);
        let mut hdr = [0u8; CHUNK_HEADER_SIZE as usize];
        r.read_exact(&mut hdr)
            .map_err(|e| CodecError::eof_as(e, CodecError::EndOfStream))?;

        let tag = [hdr[0], hdr[1], hdr[2], hdr[3]];
        let length = u32::from_le_bytes([hdr[4], hdr[5], hdr[6], hdr[7]]);
        log::debug!(
            "chunk {:?} at offset {} ({} bytes)",
            tag_name(&tag),
            start,
            length
        );

        let id = ChunkId(self.chunks.len());
        self.chunks.push(Chunk {
            tag,
            start,
            header_len: CHUNK_HEADER_SIZE,
            length,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.chunks[parent.0].children.push(id);
        Ok(id)
    }

    /// Scan children of `parent` until one tagged `tag` is found.
    ///
    /// Payloads of other chunks are passed over with `skip`, which receives the
    /// number of bytes to move forward (`seek_past` or `discard`). On success
    /// `r` is positioned at the start of the found chunk's payload.
    pub fn find_chunk<R, F>(
        &mut self,
        r: &mut R,
        parent: ChunkId,
        tag: FourCc,
        mut skip: F,
    ) -> CodecResult<ChunkId>
    where
        R: Read + ?Sized,
        F: FnMut(&mut R, u64) -> io::Result<()>,
    {
        loop {
            let id = match self.next_chunk(r, parent) {
                Ok(id) => id,
                Err(e) if e.is_end_of_stream() => {
                    return Err(CodecError::ChunkNotFound(tag_name(&tag)))
                }
                Err(e) => return Err(e),
            };
            let chunk = self.get(id);
            if chunk.tag == tag {
                return Ok(id);
            }
            skip(r, padded(chunk.length))
                .map_err(|e| CodecError::eof_as(e, CodecError::ChunkNotFound(tag_name(&tag))))?;
        }
    }

    /// Read the whole payload of a small chunk, consuming its pad byte.
    ///
    /// `r` must be positioned at the payload start.
    pub fn read_payload<R: Read + ?Sized>(&self, r: &mut R, id: ChunkId) -> CodecResult<Vec<u8>> {
        let chunk = self.get(id);
        let mut payload = vec![0u8; chunk.length as usize];
        r.read_exact(&mut payload).map_err(|e| {
            CodecError::eof_as(
                e,
                CodecError::InconsistentFormat(format!(
                    "chunk {:?} truncated",
                    tag_name(&chunk.tag)
                )),
            )
        })?;
        if chunk.length & 1 == 1 {
            discard(r, 1)?;
        }
        Ok(payload)
    }
}

/// Fill `buf` as far as the stream allows, returning the byte count
pub(crate) fn read_full<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match r.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

/// Skip `n` bytes by reading and throwing them away
pub fn discard<R: Read + ?Sized>(r: &mut R, n: u64) -> io::Result<()> {
    let copied = io::copy(&mut Read::take(&mut *r, n), &mut io::sink())?;
    if copied < n {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("skipped {}/{} bytes", copied, n),
        ));
    }
    Ok(())
}

/// Skip `n` bytes by seeking
pub fn seek_past<R: Seek + ?Sized>(r: &mut R, n: u64) -> io::Result<()> {
    r.seek(SeekFrom::Current(n as i64))?;
    Ok(())
}

/// Write the 12-byte container header
pub fn write_container_header<W: Write + ?Sized>(w: &mut W, length: u32) -> io::Result<()> {
    let mut hdr = [0u8; CONTAINER_HEADER_SIZE as usize];
    hdr[..4].copy_from_slice(&RIFF_ID);
    hdr[4..8].copy_from_slice(&length.to_le_bytes());
    hdr[8..].copy_from_slice(&WAVE_ID);
    w.write_all(&hdr)
}

/// Write an 8-byte chunk header
pub fn write_chunk_header<W: Write + ?Sized>(w: &mut W, tag: FourCc, length: u32) -> io::Result<()> {
    let mut hdr = [0u8; CHUNK_HEADER_SIZE as usize];
    hdr[..4].copy_from_slice(&tag);
    hdr[4..].copy_from_slice(&length.to_le_bytes());
    w.write_all(&hdr)
}
