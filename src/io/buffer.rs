//! Flat, randomly addressable view over a sequence file
//!
//! Plain files are memory-mapped (zero copy). Compressed files cannot be
//! seeked the way the boundary indexer needs, so they are decoded once into an
//! owned buffer. Either way the caller gets a read-only `&[u8]`; dropping the
//! [`SequenceBuffer`] unmaps or frees it.

use crate::error::Result;
use crate::io::compression::{sniff, CodecTag, Decoder};
use memmap2::Mmap;
use std::fs::File;
use std::io::Read;
use std::ops::Deref;
use std::path::Path;
use tracing::debug;

/// Read-only file content, mapped or decoded
pub enum SequenceBuffer {
    /// Memory-mapped plain file
    Mapped(Mmap),
    /// Decompressed (or in-memory) bytes
    Owned(Vec<u8>),
}

impl SequenceBuffer {
    /// Sniff `path`, then map or decode it into one flat buffer
    ///
    /// # Example
    ///
    /// ```no_run
    /// use fastxmap::io::SequenceBuffer;
    ///
    /// # fn main() -> fastxmap::Result<()> {
    /// let (buffer, codec) = SequenceBuffer::open("genome.fa.gz")?;
    /// println!("{} bytes after {} decoding", buffer.len(), codec);
    /// # Ok(())
    /// # }
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<(Self, CodecTag)> {
        let path = path.as_ref();
        let codec = sniff(path)?;

        let buffer = if codec.is_compressed() {
            Self::decode(codec, path)?
        } else {
            Self::map(path)?
        };

        debug!(
            path = %path.display(),
            codec = %codec,
            mapped = buffer.is_mapped(),
            bytes = buffer.len(),
            "sequence buffer ready"
        );
        Ok((buffer, codec))
    }

    /// Wrap bytes already in memory
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        SequenceBuffer::Owned(bytes)
    }

    /// Whether the buffer is a memory map of the file
    pub fn is_mapped(&self) -> bool {
        matches!(self, SequenceBuffer::Mapped(_))
    }

    fn map(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // Mapping zero bytes fails on some platforms
        if file.metadata()?.len() == 0 {
            return Ok(SequenceBuffer::Owned(Vec::new()));
        }

        // SAFETY: the map is read-only; the file must not be truncated while
        // the buffer is alive.
        let mmap = unsafe { Mmap::map(&file)? };

        #[cfg(unix)]
        if let Err(e) = mmap.advise(memmap2::Advice::WillNeed) {
            debug!(error = %e, "madvise(WILLNEED) failed");
        }

        Ok(SequenceBuffer::Mapped(mmap))
    }

    fn decode(codec: CodecTag, path: &Path) -> Result<Self> {
        let mut decoder = Decoder::open(codec, path)?;
        let mut bytes = Vec::new();
        decoder.read_to_end(&mut bytes)?;
        Ok(SequenceBuffer::Owned(bytes))
    }
}

impl Deref for SequenceBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            SequenceBuffer::Mapped(mmap) => &mmap[..],
            SequenceBuffer::Owned(bytes) => &bytes[..],
        }
    }
}

impl AsRef<[u8]> for SequenceBuffer {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl std::fmt::Debug for SequenceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceBuffer")
            .field("mapped", &self.is_mapped())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_plain_file_is_mapped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.fa");
        std::fs::write(&path, b">a\nACGT\n").unwrap();

        let (buffer, codec) = SequenceBuffer::open(&path).unwrap();
        assert_eq!(codec, CodecTag::Plain);
        assert!(buffer.is_mapped());
        assert_eq!(&buffer[..], b">a\nACGT\n");
    }

    #[test]
    fn test_empty_file_is_owned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.fa");
        std::fs::write(&path, b"").unwrap();

        let (buffer, codec) = SequenceBuffer::open(&path).unwrap();
        assert_eq!(codec, CodecTag::Plain);
        assert!(!buffer.is_mapped());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_gzip_file_is_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.fa.gz");
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b">a\nACGT\n").unwrap();
        std::fs::write(&path, enc.finish().unwrap()).unwrap();

        let (buffer, codec) = SequenceBuffer::open(&path).unwrap();
        assert_eq!(codec, CodecTag::Gzip);
        assert!(!buffer.is_mapped());
        assert_eq!(&buffer[..], b">a\nACGT\n");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SequenceBuffer::open(dir.path().join("nope.fa")).is_err());
    }
}
