//! Compression sniffing and codec selection
//!
//! # Detection
//!
//! The codec is chosen once per file from its first 4 bytes:
//!
//! | Codec | Signature     |
//! |-------|---------------|
//! | gzip  | `1F 8B 08`    |
//! | bzip2 | `42 5A 68`    |
//! | zip   | `50 4B 03 04` |
//! | zstd  | `28 B5 2F FD` |
//! | lz4   | `04 22 4D 18` |
//!
//! Anything else, including empty and short files, is treated as plain text.
//!
//! # Decoding
//!
//! [`Decoder`] is a closed enum over the codec readers, selected by
//! [`Decoder::open`]. Downstream code only sees `Read`. Gzip input written by
//! bgzip is decompressed block-parallel with rayon in bounded chunks of
//! [`PARALLEL_BLOCK_COUNT`] blocks; ordinary (multi-member) gzip is streamed.

use crate::error::Result;
use bzip2::bufread::MultiBzDecoder;
use flate2::bufread::{DeflateDecoder, MultiGzDecoder};
use flate2::write::GzEncoder;
use flate2::Compression;
use lz4_flex::frame::FrameDecoder;
use rayon::prelude::*;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

/// Number of leading bytes inspected by the sniffer
pub const MAGIC_LEN: usize = 4;

/// Number of BGZF blocks decompressed in parallel per chunk
///
/// Memory stays bounded at roughly `8 × 64 KB` compressed plus the same
/// decompressed, regardless of file size.
pub const PARALLEL_BLOCK_COUNT: usize = 8;

const GZIP_MAGIC: &[u8] = &[0x1F, 0x8B, 0x08];
const BZIP2_MAGIC: &[u8] = &[0x42, 0x5A, 0x68];
const ZIP_MAGIC: &[u8] = &[0x50, 0x4B, 0x03, 0x04];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xB5, 0x2F, 0xFD];
const LZ4_MAGIC: &[u8] = &[0x04, 0x22, 0x4D, 0x18];

/// Fixed part of a gzip member header up to and including XLEN
const GZIP_HEADER_LEN: usize = 12;
/// Smallest BGZF header: fixed gzip header plus the 6-byte `BC` subfield
const BGZF_HEADER_LEN: usize = 18;
/// Size of a zip local file header without name and extra field
const ZIP_LOCAL_HEADER_LEN: usize = 30;

/// Compression envelope detected from a file's leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecTag {
    /// Uncompressed
    Plain,
    /// gzip (including bgzip)
    Gzip,
    /// bzip2
    Bzip2,
    /// zip archive (first entry is read)
    Zip,
    /// Zstandard
    Zstd,
    /// LZ4 frame
    Lz4,
}

impl CodecTag {
    /// Classify leading bytes; first matching signature wins
    ///
    /// ```
    /// use fastxmap::io::CodecTag;
    ///
    /// assert_eq!(CodecTag::from_magic(&[0x1F, 0x8B, 0x08, 0x00]), CodecTag::Gzip);
    /// assert_eq!(CodecTag::from_magic(b">chr1"), CodecTag::Plain);
    /// assert_eq!(CodecTag::from_magic(&[]), CodecTag::Plain);
    /// ```
    pub fn from_magic(bytes: &[u8]) -> CodecTag {
        const SIGNATURES: [(&[u8], CodecTag); 5] = [
            (GZIP_MAGIC, CodecTag::Gzip),
            (BZIP2_MAGIC, CodecTag::Bzip2),
            (ZIP_MAGIC, CodecTag::Zip),
            (ZSTD_MAGIC, CodecTag::Zstd),
            (LZ4_MAGIC, CodecTag::Lz4),
        ];

        SIGNATURES
            .iter()
            .find(|(magic, _)| bytes.starts_with(magic))
            .map(|&(_, tag)| tag)
            .unwrap_or(CodecTag::Plain)
    }

    /// Whether the payload has to be decoded before it can be indexed
    pub fn is_compressed(self) -> bool {
        self != CodecTag::Plain
    }

    /// Short lowercase codec name
    pub fn name(self) -> &'static str {
        match self {
            CodecTag::Plain => "plain",
            CodecTag::Gzip => "gzip",
            CodecTag::Bzip2 => "bzip2",
            CodecTag::Zip => "zip",
            CodecTag::Zstd => "zstd",
            CodecTag::Lz4 => "lz4",
        }
    }
}

impl fmt::Display for CodecTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Detect the compression envelope of a file
///
/// Reads at most [`MAGIC_LEN`] bytes. Empty and short files are `Plain`; only
/// a failure to open or read the file is an error.
pub fn sniff<P: AsRef<Path>>(path: P) -> Result<CodecTag> {
    let path = path.as_ref();
    let mut magic = Vec::with_capacity(MAGIC_LEN);
    File::open(path)?
        .take(MAGIC_LEN as u64)
        .read_to_end(&mut magic)?;

    let tag = CodecTag::from_magic(&magic);
    debug!(path = %path.display(), codec = %tag, "sniffed compression");
    Ok(tag)
}

/// Uniform byte reader over every supported codec
///
/// Built by [`Decoder::open`] (files) or [`Decoder::new`] (any `BufRead`).
pub enum Decoder<R: BufRead> {
    /// Pass-through
    Plain(R),
    /// Block-parallel bgzip
    Bgzf(BgzfReader<R>),
    /// Streaming (multi-member) gzip
    Gzip(MultiGzDecoder<R>),
    /// Multi-stream bzip2
    Bzip2(MultiBzDecoder<R>),
    /// First entry of a zip archive
    Zip(ZipEntryReader<R>),
    /// Zstandard frames
    Zstd(zstd::stream::read::Decoder<'static, R>),
    /// LZ4 frames
    Lz4(FrameDecoder<R>),
}

impl Decoder<BufReader<File>> {
    /// Open a file with the decoder for `tag`
    pub fn open<P: AsRef<Path>>(tag: CodecTag, path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(Self::new(tag, BufReader::new(file))?)
    }
}

impl<R: BufRead> Decoder<R> {
    /// Wrap a buffered reader with the decoder for `tag`
    pub fn new(tag: CodecTag, mut reader: R) -> io::Result<Self> {
        let decoder = match tag {
            CodecTag::Plain => Decoder::Plain(reader),
            CodecTag::Gzip => {
                if is_bgzf_header(reader.fill_buf()?) {
                    Decoder::Bgzf(BgzfReader::new(reader))
                } else {
                    Decoder::Gzip(MultiGzDecoder::new(reader))
                }
            }
            CodecTag::Bzip2 => Decoder::Bzip2(MultiBzDecoder::new(reader)),
            CodecTag::Zip => Decoder::Zip(ZipEntryReader::new(reader)?),
            CodecTag::Zstd => Decoder::Zstd(zstd::stream::read::Decoder::with_buffer(reader)?),
            CodecTag::Lz4 => Decoder::Lz4(FrameDecoder::new(reader)),
        };
        Ok(decoder)
    }
}

impl<R: BufRead> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Decoder::Plain(r) => r.read(buf),
            Decoder::Bgzf(r) => r.read(buf),
            Decoder::Gzip(r) => r.read(buf),
            Decoder::Bzip2(r) => r.read(buf),
            Decoder::Zip(r) => r.read(buf),
            Decoder::Zstd(r) => r.read(buf),
            Decoder::Lz4(r) => r.read(buf),
        }
    }
}

/// Check whether a gzip member header carries the BGZF `BC` subfield
fn is_bgzf_header(header: &[u8]) -> bool {
    if header.len() < BGZF_HEADER_LEN || !header.starts_with(GZIP_MAGIC) {
        return false;
    }
    // FLG.FEXTRA
    if header[3] & 0x04 == 0 {
        return false;
    }
    let xlen = u16::from_le_bytes([header[10], header[11]]) as usize;
    let extra_end = (GZIP_HEADER_LEN + xlen).min(header.len());
    find_bsize(&header[GZIP_HEADER_LEN..extra_end]).is_some()
}

/// Locate the BSIZE value in a gzip extra field
///
/// Subfields are `SI1 SI2 SLEN(u16 le) DATA`; BGZF uses `SI1='B'`, `SI2='C'`,
/// `SLEN=2`, and BSIZE is the total block size minus one.
fn find_bsize(extra: &[u8]) -> Option<u16> {
    let mut pos = 0;
    while pos + 4 <= extra.len() {
        let slen = u16::from_le_bytes([extra[pos + 2], extra[pos + 3]]) as usize;
        if extra[pos] == b'B' && extra[pos + 1] == b'C' && slen == 2 {
            return extra
                .get(pos + 4..pos + 6)
                .map(|b| u16::from_le_bytes([b[0], b[1]]));
        }
        pos += 4 + slen;
    }
    None
}

/// One compressed gzip member
#[derive(Debug, Clone)]
struct GzipMember {
    data: Vec<u8>,
}

fn decompress_member(member: &GzipMember) -> io::Result<Vec<u8>> {
    let mut decoder = MultiGzDecoder::new(&member.data[..]);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    Ok(decompressed)
}

/// Bounded parallel bgzip reader
///
/// Processes blocks in chunks of [`PARALLEL_BLOCK_COUNT`]:
/// 1. Read up to 8 blocks from the input stream
/// 2. Decompress them in parallel with rayon
/// 3. Serve the concatenated output, then repeat
///
/// A member without a BSIZE subfield is not BGZF; it and everything after it
/// are decompressed as one ordinary gzip stream.
pub struct BgzfReader<R: BufRead> {
    inner: R,
    output_buffer: Vec<u8>,
    output_pos: usize,
    eof: bool,
}

impl<R: BufRead> BgzfReader<R> {
    /// Wrap a reader positioned at the first BGZF block
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            output_buffer: Vec::new(),
            output_pos: 0,
            eof: false,
        }
    }

    /// Fill `header`; `Ok(false)` on a clean end of stream
    fn read_block_header(&mut self, header: &mut [u8]) -> io::Result<bool> {
        let mut filled = 0;
        while filled < header.len() {
            match self.inner.read(&mut header[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        match filled {
            0 => Ok(false),
            n if n == header.len() => Ok(true),
            n => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("Truncated BGZF block header ({} of {} bytes)", n, header.len()),
            )),
        }
    }

    /// Read one compressed block from the stream
    fn read_one_block(&mut self) -> io::Result<Option<GzipMember>> {
        let mut header = [0u8; BGZF_HEADER_LEN];
        if !self.read_block_header(&mut header)? {
            return Ok(None);
        }

        if !header.starts_with(&GZIP_MAGIC[..2]) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid gzip magic: [{}, {}]", header[0], header[1]),
            ));
        }

        let mut data = header.to_vec();
        if header[3] & 0x04 == 0 {
            self.inner.read_to_end(&mut data)?;
            return Ok(Some(GzipMember { data }));
        }

        let xlen = u16::from_le_bytes([header[10], header[11]]) as usize;
        // The fixed header read already covers 6 bytes of the extra field
        let extra_read = BGZF_HEADER_LEN - GZIP_HEADER_LEN;
        if xlen > extra_read {
            let mut rest = vec![0u8; xlen - extra_read];
            self.inner.read_exact(&mut rest)?;
            data.extend_from_slice(&rest);
        }

        let extra_end = GZIP_HEADER_LEN + xlen;
        let block_size = match find_bsize(&data[GZIP_HEADER_LEN..extra_end.min(data.len())]) {
            Some(bsize) => bsize as usize + 1,
            None => {
                self.inner.read_to_end(&mut data)?;
                return Ok(Some(GzipMember { data }));
            }
        };

        if block_size < data.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid block size: {} < {}", block_size, data.len()),
            ));
        }

        let already_read = data.len();
        data.resize(block_size, 0);
        self.inner.read_exact(&mut data[already_read..])?;

        Ok(Some(GzipMember { data }))
    }

    /// Read and decompress the next chunk of blocks in parallel
    fn read_next_chunk(&mut self) -> io::Result<()> {
        let mut blocks = Vec::with_capacity(PARALLEL_BLOCK_COUNT);
        for _ in 0..PARALLEL_BLOCK_COUNT {
            match self.read_one_block()? {
                Some(block) => blocks.push(block),
                None => {
                    self.eof = true;
                    break;
                }
            }
        }

        let decompressed_blocks = blocks
            .par_iter()
            .map(decompress_member)
            .collect::<io::Result<Vec<_>>>()?;

        self.output_buffer.clear();
        for block_data in decompressed_blocks {
            self.output_buffer.extend_from_slice(&block_data);
        }
        self.output_pos = 0;

        Ok(())
    }
}

impl<R: BufRead> Read for BgzfReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.output_pos >= self.output_buffer.len() {
            if self.eof {
                return Ok(0);
            }
            self.read_next_chunk()?;
        }

        let available = self.output_buffer.len() - self.output_pos;
        let to_copy = available.min(buf.len());
        buf[..to_copy]
            .copy_from_slice(&self.output_buffer[self.output_pos..self.output_pos + to_copy]);
        self.output_pos += to_copy;

        Ok(to_copy)
    }
}

/// Reader over the first entry of a zip archive
///
/// Supports the two methods sequence archives use in practice: stored (0)
/// and deflate (8).
pub enum ZipEntryReader<R: BufRead> {
    /// Method 0; the remaining byte count is checked to detect truncation
    Stored(io::Take<R>),
    /// Method 8
    Deflated(DeflateDecoder<R>),
}

impl<R: BufRead> ZipEntryReader<R> {
    /// Parse the local file header and position the reader at the entry data
    pub fn new(mut reader: R) -> io::Result<Self> {
        let mut header = [0u8; ZIP_LOCAL_HEADER_LEN];
        reader.read_exact(&mut header)?;

        if !header.starts_with(ZIP_MAGIC) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Missing zip local file header",
            ));
        }

        let le16 = |at: usize| u16::from_le_bytes([header[at], header[at + 1]]);
        let flags = le16(6);
        let method = le16(8);
        let compressed_size =
            u32::from_le_bytes([header[18], header[19], header[20], header[21]]);
        let skip = le16(26) as u64 + le16(28) as u64;

        let skipped = io::copy(&mut (&mut reader).take(skip), &mut io::sink())?;
        if skipped != skip {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Truncated zip local file header",
            ));
        }

        match method {
            0 => {
                // Bit 3: sizes live in a trailing data descriptor
                if flags & 0x08 != 0 || compressed_size == u32::MAX {
                    return Err(io::Error::new(
                        io::ErrorKind::Unsupported,
                        "Stored zip entry without a size in its local header",
                    ));
                }
                Ok(ZipEntryReader::Stored(reader.take(compressed_size as u64)))
            }
            8 => Ok(ZipEntryReader::Deflated(DeflateDecoder::new(reader))),
            other => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("Unsupported zip compression method {}", other),
            )),
        }
    }
}

impl<R: BufRead> Read for ZipEntryReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ZipEntryReader::Stored(take) => {
                let n = take.read(buf)?;
                if n == 0 && !buf.is_empty() && take.limit() > 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("Zip entry truncated, {} bytes missing", take.limit()),
                    ));
                }
                Ok(n)
            }
            ZipEntryReader::Deflated(decoder) => decoder.read(buf),
        }
    }
}

/// Buffered reader over a file with automatic codec detection
///
/// Feeds the sequential streaming parsers.
///
/// ```no_run
/// use fastxmap::io::CompressedReader;
/// use std::io::BufRead;
///
/// # fn main() -> fastxmap::Result<()> {
/// let reader = CompressedReader::open("reads.fq.zst")?;
/// println!("codec: {}", reader.codec());
/// for line in reader.lines() {
///     let _line = line?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct CompressedReader {
    inner: BufReader<Decoder<BufReader<File>>>,
    codec: CodecTag,
}

impl CompressedReader {
    /// Sniff the codec of `path` and open it for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let codec = sniff(path)?;
        let decoder = Decoder::open(codec, path)?;
        Ok(Self {
            inner: BufReader::new(decoder),
            codec,
        })
    }

    /// Detected codec
    pub fn codec(&self) -> CodecTag {
        self.codec
    }
}

impl Read for CompressedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl BufRead for CompressedReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt)
    }
}

/// Buffered file writer, gzip-compressed when the path ends in `.gz`
///
/// Call [`finish`](CompressedWriter::finish) to write the gzip trailer and
/// flush; dropping the writer flushes but cannot report errors.
pub enum CompressedWriter {
    /// Uncompressed output
    Plain(BufWriter<File>),
    /// Gzip output (flate2, default level)
    Gzip(GzEncoder<BufWriter<File>>),
}

impl CompressedWriter {
    /// Create `path`, choosing the codec from its extension
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = BufWriter::new(File::create(path)?);
        let gzip = path.extension().and_then(|ext| ext.to_str()) == Some("gz");
        debug!(path = %path.display(), gzip, "creating output");

        Ok(if gzip {
            Self::Gzip(GzEncoder::new(file, Compression::default()))
        } else {
            Self::Plain(file)
        })
    }

    /// Whether output is gzip-compressed
    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::Gzip(_))
    }

    /// Finalize compression and flush to disk
    pub fn finish(self) -> io::Result<()> {
        let mut file = match self {
            Self::Plain(file) => file,
            Self::Gzip(encoder) => encoder.finish()?,
        };
        file.flush()
    }
}

impl Write for CompressedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gzip(w) => w.flush(),
        }
    }
}
