//! Reusable per-scheme compressor state.
//!
//! Each compressor keeps its expensive state (deflate window and hash
//! chains, snappy hash table, scratch buffers) between streams so a pool can
//! hand it to the next response after a [`Compressor::reset`].

use std::io::{self, Write};

use flate2::{Compress, Compression, Crc, FlushCompress, Status};
use ix_core::EncodingConfig;

use crate::scheme::Scheme;

/// Streaming compressor whose state survives across streams.
pub trait Compressor: Send + Sized + 'static {
    const SCHEME: Scheme;

    /// Build a fresh compressor tuned for speed over ratio.
    fn fastest(config: &EncodingConfig) -> Self;

    /// Forget the previous stream so the next write starts a new one.
    fn reset(&mut self);

    /// Compress `input`, writing whatever output is ready to `out`.
    fn compress(&mut self, input: &[u8], out: &mut dyn Write) -> io::Result<()>;

    /// Push all buffered input out as a decodable prefix of the stream.
    fn flush(&mut self, out: &mut dyn Write) -> io::Result<()>;

    /// Write the remaining output and the scheme's trailer.
    fn finish(&mut self, out: &mut dyn Write) -> io::Result<()>;
}

// ========== Deflate ==========

/// Drive a raw deflate stream until `input` is consumed and, for non-`None`
/// flush modes, until the requested boundary has been written.
fn deflate_into(
    raw: &mut Compress,
    scratch: &mut Vec<u8>,
    mut input: &[u8],
    flush: FlushCompress,
    out: &mut dyn Write,
) -> io::Result<()> {
    let finishing = matches!(flush, FlushCompress::Finish);
    loop {
        scratch.clear();
        let before = raw.total_in();
        let status = raw
            .compress_vec(input, scratch, flush)
            .map_err(io::Error::other)?;
        let consumed = (raw.total_in() - before) as usize;
        input = &input[consumed..];

        if !scratch.is_empty() {
            out.write_all(scratch)?;
        }
        if matches!(status, Status::StreamEnd) {
            return Ok(());
        }

        let filled = scratch.len() == scratch.capacity();
        if !finishing && input.is_empty() && !filled {
            return Ok(());
        }
        if consumed == 0 && scratch.is_empty() {
            if finishing {
                return Err(io::Error::other("deflate stream made no progress"));
            }
            return Ok(());
        }
    }
}

/// Raw DEFLATE (RFC 1951) at the fastest level.
pub struct DeflateCompressor {
    raw: Compress,
    scratch: Vec<u8>,
}

impl Compressor for DeflateCompressor {
    const SCHEME: Scheme = Scheme::Deflate;

    fn fastest(config: &EncodingConfig) -> Self {
        Self {
            raw: Compress::new(Compression::fast(), false),
            scratch: Vec::with_capacity(config.buffer_size),
        }
    }

    fn reset(&mut self) {
        self.raw.reset();
    }

    fn compress(&mut self, input: &[u8], out: &mut dyn Write) -> io::Result<()> {
        deflate_into(&mut self.raw, &mut self.scratch, input, FlushCompress::None, out)
    }

    fn flush(&mut self, out: &mut dyn Write) -> io::Result<()> {
        deflate_into(&mut self.raw, &mut self.scratch, &[], FlushCompress::Sync, out)
    }

    fn finish(&mut self, out: &mut dyn Write) -> io::Result<()> {
        deflate_into(&mut self.raw, &mut self.scratch, &[], FlushCompress::Finish, out)
    }
}

// ========== Gzip ==========

/// RFC 1952 member header: no name, no mtime, XFL=4 (fastest), OS=unknown.
const GZIP_HEADER: [u8; 10] = [0x1f, 0x8b, 0x08, 0x00, 0, 0, 0, 0, 0x04, 0xff];

/// Gzip member wrapping a raw deflate stream.
pub struct GzipCompressor {
    raw: Compress,
    crc: Crc,
    scratch: Vec<u8>,
    wrote_header: bool,
}

impl GzipCompressor {
    fn ensure_header(&mut self, out: &mut dyn Write) -> io::Result<()> {
        if !self.wrote_header {
            out.write_all(&GZIP_HEADER)?;
            self.wrote_header = true;
        }
        Ok(())
    }
}

impl Compressor for GzipCompressor {
    const SCHEME: Scheme = Scheme::Gzip;

    fn fastest(config: &EncodingConfig) -> Self {
        Self {
            raw: Compress::new(Compression::fast(), false),
            crc: Crc::new(),
            scratch: Vec::with_capacity(config.buffer_size),
            wrote_header: false,
        }
    }

    fn reset(&mut self) {
        self.raw.reset();
        self.crc.reset();
        self.wrote_header = false;
    }

    fn compress(&mut self, input: &[u8], out: &mut dyn Write) -> io::Result<()> {
        self.ensure_header(out)?;
        self.crc.update(input);
        deflate_into(&mut self.raw, &mut self.scratch, input, FlushCompress::None, out)
    }

    fn flush(&mut self, out: &mut dyn Write) -> io::Result<()> {
        self.ensure_header(out)?;
        deflate_into(&mut self.raw, &mut self.scratch, &[], FlushCompress::Sync, out)
    }

    fn finish(&mut self, out: &mut dyn Write) -> io::Result<()> {
        self.ensure_header(out)?;
        deflate_into(&mut self.raw, &mut self.scratch, &[], FlushCompress::Finish, out)?;
        let mut trailer = [0u8; 8];
        trailer[..4].copy_from_slice(&self.crc.sum().to_le_bytes());
        trailer[4..].copy_from_slice(&self.crc.amount().to_le_bytes());
        out.write_all(&trailer)
    }
}

// ========== Snappy ==========

/// Largest uncompressed payload of one framing-format chunk.
const MAX_BLOCK_SIZE: usize = 1 << 16;

const STREAM_IDENTIFIER: &[u8] = b"\xff\x06\x00\x00sNaPpY";
const CHUNK_COMPRESSED: u8 = 0x00;
const CHUNK_UNCOMPRESSED: u8 = 0x01;

fn masked_crc32c(data: &[u8]) -> u32 {
    crc32c::crc32c(data).rotate_right(15).wrapping_add(0xa282_ead8)
}

/// Snappy framing format, buffered into 64 KiB blocks.
pub struct SnappyCompressor {
    encoder: snap::raw::Encoder,
    block: Vec<u8>,
    scratch: Vec<u8>,
    wrote_identifier: bool,
}

impl SnappyCompressor {
    fn emit_block(&mut self, out: &mut dyn Write) -> io::Result<()> {
        if self.block.is_empty() {
            return Ok(());
        }
        if !self.wrote_identifier {
            out.write_all(STREAM_IDENTIFIER)?;
            self.wrote_identifier = true;
        }

        let checksum = masked_crc32c(&self.block);
        let n = self
            .encoder
            .compress(&self.block, &mut self.scratch)
            .map_err(io::Error::other)?;
        // Store the block as-is unless compression saves at least 12.5%.
        let (kind, data) = if n >= self.block.len() - self.block.len() / 8 {
            (CHUNK_UNCOMPRESSED, &self.block[..])
        } else {
            (CHUNK_COMPRESSED, &self.scratch[..n])
        };

        let len = data.len() + 4;
        let header = [kind, len as u8, (len >> 8) as u8, (len >> 16) as u8];
        out.write_all(&header)?;
        out.write_all(&checksum.to_le_bytes())?;
        out.write_all(data)?;
        self.block.clear();
        Ok(())
    }
}

impl Compressor for SnappyCompressor {
    const SCHEME: Scheme = Scheme::Snappy;

    fn fastest(_config: &EncodingConfig) -> Self {
        Self {
            encoder: snap::raw::Encoder::new(),
            block: Vec::with_capacity(MAX_BLOCK_SIZE),
            scratch: vec![0; snap::raw::max_compress_len(MAX_BLOCK_SIZE)],
            wrote_identifier: false,
        }
    }

    fn reset(&mut self) {
        self.block.clear();
        self.wrote_identifier = false;
    }

    fn compress(&mut self, mut input: &[u8], out: &mut dyn Write) -> io::Result<()> {
        while !input.is_empty() {
            let take = input.len().min(MAX_BLOCK_SIZE - self.block.len());
            self.block.extend_from_slice(&input[..take]);
            input = &input[take..];
            if self.block.len() == MAX_BLOCK_SIZE {
                self.emit_block(out)?;
            }
        }
        Ok(())
    }

    fn flush(&mut self, out: &mut dyn Write) -> io::Result<()> {
        self.emit_block(out)
    }

    fn finish(&mut self, out: &mut dyn Write) -> io::Result<()> {
        self.emit_block(out)?;
        if !self.wrote_identifier {
            out.write_all(STREAM_IDENTIFIER)?;
            self.wrote_identifier = true;
        }
        Ok(())
    }
}
