//! Writers handed to response handlers.

use std::io::{self, Write};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::compressor::{Compressor, DeflateCompressor, GzipCompressor, SnappyCompressor};
use crate::pool::CompressorPool;
use crate::scheme::Scheme;

/// A compressor on loan from its pool, writing into `W`.
///
/// [`close`](Self::close) finishes the stream and hands the compressor back.
/// Dropping the writer without closing it finishes the stream best-effort;
/// if that happens while unwinding from a panic the compressor is discarded
/// rather than returned.
pub struct PooledWriter<C: Compressor, W: Write> {
    pool: Arc<CompressorPool<C>>,
    compressor: Option<C>,
    target: Option<W>,
}

impl<C: Compressor, W: Write> PooledWriter<C, W> {
    pub(crate) fn new(pool: Arc<CompressorPool<C>>, compressor: C, target: W) -> Self {
        Self {
            pool,
            compressor: Some(compressor),
            target: Some(target),
        }
    }

    pub fn scheme(&self) -> Scheme {
        C::SCHEME
    }

    /// Finish the stream, return the compressor to its pool and give back
    /// the target.
    ///
    /// On error the compressor is dropped: its internal state is not trusted
    /// for another stream.
    pub fn close(mut self) -> io::Result<W> {
        self.finalize()?;
        self.target
            .take()
            .ok_or_else(|| io::Error::other("pooled writer has no target"))
    }

    fn finalize(&mut self) -> io::Result<()> {
        let (Some(mut compressor), Some(target)) = (self.compressor.take(), self.target.as_mut())
        else {
            return Ok(());
        };
        match compressor.finish(target).and_then(|()| target.flush()) {
            Ok(()) => {
                self.pool.put(compressor);
                Ok(())
            }
            Err(err) => {
                warn!(scheme = %C::SCHEME, error = %err, "finishing compressed stream failed, discarding compressor");
                self.pool.discard(compressor);
                Err(err)
            }
        }
    }

    fn parts(&mut self) -> io::Result<(&mut C, &mut W)> {
        match (self.compressor.as_mut(), self.target.as_mut()) {
            (Some(c), Some(t)) => Ok((c, t)),
            _ => Err(io::Error::other("write to a finished pooled writer")),
        }
    }
}

impl<C: Compressor, W: Write> Write for PooledWriter<C, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let (compressor, target) = self.parts()?;
        compressor.compress(buf, target)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let (compressor, target) = self.parts()?;
        compressor.flush(target)?;
        target.flush()
    }
}

impl<C: Compressor, W: Write> Drop for PooledWriter<C, W> {
    fn drop(&mut self) {
        if self.compressor.is_none() {
            return;
        }
        if std::thread::panicking() {
            if let Some(compressor) = self.compressor.take() {
                self.pool.discard(compressor);
            }
            return;
        }
        if let Err(err) = self.finalize() {
            debug!(scheme = %C::SCHEME, error = %err, "pooled writer dropped without close");
        }
    }
}

/// The writer returned by content negotiation.
pub enum EncodedWriter<W: Write> {
    /// No compression: bytes go straight to the target.
    Passthrough(W),
    Gzip(PooledWriter<GzipCompressor, W>),
    Deflate(PooledWriter<DeflateCompressor, W>),
    Snappy(PooledWriter<SnappyCompressor, W>),
}

impl<W: Write> EncodedWriter<W> {
    /// The compressing scheme in use, `None` for pass-through.
    pub fn scheme(&self) -> Option<Scheme> {
        match self {
            Self::Passthrough(_) => None,
            Self::Gzip(w) => Some(w.scheme()),
            Self::Deflate(w) => Some(w.scheme()),
            Self::Snappy(w) => Some(w.scheme()),
        }
    }

    /// Finish the encoded stream and return the target.
    ///
    /// A no-op for pass-through; otherwise see [`PooledWriter::close`].
    pub fn close(self) -> io::Result<W> {
        match self {
            Self::Passthrough(w) => Ok(w),
            Self::Gzip(w) => w.close(),
            Self::Deflate(w) => w.close(),
            Self::Snappy(w) => w.close(),
        }
    }
}

impl<W: Write> Write for EncodedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Passthrough(w) => w.write(buf),
            Self::Gzip(w) => w.write(buf),
            Self::Deflate(w) => w.write(buf),
            Self::Snappy(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Passthrough(w) => w.flush(),
            Self::Gzip(w) => w.flush(),
            Self::Deflate(w) => w.flush(),
            Self::Snappy(w) => w.flush(),
        }
    }
}
