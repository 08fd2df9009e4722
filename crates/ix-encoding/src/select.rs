use std::io::Write;
use std::sync::{Arc, OnceLock};

use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING};
use http::{HeaderMap, HeaderValue};
use ix_core::EncodingConfig;

use crate::accept::negotiate;
use crate::compressor::{DeflateCompressor, GzipCompressor, SnappyCompressor};
use crate::pool::{CompressorPool, PoolStats};
use crate::scheme::Scheme;
use crate::writer::EncodedWriter;

/// One compressor pool per compressing scheme.
///
/// Cheap to clone; clones share the same pools.
#[derive(Debug, Clone)]
pub struct Encoders {
    gzip: Arc<CompressorPool<GzipCompressor>>,
    deflate: Arc<CompressorPool<DeflateCompressor>>,
    snappy: Arc<CompressorPool<SnappyCompressor>>,
}

impl Encoders {
    pub fn new(config: &EncodingConfig) -> Self {
        Self {
            gzip: Arc::new(CompressorPool::new(config)),
            deflate: Arc::new(CompressorPool::new(config)),
            snappy: Arc::new(CompressorPool::new(config)),
        }
    }

    /// Process-wide pools with the default configuration, built on first use.
    pub fn global() -> &'static Encoders {
        static GLOBAL: OnceLock<Encoders> = OnceLock::new();
        GLOBAL.get_or_init(|| Encoders::new(&EncodingConfig::default()))
    }

    /// Negotiate an encoding from the request's `Accept-Encoding` value and
    /// wrap `target` accordingly.
    ///
    /// Never fails: a missing, non-UTF-8 or unsatisfiable header falls back
    /// to an uncompressed pass-through with no `content-encoding` set.
    pub fn select<W: Write>(
        &self,
        headers: &mut HeaderMap,
        accept_encoding: Option<&HeaderValue>,
        target: W,
    ) -> EncodedWriter<W> {
        let accept = accept_encoding.and_then(|v| v.to_str().ok());
        self.wrap(negotiate(accept), headers, target)
    }

    /// Like [`select`](Self::select), reading every `Accept-Encoding` line
    /// of `request` as one comma-separated list.
    pub fn select_for<W: Write>(
        &self,
        request: &HeaderMap,
        headers: &mut HeaderMap,
        target: W,
    ) -> EncodedWriter<W> {
        let joined = request
            .get_all(ACCEPT_ENCODING)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(",");
        self.wrap(negotiate(Some(&joined)), headers, target)
    }

    /// Wrap `target` in the writer for an already negotiated scheme,
    /// setting `content-encoding` when a scheme is given.
    pub fn wrap<W: Write>(
        &self,
        scheme: Option<Scheme>,
        headers: &mut HeaderMap,
        target: W,
    ) -> EncodedWriter<W> {
        let Some(scheme) = scheme else {
            return EncodedWriter::Passthrough(target);
        };
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static(scheme.as_str()));
        match scheme {
            Scheme::Gzip => EncodedWriter::Gzip(self.gzip.borrow(target)),
            Scheme::Deflate => EncodedWriter::Deflate(self.deflate.borrow(target)),
            Scheme::Snappy => EncodedWriter::Snappy(self.snappy.borrow(target)),
            Scheme::Identity => EncodedWriter::Passthrough(target),
        }
    }

    /// Pool counters for a compressing scheme; `None` for identity.
    pub fn stats(&self, scheme: Scheme) -> Option<PoolStats> {
        match scheme {
            Scheme::Gzip => Some(self.gzip.stats()),
            Scheme::Deflate => Some(self.deflate.stats()),
            Scheme::Snappy => Some(self.snappy.stats()),
            Scheme::Identity => None,
        }
    }

    pub fn gzip_pool(&self) -> &Arc<CompressorPool<GzipCompressor>> {
        &self.gzip
    }

    pub fn deflate_pool(&self) -> &Arc<CompressorPool<DeflateCompressor>> {
        &self.deflate
    }

    pub fn snappy_pool(&self) -> &Arc<CompressorPool<SnappyCompressor>> {
        &self.snappy
    }
}

impl Default for Encoders {
    fn default() -> Self {
        Self::new(&EncodingConfig::default())
    }
}
