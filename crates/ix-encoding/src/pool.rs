//! Concurrency-safe reuse cache of idle compressors, one per scheme.

use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ix_core::EncodingConfig;
use parking_lot::Mutex;
use tracing::debug;

use crate::compressor::Compressor;
use crate::scheme::Scheme;
use crate::writer::PooledWriter;

/// Counters describing a pool's traffic since it was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Compressors constructed on a pool miss.
    pub created: u64,
    /// Borrows served from an idle compressor.
    pub reused: u64,
    /// Compressors put back after a clean finish.
    pub returned: u64,
    /// Compressors dropped instead of returned: failed finish, abandoned
    /// during a panic, or the idle list was already full.
    pub discarded: u64,
}

/// Free list of idle compressors.
///
/// The lock only guards push/pop; compression itself runs outside it. The
/// pool never shrinks on its own: idle compressors live as long as the pool.
pub struct CompressorPool<C> {
    idle: Mutex<Vec<C>>,
    max_idle: usize,
    config: EncodingConfig,
    created: AtomicU64,
    reused: AtomicU64,
    returned: AtomicU64,
    discarded: AtomicU64,
}

impl<C: Compressor> CompressorPool<C> {
    pub fn new(config: &EncodingConfig) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            // zero would turn every borrow into a construction
            max_idle: config.max_idle_per_scheme.max(1),
            config: config.clone(),
            created: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            returned: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    pub fn scheme(&self) -> Scheme {
        C::SCHEME
    }

    /// Borrow a compressor, reset onto `target` and ready for writes.
    pub fn borrow<W: Write>(self: &Arc<Self>, target: W) -> PooledWriter<C, W> {
        PooledWriter::new(Arc::clone(self), self.take(), target)
    }

    /// Number of compressors currently sitting idle.
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            returned: self.returned.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }

    fn take(&self) -> C {
        let pooled = self.idle.lock().pop();
        let mut compressor = match pooled {
            Some(c) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                c
            }
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                debug!(scheme = %C::SCHEME, "compressor pool miss, constructing");
                C::fastest(&self.config)
            }
        };
        compressor.reset();
        compressor
    }

    pub(crate) fn put(&self, compressor: C) {
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(compressor);
            self.returned.fetch_add(1, Ordering::Relaxed);
        } else {
            drop(idle);
            self.discard(compressor);
        }
    }

    pub(crate) fn discard(&self, compressor: C) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
        drop(compressor);
    }
}

impl<C: Compressor> fmt::Debug for CompressorPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressorPool")
            .field("scheme", &C::SCHEME)
            .field("max_idle", &self.max_idle)
            .field("stats", &self.stats())
            .finish()
    }
}
