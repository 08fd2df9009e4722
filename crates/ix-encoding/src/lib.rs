//! Response content-encoding negotiation and pooled compressors.
//!
//! [`Encoders::select`] reads a client's `Accept-Encoding`, sets the matching
//! `content-encoding` header and hands back an [`EncodedWriter`] over the
//! response body. Compressor state is borrowed from a per-scheme
//! [`CompressorPool`] and goes back to it once the writer is closed.

pub mod accept;
pub mod compressor;
pub mod pool;
pub mod scheme;
pub mod select;
pub mod writer;

pub use accept::{negotiate, parse_accept_encoding, Preference};
pub use compressor::{Compressor, DeflateCompressor, GzipCompressor, SnappyCompressor};
pub use pool::{CompressorPool, PoolStats};
pub use scheme::Scheme;
pub use select::Encoders;
pub use writer::{EncodedWriter, PooledWriter};

#[cfg(test)]
mod tests;
