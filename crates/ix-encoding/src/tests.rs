use crate::*;
use flate2::read::{DeflateDecoder, GzDecoder};
use http::header::CONTENT_ENCODING;
use http::{HeaderMap, HeaderValue};
use ix_core::EncodingConfig;
use std::io::{self, Read, Write};
use std::sync::Arc;

const PAYLOAD: &[u8] = br#"{"manifest_hash":"sha256:4e0d","state":"IndexFinished","success":true}"#;

fn decode(scheme: Option<Scheme>, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    match scheme {
        Some(Scheme::Gzip) => {
            GzDecoder::new(body).read_to_end(&mut out).unwrap();
        }
        Some(Scheme::Deflate) => {
            DeflateDecoder::new(body).read_to_end(&mut out).unwrap();
        }
        Some(Scheme::Snappy) => {
            snap::read::FrameDecoder::new(body).read_to_end(&mut out).unwrap();
        }
        Some(Scheme::Identity) | None => out.extend_from_slice(body),
    }
    out
}

fn content_encoding(headers: &HeaderMap) -> Option<&str> {
    headers.get(CONTENT_ENCODING).and_then(|v| v.to_str().ok())
}

/// Run one request through the selector, returning headers and body.
fn respond(encoders: &Encoders, accept: Option<&str>, payload: &[u8]) -> (HeaderMap, Vec<u8>) {
    let mut headers = HeaderMap::new();
    let accept = accept.map(|a| HeaderValue::from_str(a).unwrap());
    let mut w = encoders.select(&mut headers, accept.as_ref(), Vec::new());
    w.write_all(payload).unwrap();
    let body = w.close().unwrap();
    (headers, body)
}

/// Deterministic, poorly compressible bytes.
fn noise(len: usize) -> Vec<u8> {
    let mut x: u32 = 0x9e37_79b9;
    (0..len)
        .map(|_| {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            x as u8
        })
        .collect()
}

fn mixed_payload() -> Vec<u8> {
    let mut data = Vec::new();
    for i in 0..20_000 {
        data.extend_from_slice(format!("{{\"package\":\"pkg-{}\",\"version\":\"1.{}\"}},", i, i % 7).as_bytes());
    }
    data.extend(noise(150_000));
    data
}

/// Accepts writes, fails every flush.
#[derive(Debug)]
struct BrokenFlush(Vec<u8>);

impl Write for BrokenFlush {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))
    }
}

// ========== Scheme ==========

#[test]
fn test_scheme_tokens() {
    assert_eq!(Scheme::from_token("GZip"), Some(Scheme::Gzip));
    assert_eq!(Scheme::from_token("deflate"), Some(Scheme::Deflate));
    assert_eq!(Scheme::from_token("SNAPPY"), Some(Scheme::Snappy));
    assert_eq!(Scheme::from_token("identity"), Some(Scheme::Identity));
    assert_eq!(Scheme::from_token("br"), None);
    assert_eq!(Scheme::Gzip.to_string(), "gzip");
    assert!(!Scheme::Identity.is_compressing());
    assert!(Scheme::Snappy.is_compressing());
}

// ========== Accept-Encoding parsing ==========

#[test]
fn test_parse_orders_by_quality() {
    let prefs = parse_accept_encoding("gzip;q=0.5, deflate, snappy;q=0.8");
    let tokens: Vec<&str> = prefs.iter().map(|p| p.token.as_str()).collect();
    assert_eq!(tokens, ["deflate", "snappy", "gzip"]);
    assert_eq!(prefs[2].q, 0.5);
}

#[test]
fn test_parse_ties_keep_header_order() {
    let prefs = parse_accept_encoding("deflate;q=0.7, snappy, gzip;q=0.7, br");
    let tokens: Vec<&str> = prefs.iter().map(|p| p.token.as_str()).collect();
    assert_eq!(tokens, ["snappy", "br", "deflate", "gzip"]);
}

#[test]
fn test_parse_lowercases_tokens() {
    let prefs = parse_accept_encoding("GZIP ; Q=0.9");
    assert_eq!(prefs, vec![Preference { token: "gzip".into(), q: 0.9 }]);
}

#[test]
fn test_parse_drops_malformed_entries() {
    let prefs = parse_accept_encoding("gzip;q=abc, ;q=1, , deflate;q=2, snappy;q=-1, bad token, br;level=9");
    let tokens: Vec<&str> = prefs.iter().map(|p| p.token.as_str()).collect();
    assert_eq!(tokens, ["br"]);
}

#[test]
fn test_parse_drops_zero_quality() {
    let prefs = parse_accept_encoding("gzip;q=0, deflate;q=0.000");
    assert!(prefs.is_empty());
}

#[test]
fn test_parse_empty() {
    assert!(parse_accept_encoding("").is_empty());
    assert!(parse_accept_encoding(" , ,").is_empty());
}

// ========== Negotiation ==========

#[test]
fn test_negotiate_first_recognized() {
    assert_eq!(negotiate(Some("gzip, deflate")), Some(Scheme::Gzip));
    assert_eq!(negotiate(Some("deflate, gzip")), Some(Scheme::Deflate));
    assert_eq!(negotiate(Some("br, zstd, snappy")), Some(Scheme::Snappy));
    assert_eq!(negotiate(Some("br;q=1, gzip;q=0.1")), Some(Scheme::Gzip));
}

#[test]
fn test_negotiate_identity_wins_over_lower_gzip() {
    assert_eq!(negotiate(Some("identity;q=1, gzip;q=0.9")), Some(Scheme::Identity));
    assert_eq!(negotiate(Some("gzip;q=0.9, identity")), Some(Scheme::Identity));
}

#[test]
fn test_negotiate_wildcard_stops_scan() {
    assert_eq!(negotiate(Some("*")), None);
    assert_eq!(negotiate(Some("br, *, gzip")), None);
    assert_eq!(negotiate(Some("*;q=0.5, gzip")), Some(Scheme::Gzip));
}

#[test]
fn test_negotiate_no_preference() {
    assert_eq!(negotiate(None), None);
    assert_eq!(negotiate(Some("")), None);
    assert_eq!(negotiate(Some("br, zstd")), None);
    assert_eq!(negotiate(Some(";;;,,,q=")), None);
}

#[test]
fn test_negotiate_skips_refused_scheme() {
    assert_eq!(negotiate(Some("gzip;q=0, deflate;q=0.2")), Some(Scheme::Deflate));
}

// ========== Selection ==========

#[test]
fn test_select_gzip_scenario() {
    let encoders = Encoders::default();
    let (headers, body) = respond(&encoders, Some("gzip, deflate"), PAYLOAD);
    assert_eq!(content_encoding(&headers), Some("gzip"));
    assert_eq!(&body[..2], &[0x1f, 0x8b]);
    assert_eq!(decode(Some(Scheme::Gzip), &body), PAYLOAD);
}

#[test]
fn test_select_identity_scenario() {
    let encoders = Encoders::default();
    let (headers, body) = respond(&encoders, Some("identity;q=1, gzip;q=0.9"), PAYLOAD);
    assert_eq!(content_encoding(&headers), Some("identity"));
    assert_eq!(body, PAYLOAD);
    assert_eq!(encoders.stats(Scheme::Gzip).unwrap().created, 0);
}

#[test]
fn test_select_without_header() {
    let encoders = Encoders::default();
    let (headers, body) = respond(&encoders, None, PAYLOAD);
    assert!(headers.get(CONTENT_ENCODING).is_none());
    assert_eq!(body, PAYLOAD);
}

#[test]
fn test_select_wildcard_sets_no_header() {
    let encoders = Encoders::default();
    let (headers, body) = respond(&encoders, Some("*"), PAYLOAD);
    assert!(headers.get(CONTENT_ENCODING).is_none());
    assert_eq!(body, PAYLOAD);
}

#[test]
fn test_select_non_utf8_header_falls_back() {
    let encoders = Encoders::default();
    let mut headers = HeaderMap::new();
    let accept = HeaderValue::from_bytes(b"gzip\xff").unwrap();
    let mut w = encoders.select(&mut headers, Some(&accept), Vec::new());
    assert!(w.scheme().is_none());
    w.write_all(PAYLOAD).unwrap();
    assert_eq!(w.close().unwrap(), PAYLOAD);
    assert!(headers.is_empty());
}

#[test]
fn test_select_replaces_existing_content_encoding() {
    let encoders = Encoders::default();
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_ENCODING, HeaderValue::from_static("br"));
    let accept = HeaderValue::from_static("deflate");
    let w = encoders.select(&mut headers, Some(&accept), Vec::new());
    assert_eq!(w.scheme(), Some(Scheme::Deflate));
    assert_eq!(headers.get_all(CONTENT_ENCODING).iter().count(), 1);
    assert_eq!(content_encoding(&headers), Some("deflate"));
    w.close().unwrap();
}

#[test]
fn test_round_trip_every_scheme() {
    let encoders = Encoders::default();
    let payload = mixed_payload();
    for accept in ["gzip", "deflate", "snappy", "identity"] {
        let (headers, body) = respond(&encoders, Some(accept), &payload);
        let scheme = content_encoding(&headers).and_then(Scheme::from_token);
        assert_eq!(scheme, Scheme::from_token(accept));
        assert_eq!(decode(scheme, &body), payload, "round trip through {accept}");
    }
}

#[test]
fn test_round_trip_many_small_writes() {
    let encoders = Encoders::default();
    let payload = mixed_payload();
    for accept in ["gzip", "deflate", "snappy"] {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_static(accept);
        let mut w = encoders.select(&mut headers, Some(&value), Vec::new());
        for chunk in payload.chunks(1000) {
            w.write_all(chunk).unwrap();
        }
        let scheme = w.scheme();
        let body = w.close().unwrap();
        assert_eq!(decode(scheme, &body), payload);
    }
}

#[test]
fn test_flush_mid_stream() {
    let encoders = Encoders::default();
    for accept in ["gzip", "deflate", "snappy"] {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_static(accept);
        let mut w = encoders.select(&mut headers, Some(&value), Vec::new());
        w.write_all(PAYLOAD).unwrap();
        w.flush().unwrap();
        w.flush().unwrap();
        w.write_all(PAYLOAD).unwrap();
        let scheme = w.scheme();
        let body = w.close().unwrap();
        assert_eq!(decode(scheme, &body), [PAYLOAD, PAYLOAD].concat());
    }
}

#[test]
fn test_empty_streams_are_valid() {
    let encoders = Encoders::default();
    for accept in ["gzip", "deflate", "snappy"] {
        let (_, body) = respond(&encoders, Some(accept), b"");
        assert!(!body.is_empty());
        assert!(decode(Scheme::from_token(accept), &body).is_empty());
    }
}

#[test]
fn test_snappy_uses_uncompressed_chunks_for_noise() {
    let encoders = Encoders::default();
    let payload = noise(1000);
    let (_, body) = respond(&encoders, Some("snappy"), &payload);
    assert_eq!(&body[..10], b"\xff\x06\x00\x00sNaPpY");
    assert_eq!(body[10], 0x01);
    assert_eq!(decode(Some(Scheme::Snappy), &body), payload);
}

// ========== Pool lifecycle ==========

#[test]
fn test_sequential_requests_reuse_one_compressor() {
    let encoders = Encoders::default();
    for _ in 0..100 {
        let (_, body) = respond(&encoders, Some("gzip"), PAYLOAD);
        assert_eq!(decode(Some(Scheme::Gzip), &body), PAYLOAD);
    }
    let stats = encoders.stats(Scheme::Gzip).unwrap();
    assert_eq!(stats.created, 1);
    assert_eq!(stats.reused, 99);
    assert_eq!(stats.returned, 100);
    assert_eq!(encoders.gzip_pool().idle(), 1);
    assert_eq!(encoders.stats(Scheme::Deflate).unwrap().created, 0);
}

#[test]
fn test_reset_between_borrows() {
    let encoders = Encoders::default();
    let (_, first) = respond(&encoders, Some("snappy"), b"first response");
    let (_, second) = respond(&encoders, Some("snappy"), b"second");
    assert_eq!(decode(Some(Scheme::Snappy), &first), b"first response");
    assert_eq!(decode(Some(Scheme::Snappy), &second), b"second");
    assert_eq!(encoders.stats(Scheme::Snappy).unwrap().reused, 1);
}

#[test]
fn test_failed_close_discards_compressor() {
    let pool = Arc::new(CompressorPool::<GzipCompressor>::new(&EncodingConfig::default()));
    let mut w = pool.borrow(BrokenFlush(Vec::new()));
    w.write_all(PAYLOAD).unwrap();
    let err = w.close().unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    assert_eq!(pool.idle(), 0);
    assert_eq!(pool.stats().discarded, 1);

    let mut w = pool.borrow(Vec::new());
    w.write_all(PAYLOAD).unwrap();
    let body = w.close().unwrap();
    assert_eq!(decode(Some(Scheme::Gzip), &body), PAYLOAD);
    assert_eq!(pool.stats().created, 2);
    assert_eq!(pool.idle(), 1);
}

#[test]
fn test_drop_without_close_finishes_and_returns() {
    let pool = Arc::new(CompressorPool::<DeflateCompressor>::new(&EncodingConfig::default()));
    let mut body = Vec::new();
    {
        let mut w = pool.borrow(&mut body);
        w.write_all(PAYLOAD).unwrap();
    }
    assert_eq!(decode(Some(Scheme::Deflate), &body), PAYLOAD);
    assert_eq!(pool.idle(), 1);
    assert_eq!(pool.stats().returned, 1);
}

#[test]
fn test_drop_with_failing_target_discards() {
    let pool = Arc::new(CompressorPool::<SnappyCompressor>::new(&EncodingConfig::default()));
    {
        let mut w = pool.borrow(BrokenFlush(Vec::new()));
        w.write_all(PAYLOAD).unwrap();
    }
    assert_eq!(pool.idle(), 0);
    assert_eq!(pool.stats().discarded, 1);
}

#[test]
fn test_panic_while_borrowed_discards() {
    let pool = Arc::new(CompressorPool::<GzipCompressor>::new(&EncodingConfig::default()));
    let p = Arc::clone(&pool);
    let result = std::thread::spawn(move || {
        let mut w = p.borrow(Vec::new());
        w.write_all(PAYLOAD).unwrap();
        panic!("handler blew up");
    })
    .join();
    assert!(result.is_err());
    assert_eq!(pool.idle(), 0);
    assert_eq!(pool.stats().discarded, 1);
}

#[test]
fn test_max_idle_bounds_pool() {
    let config = EncodingConfig {
        max_idle_per_scheme: 1,
        ..EncodingConfig::default()
    };
    let pool = Arc::new(CompressorPool::<GzipCompressor>::new(&config));
    let a = pool.borrow(Vec::new());
    let b = pool.borrow(Vec::new());
    a.close().unwrap();
    b.close().unwrap();
    assert_eq!(pool.idle(), 1);
    let stats = pool.stats();
    assert_eq!(stats.created, 2);
    assert_eq!(stats.returned, 1);
    assert_eq!(stats.discarded, 1);
}

#[test]
fn test_concurrent_borrows_bounded_by_threads() {
    let encoders = Encoders::default();
    let payload = mixed_payload();
    let threads = 8;
    std::thread::scope(|s| {
        for _ in 0..threads {
            s.spawn(|| {
                for _ in 0..25 {
                    let (headers, body) = respond(&encoders, Some("deflate, gzip"), &payload[..50_000]);
                    assert_eq!(content_encoding(&headers), Some("deflate"));
                    assert_eq!(decode(Some(Scheme::Deflate), &body), &payload[..50_000]);
                }
            });
        }
    });
    let stats = encoders.stats(Scheme::Deflate).unwrap();
    assert!(stats.created <= threads);
    assert_eq!(stats.created + stats.reused, threads * 25);
    assert_eq!(stats.returned, threads * 25);
}

#[test]
fn test_global_encoders_shared() {
    let a = Encoders::global();
    let b = Encoders::global();
    assert!(std::ptr::eq(a, b));
    assert!(Arc::ptr_eq(a.gzip_pool(), b.gzip_pool()));
}

#[test]
fn test_zero_max_idle_still_reuses() {
    let config = EncodingConfig {
        max_idle_per_scheme: 0,
        ..EncodingConfig::default()
    };
    let encoders = Encoders::new(&config);
    for _ in 0..50 {
        let (_, body) = respond(&encoders, Some("gzip"), PAYLOAD);
        assert_eq!(decode(Some(Scheme::Gzip), &body), PAYLOAD);
    }
    let stats = encoders.stats(Scheme::Gzip).unwrap();
    assert_eq!(stats.created, 1);
    assert_eq!(stats.reused, 49);
}

#[test]
fn test_select_for_joins_repeated_header_lines() {
    let encoders = Encoders::default();
    let mut request = HeaderMap::new();
    request.append(http::header::ACCEPT_ENCODING, HeaderValue::from_static("br;q=1"));
    request.append(http::header::ACCEPT_ENCODING, HeaderValue::from_static("gzip;q=0.5, snappy;q=0.8"));

    let mut headers = HeaderMap::new();
    let mut w = encoders.select_for(&request, &mut headers, Vec::new());
    assert_eq!(w.scheme(), Some(Scheme::Snappy));
    w.write_all(PAYLOAD).unwrap();
    let body = w.close().unwrap();
    assert_eq!(content_encoding(&headers), Some("snappy"));
    assert_eq!(decode(Some(Scheme::Snappy), &body), PAYLOAD);
}

#[test]
fn test_select_for_without_header() {
    let encoders = Encoders::default();
    let mut headers = HeaderMap::new();
    let w = encoders.select_for(&HeaderMap::new(), &mut headers, Vec::new());
    assert!(w.scheme().is_none());
    assert!(headers.is_empty());
}
