//! `Accept-Encoding` parsing.
//!
//! Parsing is total: anything that does not look like a valid entry is
//! dropped, and an unusable header simply yields no preference.

use tracing::debug;

use crate::scheme::Scheme;

/// One weighted entry from an `Accept-Encoding` header.
#[derive(Debug, Clone, PartialEq)]
pub struct Preference {
    /// Lower-cased coding token, or `*`.
    pub token: String,
    pub q: f32,
}

/// Parse a header value into entries ordered by descending `q`.
///
/// Entries with equal weight keep their header order. Entries that are
/// malformed, carry an unparsable or out-of-range `q`, or have `q=0` are
/// left out.
pub fn parse_accept_encoding(header: &str) -> Vec<Preference> {
    let mut prefs: Vec<Preference> = header.split(',').filter_map(parse_entry).collect();
    // sort_by is stable, which is what keeps ties in header order
    prefs.sort_by(|a, b| b.q.total_cmp(&a.q));
    prefs
}

fn parse_entry(entry: &str) -> Option<Preference> {
    let mut parts = entry.split(';');
    let token = parts.next()?.trim();
    if token.is_empty() || !token.bytes().all(is_tchar) {
        return None;
    }

    let mut q = 1.0_f32;
    for param in parts {
        let Some((name, value)) = param.split_once('=') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("q") {
            q = value
                .trim()
                .parse::<f32>()
                .ok()
                .filter(|q| (0.0..=1.0).contains(q))?;
        }
    }
    if q == 0.0 {
        return None;
    }

    Some(Preference {
        token: token.to_ascii_lowercase(),
        q,
    })
}

fn is_tchar(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// Pick the encoding for a response.
///
/// Walks the client's preferences in order and stops at the first token this
/// layer recognizes. `identity` is returned as such so the caller can
/// advertise it; `*`, unknown-only lists and absent headers mean "send it
/// as is" and yield `None`.
pub fn negotiate(accept: Option<&str>) -> Option<Scheme> {
    let header = accept.unwrap_or("");
    for pref in parse_accept_encoding(header) {
        if pref.token == "*" {
            break;
        }
        if let Some(scheme) = Scheme::from_token(&pref.token) {
            debug!(accept = header, scheme = %scheme, "negotiated content encoding");
            return Some(scheme);
        }
    }
    None
}
