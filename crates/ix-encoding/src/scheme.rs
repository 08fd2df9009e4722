use std::fmt;

/// A content-encoding this layer knows how to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Gzip,
    /// Raw DEFLATE, without a zlib wrapper.
    Deflate,
    /// Snappy framing format. Not registered with IANA; only cooperating
    /// clients ask for it.
    Snappy,
    Identity,
}

impl Scheme {
    /// Value used in the `content-encoding` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
            Self::Snappy => "snappy",
            Self::Identity => "identity",
        }
    }

    /// Match an `Accept-Encoding` token, ignoring ASCII case.
    pub fn from_token(token: &str) -> Option<Self> {
        [Self::Gzip, Self::Deflate, Self::Snappy, Self::Identity]
            .into_iter()
            .find(|s| token.eq_ignore_ascii_case(s.as_str()))
    }

    pub fn is_compressing(&self) -> bool {
        !matches!(self, Self::Identity)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
