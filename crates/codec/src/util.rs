use crate::Method;
use std::fmt::{Display, Formatter, Result as FmtResult};

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl AsRef<str> for Method {
    fn as_ref(&self) -> &'static str {
        self.as_str()
    }
}

impl Method {
    /// Returns the method number stored in local and central headers.
    #[inline]
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            Method::Store => 0,
            Method::Deflate => 8,
        }
    }

    /// Returns the short name for configuration (for displaying to user)
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Store => "store",
            Method::Deflate => "deflate",
        }
    }

    /// Whether the compressed size equals the payload size, which is what
    /// allows an archive's size to be predicted.
    #[inline]
    #[must_use]
    pub fn is_size_preserving(&self) -> bool {
        matches!(self, Method::Store)
    }
}
