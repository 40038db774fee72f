//! Compression CLI Helpers

use crate::Method;
use crate::error::Error;
use std::str::FromStr;

/// Raw shape of an optional-value flag such as `--compress[=METHOD]`.
pub type Flag = Option<Option<String>>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Preference {
    /// Method was specified on the command-line
    Explicit(Method),
    /// Compression flag was enabled on the command-line, but no method was specified
    Implicit,
    /// Compression was omitted from the command-line
    NotSpecified,
}
impl TryFrom<Flag> for Preference {
    type Error = Error;
    fn try_from(value: Flag) -> Result<Self, Self::Error> {
        match value {
            Some(Some(s)) if s.is_empty() => Ok(Self::Implicit),
            Some(Some(s)) => Ok(Self::Explicit(Method::from_str(&s)?)),
            Some(None) => Ok(Self::Implicit),
            None => Ok(Self::NotSpecified),
        }
    }
}
impl Preference {
    /// An implicit `--compress` means "actually compress", regardless of the
    /// configured default.
    pub fn resolve(&self, configured: Method) -> Method {
        match self {
            Self::Explicit(m) => *m,
            Self::Implicit => Method::Deflate,
            Self::NotSpecified => configured,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, Preference::NotSpecified)]
    #[case(Some(None), Preference::Implicit)]
    #[case(Some(Some(String::new())), Preference::Implicit)]
    #[case(Some(Some("store".to_string())), Preference::Explicit(Method::Store))]
    #[case(Some(Some("deflate".to_string())), Preference::Explicit(Method::Deflate))]
    fn test_construct(#[case] flag: Flag, #[case] expected: Preference) {
        let preference: Preference = flag.try_into().unwrap();
        assert_eq!(preference, expected);
    }

    #[test]
    fn test_construct_invalid() {
        let flag: Flag = Some(Some("lz4".to_string()));
        assert!(Preference::try_from(flag).is_err());
    }

    #[rstest]
    #[case(Preference::Explicit(Method::Store), Method::Deflate, Method::Store)]
    #[case(Preference::Implicit, Method::Store, Method::Deflate)]
    #[case(Preference::NotSpecified, Method::Store, Method::Store)]
    #[case(Preference::NotSpecified, Method::Deflate, Method::Deflate)]
    fn test_resolve(#[case] preference: Preference, #[case] configured: Method, #[case] expected: Method) {
        assert_eq!(preference.resolve(configured), expected);
    }
}
