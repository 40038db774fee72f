use crate::Method;
use crate::error::{Error, ErrorKind};
use std::str::FromStr;

impl FromStr for Method {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "store" | "stored" | "none" => Ok(Method::Store),
            "deflate" | "deflated" => Ok(Method::Deflate),
            _ => exn::bail!(ErrorKind::UnsupportedMethod(s.to_string())),
        }
    }
}

impl TryFrom<u16> for Method {
    type Error = Error;
    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Method::Store),
            8 => Ok(Method::Deflate),
            other => exn::bail!(ErrorKind::UnsupportedMethod(other.to_string())),
        }
    }
}
