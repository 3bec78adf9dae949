//! Error handling for validation.
//!
//! Every object processed during a run ends in one of the recoverable
//! failure kinds collected in [`ObjectError`]: it could not be parsed, its
//! content did not match the hash published in a manifest, it did not chain
//! up to a validated certificate, or – for manifests – it was stale. These
//! only ever drop the object and, at most, its subtree. Only [`Fatal`]
//! errors end a run.

use std::{error, fmt, io};
use std::borrow::Cow;
use std::convert::Infallible;
use bcder::decode::{ContentError, DecodeError};


//------------ ParseError ----------------------------------------------------

/// An object was malformed.
#[derive(Debug)]
pub struct ParseError {
    inner: ContentError,
}

impl ParseError {
    pub fn new(err: impl Into<ContentError>) -> Self {
        ParseError { inner: err.into() }
    }
}

impl From<ContentError> for ParseError {
    fn from(err: ContentError) -> Self {
        ParseError { inner: err }
    }
}

impl From<DecodeError<Infallible>> for ParseError {
    fn from(err: DecodeError<Infallible>) -> Self {
        ParseError {
            inner: ContentError::from_boxed(Box::new(err.to_string()))
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl error::Error for ParseError { }


//------------ DigestMismatch ------------------------------------------------

/// The content of a file did not match its expected SHA-256 digest.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DigestMismatch;

impl fmt::Display for DigestMismatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("file content does not match digest")
    }
}

impl error::Error for DigestMismatch { }


//------------ ChainValidationError ------------------------------------------

/// An object could not be chained up to a validated certificate.
///
/// This covers unresolved or duplicate key identifiers, resources not
/// covered by the issuer, bad signatures, revoked or expired certificates.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChainValidationError {
    msg: Cow<'static, str>,
}

impl ChainValidationError {
    pub fn new(msg: impl Into<Cow<'static, str>>) -> Self {
        ChainValidationError { msg: msg.into() }
    }
}

impl fmt::Display for ChainValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.msg)
    }
}

impl error::Error for ChainValidationError { }


//------------ Stale ---------------------------------------------------------

/// A manifest is outside its validity window.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Stale;

impl fmt::Display for Stale {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("manifest is stale")
    }
}

impl error::Error for Stale { }


//------------ ObjectError ---------------------------------------------------

/// The recoverable errors that can happen while processing one object.
#[derive(Debug)]
pub enum ObjectError {
    Parse(ParseError),
    Digest(DigestMismatch),
    Chain(ChainValidationError),
    Stale(Stale),
}

impl ObjectError {
    /// Creates a chain validation error from a message.
    pub fn chain(msg: impl Into<Cow<'static, str>>) -> Self {
        ObjectError::Chain(ChainValidationError::new(msg))
    }

    /// Creates a parse error from a message.
    pub fn parse(msg: &'static str) -> Self {
        ObjectError::Parse(ParseError::new(ContentError::from_static(msg)))
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, ObjectError::Parse(_))
    }

    pub fn is_digest(&self) -> bool {
        matches!(self, ObjectError::Digest(_))
    }

    pub fn is_chain(&self) -> bool {
        matches!(self, ObjectError::Chain(_))
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, ObjectError::Stale(_))
    }
}

impl From<ParseError> for ObjectError {
    fn from(err: ParseError) -> Self {
        ObjectError::Parse(err)
    }
}

impl From<DecodeError<Infallible>> for ObjectError {
    fn from(err: DecodeError<Infallible>) -> Self {
        ObjectError::Parse(err.into())
    }
}

impl From<DigestMismatch> for ObjectError {
    fn from(err: DigestMismatch) -> Self {
        ObjectError::Digest(err)
    }
}

impl From<ChainValidationError> for ObjectError {
    fn from(err: ChainValidationError) -> Self {
        ObjectError::Chain(err)
    }
}

impl From<Stale> for ObjectError {
    fn from(err: Stale) -> Self {
        ObjectError::Stale(err)
    }
}

impl fmt::Display for ObjectError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ObjectError::Parse(ref err) => {
                write!(f, "parse error: {}", err)
            }
            ObjectError::Digest(ref err) => err.fmt(f),
            ObjectError::Chain(ref err) => {
                write!(f, "validation failed: {}", err)
            }
            ObjectError::Stale(ref err) => err.fmt(f),
        }
    }
}

impl error::Error for ObjectError { }


//------------ Fatal ---------------------------------------------------------

/// An error that terminates the whole run.
#[derive(Debug)]
pub enum Fatal {
    /// The channel to the fetcher broke down.
    BrokenChannel,

    /// The global watchdog expired.
    Watchdog,

    /// The cache directory could not be prepared.
    Cache(io::Error),
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Fatal::BrokenChannel => {
                f.write_str("fetcher channel closed unexpectedly")
            }
            Fatal::Watchdog => f.write_str("watchdog timeout, run aborted"),
            Fatal::Cache(ref err) => {
                write!(f, "failed to prepare cache directory: {}", err)
            }
        }
    }
}

impl error::Error for Fatal { }


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kinds() {
        assert!(ObjectError::parse("bad").is_parse());
        assert!(ObjectError::from(DigestMismatch).is_digest());
        assert!(ObjectError::chain("no parent").is_chain());
        assert!(ObjectError::from(Stale).is_stale());
        assert_eq!(
            ObjectError::chain("no parent").to_string(),
            "validation failed: no parent"
        );
    }
}
