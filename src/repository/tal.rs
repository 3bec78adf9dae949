//! Trust Anchor Locators
//!
//! A TAL names where the certificate of a trust anchor can be fetched and
//! which public key it has to carry. The format is defined in RFC 8630:
//! optional comment lines starting with `#`, one or more URIs each on
//! its own line, an empty line, and finally the Base 64 encoded
//! SubjectPublicKeyInfo of the trust anchor’s key.

use std::{error, fmt, str};
use std::cmp::Ordering;
use std::convert::{Infallible, TryFrom};
use std::fs::{read_dir, DirEntry, File, ReadDir};
use std::io::{self, Read};
use std::path::Path;
use bytes::Bytes;
use bcder::decode;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use crate::uri;
use crate::crypto::PublicKey;
use crate::util::base64;


//------------ Tal -----------------------------------------------------------

/// A trust anchor locator.
#[derive(Clone, Debug)]
pub struct Tal {
    /// The name of the TAL.
    ///
    /// This is the file stem of the TAL file and labels all output derived
    /// from this trust anchor.
    name: String,

    /// The comment lines without the leading `#`.
    comments: Vec<String>,

    /// The URIs of the trust anchor certificate, HTTPS URIs first.
    uris: Vec<TalUri>,

    /// The key of the trust anchor certificate.
    key_info: PublicKey,
}

impl Tal {
    /// Returns an iterator over all the TAL files in a directory.
    ///
    /// Only files with a `.tal` extension are considered.
    pub fn read_dir<P: AsRef<Path>>(path: P) -> Result<TalIter, io::Error> {
        read_dir(path).map(TalIter)
    }

    /// Reads a TAL from a reader, naming it after the file stem of `path`.
    pub fn read<P: AsRef<Path>, R: Read>(
        path: P,
        reader: &mut R
    ) -> Result<Self, ReadError> {
        let name = match path.as_ref().file_stem() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => return Err(ReadError::BadName)
        };
        Self::read_named(name, reader)
    }

    /// Reads a TAL with the given name from a reader.
    pub fn read_named<R: Read>(
        name: String,
        reader: &mut R
    ) -> Result<Self, ReadError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        let mut data = data.as_slice();
        let mut comments = Vec::new();
        while let Some(&b'#') = data.first() {
            comments.push(Self::take_comment(&mut data)?);
        }
        let mut uris = Vec::new();
        while let Some(uri) = Self::take_uri(&mut data)? {
            uris.push(uri)
        }
        if uris.is_empty() {
            return Err(ReadError::NoUris)
        }
        let key_info = base64::Tal.decode_bytes(data)?;
        let key_info = PublicKey::decode(key_info.as_slice())?;
        let mut res = Tal { name, comments, uris, key_info };
        res.prefer_https();
        Ok(res)
    }

    /// Reorders the TAL URIs placing HTTPS URIs first.
    ///
    /// The method keeps the order within each scheme.
    pub fn prefer_https(&mut self) {
        self.uris.sort_by(|left, right| {
            match (left.is_https(), right.is_https()) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => Ordering::Equal
            }
        })
    }

    fn take_line<'a>(data: &mut &'a [u8]) -> Result<&'a [u8], ReadError> {
        if data.is_empty() {
            return Err(ReadError::UnexpectedEof)
        }
        let all: &'a [u8] = data;
        let mut split = all.splitn(2, |&ch| ch == b'\n');
        let line = split.next().unwrap_or_default();
        *data = split.next().unwrap_or_default();
        Ok(line.strip_suffix(b"\r").unwrap_or(line))
    }

    fn take_comment(data: &mut &[u8]) -> Result<String, ReadError> {
        let line = Self::take_line(data)?;
        let line = line.strip_prefix(b"#").unwrap_or(line);
        Ok(String::from_utf8_lossy(line).trim().to_string())
    }

    fn take_uri(data: &mut &[u8]) -> Result<Option<TalUri>, ReadError> {
        let line = Self::take_line(data)?;
        if line.is_empty() {
            Ok(None)
        }
        else {
            Ok(Some(TalUri::from_slice(line)?))
        }
    }
}

impl Tal {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    pub fn uris(&self) -> ::std::slice::Iter<TalUri> {
        self.uris.iter()
    }

    pub fn key_info(&self) -> &PublicKey {
        &self.key_info
    }
}


//------------ TalIter -------------------------------------------------------

pub struct TalIter(ReadDir);

impl Iterator for TalIter {
    type Item = Result<Tal, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.0.next() {
                Some(Ok(entry)) => {
                    match next_entry(&entry) {
                        Ok(Some(res)) => return Some(Ok(res)),
                        Ok(None) => { },
                        Err(err) => {
                            error!(
                                "Bad trust anchor {}: {}",
                                entry.path().display(), err
                            );
                            return Some(Err(err))
                        }
                    }
                }
                Some(Err(err)) => return Some(Err(err.into())),
                None => return None
            };
        }
    }
}

fn next_entry(entry: &DirEntry) -> Result<Option<Tal>, ReadError> {
    if !entry.file_type()?.is_file() {
        return Ok(None)
    }
    let path = entry.path();
    if path.extension().map(|ext| ext != "tal").unwrap_or(true) {
        return Ok(None)
    }
    debug!("Processing TAL {}", path.display());
    Tal::read(&path, &mut File::open(&path)?).map(Some)
}


//------------ TalUri --------------------------------------------------------

/// A URI of a trust anchor certificate.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum TalUri {
    Rsync(uri::Rsync),
    Https(uri::Https),
}

impl TalUri {
    pub fn from_string(s: String) -> Result<Self, uri::Error> {
        Self::from_bytes(Bytes::from(s))
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self, uri::Error> {
        Self::from_bytes(Bytes::copy_from_slice(slice))
    }

    pub fn from_bytes(bytes: Bytes) -> Result<Self, uri::Error> {
        if let Ok(uri) = uri::Rsync::from_bytes(bytes.clone()) {
            return Ok(TalUri::Rsync(uri))
        }
        uri::Https::from_bytes(bytes).map(Into::into)
    }

    pub fn is_rsync(&self) -> bool {
        matches!(*self, TalUri::Rsync(_))
    }

    pub fn is_https(&self) -> bool {
        matches!(*self, TalUri::Https(_))
    }

    pub fn as_rsync(&self) -> Option<&uri::Rsync> {
        match *self {
            TalUri::Rsync(ref uri) => Some(uri),
            TalUri::Https(_) => None,
        }
    }
}


//--- From

impl From<uri::Rsync> for TalUri {
    fn from(uri: uri::Rsync) -> Self {
        TalUri::Rsync(uri)
    }
}

impl From<uri::Https> for TalUri {
    fn from(uri: uri::Https) -> Self {
        TalUri::Https(uri)
    }
}

impl From<TalUri> for String {
    fn from(uri: TalUri) -> Self {
        uri.to_string()
    }
}


//--- TryFrom and FromStr

impl TryFrom<String> for TalUri {
    type Error = uri::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_string(s)
    }
}

impl str::FromStr for TalUri {
    type Err = uri::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(Bytes::copy_from_slice(s.as_ref()))
    }
}


//--- Display

impl fmt::Display for TalUri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            TalUri::Rsync(ref uri) => uri.fmt(f),
            TalUri::Https(ref uri) => uri.fmt(f)
        }
    }
}


//------------ ReadError -----------------------------------------------------

#[derive(Debug)]
pub enum ReadError {
    Io(io::Error),
    BadName,
    UnexpectedEof,
    NoUris,
    BadUri(uri::Error),
    BadKeyInfoEncoding(base64::DecodeError),
    BadKeyInfo(decode::DecodeError<Infallible>),
}

impl From<io::Error> for ReadError {
    fn from(err: io::Error) -> ReadError {
        ReadError::Io(err)
    }
}

impl From<uri::Error> for ReadError {
    fn from(err: uri::Error) -> ReadError {
        ReadError::BadUri(err)
    }
}

impl From<base64::DecodeError> for ReadError {
    fn from(err: base64::DecodeError) -> ReadError {
        ReadError::BadKeyInfoEncoding(err)
    }
}

impl From<decode::DecodeError<Infallible>> for ReadError {
    fn from(err: decode::DecodeError<Infallible>) -> ReadError {
        ReadError::BadKeyInfo(err)
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ReadError::Io(ref err) => err.fmt(f),
            ReadError::BadName
                => f.write_str("TAL path without a file name"),
            ReadError::UnexpectedEof
                => f.write_str("unexpected end of file"),
            ReadError::NoUris
                => f.write_str("TAL without URIs"),
            ReadError::BadUri(ref err)
                => write!(f, "bad trust anchor URI: {}", err),
            ReadError::BadKeyInfoEncoding(ref err)
                => write!(f, "bad key info: {}", err),
            ReadError::BadKeyInfo(ref err)
                => write!(f, "bad key info: {}", err),
        }
    }
}

impl error::Error for ReadError { }


//============ Testing =======================================================
