//! URIs.
//!
//! RPKI uses two kinds of URIs: rsync URIs that name the location of
//! objects and publication points, and HTTPS URIs for RRDP notification
//! files and trust anchor certificates. Both are implemented here in a
//! simplified form that only allows what these uses need.

use std::{error, fmt, str};
use std::convert::TryFrom;
use std::path::PathBuf;
use std::str::FromStr;
use bytes::Bytes;
use serde::{Deserialize, Serialize};


//------------ Rsync ---------------------------------------------------------

/// An rsync URI.
///
/// This implements a simplified form of the the rsync URI defined in RFC 5781
/// which in turn references RFC 3986. Only absolute URIs including an
/// authority are allowed.
///
/// Parsing is simplified in that it only checks for the correct structure and
/// that no forbidden characters are present. In addition, the authority
/// must be a host name with an optional port, and neither the module nor
/// any path segment may be empty or refer to the current or parent
/// directory. This way, a URI can always be mapped safely into a local
/// cache directory.
//
//  Forbidden characters are
//
//     SPACE CONTROL " # < > ? [ \\ ] ^ ` { | }
//
#[derive(
    Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize
)]
#[serde(try_from = "String", into = "String")]
pub struct Rsync {
    module: RsyncModule,
    path: String,
}

impl Rsync {
    pub fn from_bytes(bytes: Bytes) -> Result<Self, Error> {
        Self::from_slice(bytes.as_ref())
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self, Error> {
        if !is_uri_ascii(slice) {
            return Err(Error::NotAscii)
        }
        let rest = Scheme::Rsync.strip(slice)?;

        // is_uri_ascii guarantees ASCII and thus UTF-8.
        let rest = str::from_utf8(rest).map_err(|_| Error::NotAscii)?;
        let mut parts = rest.splitn(3, '/');
        let authority = parts.next().unwrap_or_default();
        let module = parts.next().ok_or(Error::BadUri)?;
        let path = parts.next().unwrap_or_default();
        check_path(path)?;
        Ok(Rsync {
            module: RsyncModule::new(authority, module)?,
            path: path.into(),
        })
    }

    /// Returns the module of this URI.
    pub fn module(&self) -> &RsyncModule {
        &self.module
    }

    /// Returns the path within the module.
    ///
    /// The path never starts with a slash.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the last segment of the path.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    /// Returns the URI of the directory containing this URI.
    ///
    /// Returns `None` if the URI refers to the module itself.
    pub fn parent(&self) -> Option<Self> {
        if self.path.is_empty() {
            return None
        }
        let trimmed = self.path.trim_end_matches('/');
        let path = match trimmed.rfind('/') {
            Some(idx) => &trimmed[..idx + 1],
            None => ""
        };
        Some(Rsync { module: self.module.clone(), path: path.into() })
    }

    /// Returns a new URI with `path` appended as a relative path.
    pub fn join(&self, path: &str) -> Result<Self, Error> {
        if !is_uri_ascii(path) {
            return Err(Error::NotAscii)
        }
        let mut res = String::with_capacity(self.path.len() + path.len() + 1);
        if !self.path.is_empty() {
            res.push_str(&self.path);
            if !self.path.ends_with('/') {
                res.push('/');
            }
        }
        res.push_str(path);
        check_path(&res)?;
        Ok(Rsync { module: self.module.clone(), path: res })
    }

    /// Returns whether the path ends with the given extension.
    pub fn ends_with(&self, extension: &str) -> bool {
        self.path.ends_with(extension)
    }

    /// Returns whether this URI lives underneath the directory `dir`.
    pub fn is_under(&self, dir: &Rsync) -> bool {
        if self.module != dir.module {
            return false
        }
        if dir.path.is_empty() {
            return true
        }
        if dir.path.ends_with('/') {
            self.path.starts_with(&dir.path)
        }
        else {
            self.path.len() > dir.path.len()
                && self.path.starts_with(&dir.path)
                && self.path.as_bytes()[dir.path.len()] == b'/'
        }
    }

    /// Returns the relative path of this URI inside a cache directory.
    ///
    /// This is the authority, the module, and the path as subsequent path
    /// components.
    pub fn cache_path(&self) -> PathBuf {
        let mut res = self.module.cache_path();
        for segment in self.path.split('/').filter(|s| !s.is_empty()) {
            res.push(segment)
        }
        res
    }
}


//--- FromStr and TryFrom

impl FromStr for Rsync {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_slice(s.as_bytes())
    }
}

impl TryFrom<String> for Rsync {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_slice(s.as_bytes())
    }
}

impl From<Rsync> for String {
    fn from(uri: Rsync) -> Self {
        uri.to_string()
    }
}


//--- Display

impl fmt::Display for Rsync {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.module, self.path)
    }
}


//------------ RsyncModule ---------------------------------------------------

/// The module part of an rsync URI.
///
/// This is the unit that is synchronized as a whole.
#[derive(
    Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize
)]
#[serde(try_from = "String", into = "String")]
pub struct RsyncModule {
    authority: String,
    module: String,
}

impl RsyncModule {
    fn new(authority: &str, module: &str) -> Result<Self, Error> {
        check_authority(authority)?;
        if module.is_empty() || module == "." || module == ".." {
            return Err(Error::BadUri)
        }
        Ok(RsyncModule {
            authority: authority.to_ascii_lowercase(),
            module: module.into(),
        })
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// Returns an rsync URI referring to the module itself.
    pub fn to_uri(&self) -> Rsync {
        Rsync { module: self.clone(), path: String::new() }
    }

    /// Returns the relative path of the module inside a cache directory.
    pub fn cache_path(&self) -> PathBuf {
        let mut res = PathBuf::from(&self.authority);
        res.push(&self.module);
        res
    }
}

impl TryFrom<String> for RsyncModule {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let uri = Rsync::from_slice(s.as_bytes())?;
        if !uri.path.is_empty() {
            return Err(Error::BadUri)
        }
        Ok(uri.module)
    }
}

impl From<RsyncModule> for String {
    fn from(module: RsyncModule) -> Self {
        module.to_string()
    }
}

impl fmt::Display for RsyncModule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "rsync://{}/{}/", self.authority, self.module)
    }
}


//------------ Https ---------------------------------------------------------

/// A simple HTTPS URI.
///
/// This supports only what we need for the references in RPKI objects and
/// trust anchor locators. In particular, this does not support the query
/// and fragment components of URIs.
#[derive(
    Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize
)]
#[serde(try_from = "String", into = "String")]
pub struct Https {
    host: String,
    path: String,
}

impl Https {
    pub fn from_bytes(bytes: Bytes) -> Result<Self, Error> {
        Self::from_slice(bytes.as_ref())
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self, Error> {
        if !is_uri_ascii(slice) {
            return Err(Error::NotAscii)
        }
        let rest = Scheme::Https.strip(slice)?;
        let rest = str::from_utf8(rest).map_err(|_| Error::NotAscii)?;
        let (host, path) = match rest.find('/') {
            Some(idx) => rest.split_at(idx),
            None => return Err(Error::BadUri)
        };
        check_authority(host)?;
        if path.len() < 2 {
            return Err(Error::BadUri)
        }
        Ok(Https {
            host: host.to_ascii_lowercase(),
            path: path.into()
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the path including the leading slash.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl FromStr for Https {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_slice(s.as_bytes())
    }
}

impl TryFrom<String> for Https {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_slice(s.as_bytes())
    }
}

impl From<Https> for String {
    fn from(uri: Https) -> Self {
        uri.to_string()
    }
}

impl fmt::Display for Https {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "https://{}{}", self.host, self.path)
    }
}


//------------ Scheme --------------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Scheme {
    Https,
    Rsync,
}

impl Scheme {
    fn as_str(self) -> &'static str {
        match self {
            Scheme::Https => "https://",
            Scheme::Rsync => "rsync://",
        }
    }

    /// Strips the scheme off the start of `slice`.
    ///
    /// The scheme is matched ignoring ASCII case.
    fn strip(self, slice: &[u8]) -> Result<&[u8], Error> {
        let scheme = self.as_str().as_bytes();
        if slice.len() > scheme.len()
            && slice[..scheme.len()].eq_ignore_ascii_case(scheme)
        {
            Ok(&slice[scheme.len()..])
        }
        else {
            Err(Error::BadScheme)
        }
    }
}


//------------ Helper Functions ----------------------------------------------

pub fn is_uri_ascii<S: AsRef<[u8]>>(slice: S) -> bool {
    slice.as_ref().iter().all(|&ch| {
        ch > b' ' && ch != b'"' && ch != b'#' && ch != b'<' && ch != b'>'
            && ch != b'?' && ch != b'[' && ch != b'\\' && ch != b']'
            && ch != b'^' && ch != b'`' && ch != b'{' && ch != b'|'
            && ch != b'}' && ch < 0x7F
    })
}

/// Checks that an authority is a host name with an optional port.
///
/// The host name consists of non-empty labels of letters, digits, and
/// hyphens separated by single dots.
fn check_authority(authority: &str) -> Result<(), Error> {
    let (host, port) = match authority.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (authority, None)
    };
    let host_ok = !host.is_empty() && host.split('.').all(|label| {
        !label.is_empty() && label.bytes().all(|ch| {
            ch.is_ascii_alphanumeric() || ch == b'-'
        })
    });
    let port_ok = port.map(|port| {
        !port.is_empty() && port.bytes().all(|ch| ch.is_ascii_digit())
    }).unwrap_or(true);
    if host_ok && port_ok {
        Ok(())
    }
    else {
        Err(Error::BadUri)
    }
}

/// Checks that a path doesn’t contain dot or empty segments.
///
/// A single trailing slash is allowed.
fn check_path(path: &str) -> Result<(), Error> {
    let path = path.strip_suffix('/').unwrap_or(path);
    if path.is_empty() {
        return Ok(())
    }
    if path.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        Err(Error::BadUri)
    }
    else {
        Ok(())
    }
}


//------------ Error ---------------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    NotAscii,
    BadUri,
    BadScheme,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            Error::NotAscii => "invalid characters",
            Error::BadUri => "bad URI",
            Error::BadScheme => "bad URI scheme",
        })
    }
}

impl error::Error for Error { }


//============ Tests =========================================================
