//! Ghostbusters Records.
//!
//! A Ghostbusters record carries contact information for the operator of
//! a CA in the form of a vCard. See RFC 6493.

use serde::{Deserialize, Serialize};
use bcder::decode::ContentError;
use crate::oid;
use crate::error::{ObjectError, ParseError};
use super::cert::Cert;
use super::sigobj::SignedObject;


//------------ Gbr -----------------------------------------------------------

/// A decoded Ghostbusters record.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Gbr {
    /// The vCard text.
    vcard: String,

    /// The EE certificate.
    ee: Cert,
}

impl Gbr {
    /// Decodes and checks a Ghostbusters file.
    pub fn decode(
        data: &[u8], digest: Option<&[u8]>
    ) -> Result<Self, ObjectError> {
        let (content, ee) = SignedObject::decode_checked(
            data, oid::CT_RPKI_GHOSTBUSTERS, digest
        )?.into_parts();
        Ok(Self::decode_content(content.as_ref(), ee)?)
    }

    /// Decodes the content of a Ghostbusters record.
    ///
    /// The content is the vCard itself rather than some DER structure. It
    /// has to be UTF-8, start with a `BEGIN:VCARD` line, end with an
    /// `END:VCARD` line, and declare version 4.0.
    pub fn decode_content(
        content: &[u8], ee: Cert
    ) -> Result<Self, ParseError> {
        let vcard = std::str::from_utf8(content).map_err(|_| {
            ParseError::new(ContentError::from_static(
                "Ghostbusters record is not UTF-8"
            ))
        })?;
        let mut lines = vcard.lines().map(str::trim_end).filter(|line| {
            !line.is_empty()
        });
        if !lines.next().map(is_begin).unwrap_or(false) {
            return Err(ParseError::new(ContentError::from_static(
                "Ghostbusters record without BEGIN:VCARD"
            )))
        }
        let mut version = false;
        let mut end = false;
        for line in lines {
            if end {
                return Err(ParseError::new(ContentError::from_static(
                    "trailing data after END:VCARD"
                )))
            }
            if line.eq_ignore_ascii_case("END:VCARD") {
                end = true;
            }
            else if line.eq_ignore_ascii_case("VERSION:4.0") {
                version = true;
            }
        }
        if !end {
            return Err(ParseError::new(ContentError::from_static(
                "Ghostbusters record without END:VCARD"
            )))
        }
        if !version {
            return Err(ParseError::new(ContentError::from_static(
                "Ghostbusters record without vCard version 4.0"
            )))
        }
        Ok(Gbr { vcard: vcard.into(), ee })
    }

    /// Returns the vCard text.
    pub fn vcard(&self) -> &str {
        &self.vcard
    }

    pub fn ee(&self) -> &Cert {
        &self.ee
    }
}

fn is_begin(line: &str) -> bool {
    line.eq_ignore_ascii_case("BEGIN:VCARD")
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::repository::test::cert::TestKey;
    use crate::repository::test::cms::ee_cert;

    fn ee() -> Cert {
        Cert::decode(
            ee_cert(&TestKey::rsa(1), &TestKey::rsa(2)).as_ref()
        ).unwrap()
    }

    #[test]
    fn decode_vcard() {
        let gbr = Gbr::decode_content(
            b"BEGIN:VCARD\r\nVERSION:4.0\r\nFN:Operator\r\n\
              EMAIL:noc@example.net\r\nEND:VCARD\r\n",
            ee()
        ).unwrap();
        assert!(gbr.vcard().contains("noc@example.net"));
    }

    #[test]
    fn reject_bad_vcards() {
        assert!(Gbr::decode_content(
            b"VERSION:4.0\r\nEND:VCARD\r\n", ee()
        ).is_err());
        assert!(Gbr::decode_content(
            b"BEGIN:VCARD\r\nVERSION:3.0\r\nEND:VCARD\r\n", ee()
        ).is_err());
        assert!(Gbr::decode_content(
            b"BEGIN:VCARD\r\nVERSION:4.0\r\n", ee()
        ).is_err());
        assert!(Gbr::decode_content(
            b"BEGIN:VCARD\r\nVERSION:4.0\r\nEND:VCARD\r\nFN:x\r\n", ee()
        ).is_err());
        assert!(Gbr::decode_content(b"\xff\xfe", ee()).is_err());
    }
}
