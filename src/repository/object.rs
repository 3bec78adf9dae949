//! Object types found in RPKI repositories.
//!
//! The type of an object is inferred from its file name extension. The
//! decoded objects themselves form the closed sum type [`Object`] so that
//! everything dispatching over them has to handle every kind.

use std::fmt;
use serde::{Deserialize, Serialize};
use super::aspa::Aspa;
use super::cert::Cert;
use super::crl::Crl;
use super::gbr::Gbr;
use super::manifest::Manifest;
use super::roa::Roa;
use super::rsc::Rsc;
use super::tak::Tak;


//------------ ObjectType ----------------------------------------------------

/// The kind of an RPKI object.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize
)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Cer,
    Crl,
    Mft,
    Roa,
    Aspa,
    Gbr,
    Rsc,
    Tak,
}

impl ObjectType {
    /// All object types in a stable order.
    pub const ALL: [ObjectType; 8] = [
        ObjectType::Cer, ObjectType::Crl, ObjectType::Mft, ObjectType::Roa,
        ObjectType::Aspa, ObjectType::Gbr, ObjectType::Rsc, ObjectType::Tak,
    ];

    /// Determines the object type from a file name.
    ///
    /// The extension is compared case-sensitively. Returns `None` for
    /// unknown extensions.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        match ext {
            "cer" => Some(ObjectType::Cer),
            "crl" => Some(ObjectType::Crl),
            "mft" => Some(ObjectType::Mft),
            "roa" => Some(ObjectType::Roa),
            "asa" => Some(ObjectType::Aspa),
            "gbr" => Some(ObjectType::Gbr),
            "sig" => Some(ObjectType::Rsc),
            "tak" => Some(ObjectType::Tak),
            _ => None
        }
    }

    /// Returns the file name extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ObjectType::Cer => "cer",
            ObjectType::Crl => "crl",
            ObjectType::Mft => "mft",
            ObjectType::Roa => "roa",
            ObjectType::Aspa => "asa",
            ObjectType::Gbr => "gbr",
            ObjectType::Rsc => "sig",
            ObjectType::Tak => "tak",
        }
    }

    /// Returns the position of the type in the dispatch order.
    ///
    /// Objects listed on a manifest are processed in ascending rank so that
    /// the CRL is known before any certificate is checked against it and
    /// certificates are processed before the payload objects.
    pub fn dispatch_rank(self) -> u8 {
        match self {
            ObjectType::Crl => 0,
            ObjectType::Cer => 1,
            ObjectType::Roa => 2,
            ObjectType::Gbr | ObjectType::Aspa | ObjectType::Tak => 3,
            ObjectType::Rsc => 4,
            ObjectType::Mft => 5,
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            ObjectType::Cer => "certificate",
            ObjectType::Crl => "CRL",
            ObjectType::Mft => "manifest",
            ObjectType::Roa => "ROA",
            ObjectType::Aspa => "ASPA",
            ObjectType::Gbr => "ghostbusters record",
            ObjectType::Rsc => "signed checklist",
            ObjectType::Tak => "trust anchor key",
        })
    }
}


//------------ Object --------------------------------------------------------

/// A decoded RPKI object.
#[derive(Clone, Debug)]
pub enum Object {
    Cert(Cert),
    Crl(Crl),
    Mft(Manifest),
    Roa(Roa),
    Aspa(Aspa),
    Gbr(Gbr),
    Rsc(Rsc),
    Tak(Tak),
}

impl Object {
    /// Returns the type of the object.
    pub fn object_type(&self) -> ObjectType {
        match *self {
            Object::Cert(_) => ObjectType::Cer,
            Object::Crl(_) => ObjectType::Crl,
            Object::Mft(_) => ObjectType::Mft,
            Object::Roa(_) => ObjectType::Roa,
            Object::Aspa(_) => ObjectType::Aspa,
            Object::Gbr(_) => ObjectType::Gbr,
            Object::Rsc(_) => ObjectType::Rsc,
            Object::Tak(_) => ObjectType::Tak,
        }
    }

    /// Returns the EE certificate of a signed object.
    ///
    /// Returns `None` for certificates and CRLs.
    pub fn ee_cert(&self) -> Option<&Cert> {
        match *self {
            Object::Cert(_) | Object::Crl(_) => None,
            Object::Mft(ref obj) => Some(obj.ee()),
            Object::Roa(ref obj) => Some(obj.ee()),
            Object::Aspa(ref obj) => Some(obj.ee()),
            Object::Gbr(ref obj) => Some(obj.ee()),
            Object::Rsc(ref obj) => Some(obj.ee()),
            Object::Tak(ref obj) => Some(obj.ee()),
        }
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn file_names() {
        assert_eq!(
            ObjectType::from_file_name("foo.cer"), Some(ObjectType::Cer)
        );
        assert_eq!(
            ObjectType::from_file_name("a.b.asa"), Some(ObjectType::Aspa)
        );
        assert_eq!(ObjectType::from_file_name("foo.CER"), None);
        assert_eq!(ObjectType::from_file_name("cer"), None);
        assert_eq!(ObjectType::from_file_name("foo.txt"), None);
        for kind in ObjectType::ALL {
            let name = format!("x.{}", kind.extension());
            assert_eq!(ObjectType::from_file_name(&name), Some(kind));
        }
    }

    #[test]
    fn dispatch_order() {
        let mut kinds = vec![
            ObjectType::Tak, ObjectType::Roa, ObjectType::Aspa,
            ObjectType::Cer, ObjectType::Gbr, ObjectType::Crl,
        ];
        kinds.sort_by_key(|kind| kind.dispatch_rank());
        assert_eq!(kinds[0], ObjectType::Crl);
        assert_eq!(kinds[1], ObjectType::Cer);
        assert_eq!(kinds[2], ObjectType::Roa);
    }
}
