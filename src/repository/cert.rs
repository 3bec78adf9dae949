//! Resource certificates.
//!
//! The certificates used in RPKI are defined in [RFC 6487] as a profile of
//! the X.509 certificates of [RFC 5280] extended by the resource extensions
//! of [RFC 3779]. This module decodes them into a [`Cert`] and checks that
//! they follow the profile as far as this is possible without knowing the
//! issuer. Everything that needs the issuer happens during validation.
//!
//! [RFC 3779]: https://tools.ietf.org/html/rfc3779
//! [RFC 5280]: https://tools.ietf.org/html/rfc5280
//! [RFC 6487]: https://tools.ietf.org/html/rfc6487

use std::ops;
use bcder::decode;
use bcder::{BitString, Ia5String, Mode, OctetString, Oid, Tag};
use bcder::decode::{DecodeError, IntoSource, Source};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use crate::oid;
use crate::uri;
use crate::crypto::{KeyIdentifier, PublicKey, RpkiSignatureAlgorithm};
use super::object::ObjectType;
use super::resources::{AsResources, IpResources};
use super::x509::{update_first, Serial, SignedData, Time, Validity};


//------------ Cert ----------------------------------------------------------

/// A resource certificate.
///
/// ```txt
/// Certificate  ::=  SEQUENCE  {
///     tbsCertificate       TBSCertificate,
///     signatureAlgorithm   AlgorithmIdentifier,
///     signatureValue       BIT STRING  }
/// ```
///
/// The content of the certificate is available through dereferencing into
/// a [`TbsCert`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Cert {
    /// The outer structure of the certificate.
    #[serde(default)]
    signed_data: SignedData,

    /// The actual data of the certificate.
    #[serde(flatten)]
    tbs: TbsCert,
}

impl Cert {
    /// Decodes a source as a certificate.
    pub fn decode<S: IntoSource>(
        source: S
    ) -> Result<Self, DecodeError<<S::Source as Source>::Error>> {
        Mode::Der.decode(source, Self::take_from)
    }

    /// Takes an encoded certificate from the beginning of a value.
    pub fn take_from<S: Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(Self::from_constructed)
    }

    /// Parses the content of a Certificate sequence.
    pub fn from_constructed<S: Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let signed_data = SignedData::from_constructed(cons)?;
        let tbs = Mode::Der.decode(
            signed_data.data().as_ref(), TbsCert::take_from
        ).map_err(DecodeError::convert)?;
        Ok(Cert { signed_data, tbs })
    }

    /// Returns a reference to the signed data wrapper.
    pub fn signed_data(&self) -> &SignedData {
        &self.signed_data
    }
}


//--- Deref and AsRef

impl ops::Deref for Cert {
    type Target = TbsCert;

    fn deref(&self) -> &Self::Target {
        &self.tbs
    }
}

impl AsRef<TbsCert> for Cert {
    fn as_ref(&self) -> &TbsCert {
        &self.tbs
    }
}


//------------ TbsCert -------------------------------------------------------

/// The data of a resource certificate.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TbsCert {
    serial_number: Serial,
    validity: Validity,
    #[serde(default)]
    public_key: PublicKey,

    /// Subject Key Identifier.
    ski: KeyIdentifier,

    /// Authority Key Identifier.
    ///
    /// Only a self-signed certificate may lack it.
    aki: Option<KeyIdentifier>,

    purpose: CertPurpose,

    #[serde(default)]
    as_resources: AsResources,

    #[serde(default)]
    ip_resources: IpResources,

    /// CRL Distribution Point.
    crl_uri: Option<uri::Rsync>,

    /// Authority Information Access of type `id-ad-caIssuer`.
    ca_issuer: Option<uri::Rsync>,

    /// Subject Information Access of type `id-ad-caRepository`
    ca_repository: Option<uri::Rsync>,

    /// Subject Information Access of type `id-ad-rpkiManifest`
    rpki_manifest: Option<uri::Rsync>,

    /// Subject Information Access of type `id-ad-signedObject`
    signed_object: Option<uri::Rsync>,

    /// Subject Information Access of type `id-ad-rpkiNotify`
    rpki_notify: Option<uri::Https>,
}

/// # Data Access
///
impl TbsCert {
    pub fn serial_number(&self) -> Serial {
        self.serial_number
    }

    pub fn validity(&self) -> Validity {
        self.validity
    }

    /// Returns the time the certificate expires.
    pub fn expires(&self) -> Time {
        self.validity.not_after()
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn subject_key_identifier(&self) -> KeyIdentifier {
        self.ski
    }

    pub fn authority_key_identifier(&self) -> Option<KeyIdentifier> {
        self.aki
    }

    pub fn purpose(&self) -> CertPurpose {
        self.purpose
    }

    pub fn is_ca(&self) -> bool {
        matches!(self.purpose, CertPurpose::Ca)
    }

    pub fn is_router(&self) -> bool {
        matches!(self.purpose, CertPurpose::Router)
    }

    /// Returns whether the certificate claims to be self-signed.
    ///
    /// This is the case if there is no AKI or if it equals the SKI.
    pub fn is_self_signed(&self) -> bool {
        match self.aki {
            Some(aki) => aki == self.ski,
            None => true
        }
    }

    pub fn as_resources(&self) -> &AsResources {
        &self.as_resources
    }

    pub fn ip_resources(&self) -> &IpResources {
        &self.ip_resources
    }

    pub fn crl_uri(&self) -> Option<&uri::Rsync> {
        self.crl_uri.as_ref()
    }

    pub fn ca_issuer(&self) -> Option<&uri::Rsync> {
        self.ca_issuer.as_ref()
    }

    pub fn ca_repository(&self) -> Option<&uri::Rsync> {
        self.ca_repository.as_ref()
    }

    pub fn rpki_manifest(&self) -> Option<&uri::Rsync> {
        self.rpki_manifest.as_ref()
    }

    pub fn signed_object(&self) -> Option<&uri::Rsync> {
        self.signed_object.as_ref()
    }

    pub fn rpki_notify(&self) -> Option<&uri::Https> {
        self.rpki_notify.as_ref()
    }
}

/// # Decoding
///
impl TbsCert {
    pub fn take_from<S: Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(Self::from_constructed)
    }

    /// Parses the content of a TBSCertificate sequence.
    ///
    /// ```txt
    /// TBSCertificate  ::=  SEQUENCE  {
    ///     version         [0]  EXPLICIT Version DEFAULT v1,
    ///     serialNumber         CertificateSerialNumber,
    ///     signature            AlgorithmIdentifier,
    ///     issuer               Name,
    ///     validity             Validity,
    ///     subject              Name,
    ///     subjectPublicKeyInfo SubjectPublicKeyInfo,
    ///     issuerUniqueID  [1]  IMPLICIT UniqueIdentifier OPTIONAL,
    ///     subjectUniqueID [2]  IMPLICIT UniqueIdentifier OPTIONAL,
    ///     extensions      [3]  EXPLICIT Extensions OPTIONAL
    /// }
    /// ```
    pub fn from_constructed<S: Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        // version [0] EXPLICIT Version DEFAULT v1.
        //  -- we need extensions so apparently, we want v3 which,
        //     confusingly, is 2.
        cons.take_constructed_if(Tag::CTX_0, |c| c.skip_u8_if(2))?;

        let serial_number = Serial::take_from(cons)?;
        RpkiSignatureAlgorithm::x509_take_from(cons)?;
        // The names are not used for anything in RPKI.
        cons.take_sequence(|cons| cons.skip_all())?; // issuer
        let validity = Validity::take_from(cons)?;
        cons.take_sequence(|cons| cons.skip_all())?; // subject
        let public_key = PublicKey::take_from(cons)?;

        // issuerUniqueID and subjectUniqueID must not be present in
        // resource certificates. So extension is next.
        let mut ext = Extensions::default();
        cons.take_constructed_if(Tag::CTX_3, |c| c.take_sequence(|cons| {
            while let Some(()) = cons.take_opt_sequence(|cons| {
                let id = Oid::take_from(cons)?;
                let critical = cons.take_opt_bool()?.unwrap_or(false);
                let value = OctetString::take_from(cons)?;
                Mode::Der.decode(value, |content| {
                    ext.take(&id, critical, content)
                }).map_err(DecodeError::convert)?;
                Ok(())
            })? { }
            Ok(())
        }))?;

        ext.into_tbs(serial_number, validity, public_key).map_err(|err| {
            cons.content_err(err)
        })
    }
}


//------------ CertPurpose ---------------------------------------------------

/// What a certificate is to be used for.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize
)]
#[serde(rename_all = "lowercase")]
pub enum CertPurpose {
    /// A CA certificate issuing further objects.
    Ca,

    /// A BGPsec router certificate.
    Router,

    /// The EE certificate of a signed object.
    Ee,
}


//------------ KeyUsage ------------------------------------------------------

/// The allowed key usages of a resource certificate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum KeyUsage {
    /// keyCertSign and cRLSign.
    Ca,

    /// digitalSignature.
    Ee,
}


//------------ Extensions ----------------------------------------------------

/// The extensions collected while decoding a certificate.
#[derive(Default)]
struct Extensions {
    basic_ca: Option<bool>,
    ski: Option<KeyIdentifier>,
    aki: Option<KeyIdentifier>,
    key_usage: Option<KeyUsage>,
    extended_key_usage: Option<(Vec<Oid<Bytes>>, bool)>,
    crl_uri: Option<uri::Rsync>,
    ca_issuer: Option<uri::Rsync>,
    sia: Option<Sia>,
    policies: bool,
    ip_resources: Option<IpResources>,
    as_resources: Option<AsResources>,
}

impl Extensions {
    /// Takes the value of a single extension.
    fn take<S: Source>(
        &mut self,
        id: &Oid,
        critical: bool,
        cons: &mut decode::Constructed<S>,
    ) -> Result<(), DecodeError<S::Error>> {
        if *id == oid::CE_BASIC_CONSTRAINTS {
            self.take_basic_constraints(cons)
        } else if *id == oid::CE_SUBJECT_KEY_IDENTIFIER {
            if critical {
                return Err(cons.content_err(
                    "critical Subject Key Identifier extension"
                ))
            }
            self.take_subject_key_identifier(cons)
        } else if *id == oid::CE_AUTHORITY_KEY_IDENTIFIER {
            if critical {
                return Err(cons.content_err(
                    "critical Authority Key Identifier extension"
                ))
            }
            self.take_authority_key_identifier(cons)
        } else if *id == oid::CE_KEY_USAGE {
            self.take_key_usage(cons)
        } else if *id == oid::CE_EXTENDED_KEY_USAGE {
            self.take_extended_key_usage(cons, critical)
        } else if *id == oid::CE_CRL_DISTRIBUTION_POINTS {
            self.take_crl_distribution_points(cons)
        } else if *id == oid::PE_AUTHORITY_INFO_ACCESS {
            self.take_authority_info_access(cons)
        } else if *id == oid::PE_SUBJECT_INFO_ACCESS {
            self.take_subject_info_access(cons)
        } else if *id == oid::CE_CERTIFICATE_POLICIES {
            self.take_certificate_policies(cons)
        } else if *id == oid::PE_IP_ADDR_BLOCK {
            if self.ip_resources.is_some() {
                return Err(cons.content_err(
                    "duplicate IP Resources extension"
                ))
            }
            self.ip_resources = Some(IpResources::take_from(cons)?);
            Ok(())
        } else if *id == oid::PE_AUTONOMOUS_SYS_IDS {
            if self.as_resources.is_some() {
                return Err(cons.content_err(
                    "duplicate AS Resources extension"
                ))
            }
            self.as_resources = Some(AsResources::take_from(cons)?);
            Ok(())
        } else if critical {
            Err(cons.content_err("unexpected critical extension"))
        } else {
            // RFC 5280 says we can ignore non-critical extensions we don’t
            // know of. RFC 6487 agrees. So let’s do that.
            cons.skip_all()
        }
    }

    /// Parses the Basic Constraints extension.
    ///
    /// ```text
    /// BasicConstraints        ::= SEQUENCE {
    ///     cA                      BOOLEAN DEFAULT FALSE,
    ///     pathLenConstraint       INTEGER (0..MAX) OPTIONAL
    /// }
    /// ```
    ///
    /// The extension is only present in CA certificates where cA must be
    /// true. The pathLenConstraint field must not be present.
    fn take_basic_constraints<S: Source>(
        &mut self, cons: &mut decode::Constructed<S>,
    ) -> Result<(), DecodeError<S::Error>> {
        if self.basic_ca.is_some() {
            return Err(cons.content_err(
                "duplicate Basic Constraints extension"
            ))
        }
        cons.take_sequence(|cons| {
            self.basic_ca = Some(cons.take_opt_bool()?.unwrap_or(false));
            if cons.take_opt_u64()?.is_some() {
                Err(cons.content_err(
                    "pathLenConstraint in Basic Constraints extension"
                ))
            } else {
                Ok(())
            }
        })
    }

    /// Parses the Subject Key Identifier extension.
    ///
    /// ```text
    /// SubjectKeyIdentifier ::= KeyIdentifier
    /// ```
    ///
    /// The extension must be present, non-critical, and contain the 160 bit
    /// SHA-1 hash of the subject public key.
    fn take_subject_key_identifier<S: Source>(
        &mut self, cons: &mut decode::Constructed<S>,
    ) -> Result<(), DecodeError<S::Error>> {
        if self.ski.is_some() {
            return Err(cons.content_err(
                "duplicate Subject Key Identifier extension"
            ))
        }
        self.ski = Some(KeyIdentifier::take_from(cons)?);
        Ok(())
    }

    /// Parses the Authority Key Identifier extension.
    ///
    /// ```text
    /// AuthorityKeyIdentifier ::= SEQUENCE {
    ///   keyIdentifier             [0] KeyIdentifier           OPTIONAL,
    ///   authorityCertIssuer       [1] GeneralNames            OPTIONAL,
    ///   authorityCertSerialNumber [2] CertificateSerialNumber OPTIONAL  }
    /// ```
    ///
    /// Must be present except in self-signed CA certificates where it is
    /// optional. The keyIdentifier field must be present, the other must not
    /// be.
    fn take_authority_key_identifier<S: Source>(
        &mut self, cons: &mut decode::Constructed<S>,
    ) -> Result<(), DecodeError<S::Error>> {
        if self.aki.is_some() {
            return Err(cons.content_err(
                "duplicate Authority Key Identifier extension"
            ))
        }
        self.aki = Some(cons.take_sequence(|cons| {
            cons.take_value_if(Tag::CTX_0, KeyIdentifier::from_content)
        })?);
        Ok(())
    }

    /// Parses the Key Usage extension.
    ///
    /// ```text
    /// KeyUsage ::= BIT STRING {
    ///      digitalSignature        (0),
    ///      nonRepudiation          (1),
    ///      keyEncipherment         (2),
    ///      dataEncipherment        (3),
    ///      keyAgreement            (4),
    ///      keyCertSign             (5),
    ///      cRLSign                 (6),
    ///      encipherOnly            (7),
    ///      decipherOnly            (8) }
    /// ```
    ///
    /// Must be present. In CA certificates, keyCertSign and CRLSign must be
    /// set, in EE certificates, digitalSignatures must be set.
    fn take_key_usage<S: Source>(
        &mut self, cons: &mut decode::Constructed<S>,
    ) -> Result<(), DecodeError<S::Error>> {
        if self.key_usage.is_some() {
            return Err(cons.content_err("duplicate Key Usage extension"))
        }
        let bits = BitString::take_from(cons)?;
        self.key_usage = Some(
            if bits.bit(5) && bits.bit(6) {
                KeyUsage::Ca
            }
            else if bits.bit(0) {
                KeyUsage::Ee
            }
            else {
                return Err(cons.content_err("invalid Key Usage"))
            }
        );
        Ok(())
    }

    /// Parses the Extended Key Usage extension.
    ///
    /// ```text
    /// ExtKeyUsageSyntax ::= SEQUENCE SIZE (1..MAX) OF KeyPurposeId
    /// KeyPurposeId ::= OBJECT IDENTIFIER
    /// ```
    ///
    /// May only be present in router certificates. Whether its content is
    /// acceptable is decided once we know the other extensions.
    fn take_extended_key_usage<S: Source>(
        &mut self, cons: &mut decode::Constructed<S>, critical: bool,
    ) -> Result<(), DecodeError<S::Error>> {
        if self.extended_key_usage.is_some() {
            return Err(cons.content_err(
                "duplicate Extended Key Usage extension"
            ))
        }
        let purposes = cons.take_sequence(|cons| {
            let mut res = Vec::new();
            while let Some(id) = Oid::take_opt_from(cons)? {
                res.push(id);
            }
            Ok(res)
        })?;
        if purposes.is_empty() {
            return Err(cons.content_err("empty Extended Key Usage"))
        }
        self.extended_key_usage = Some((purposes, critical));
        Ok(())
    }

    /// Parses the CRL Distribution Points extension.
    ///
    /// ```text
    /// CRLDistributionPoints ::= SEQUENCE SIZE (1..MAX) OF DistributionPoint
    ///
    /// DistributionPoint ::= SEQUENCE {
    ///    distributionPoint       [0]     DistributionPointName OPTIONAL,
    ///    reasons                 [1]     ReasonFlags OPTIONAL,
    ///    cRLIssuer               [2]     GeneralNames OPTIONAL }
    ///
    /// DistributionPointName ::= CHOICE {
    ///    fullName                [0]     GeneralNames,
    ///    nameRelativeToCRLIssuer [1]     RelativeDistinguishedName }
    /// ```
    ///
    /// Must be present except in self-signed certificates.
    ///
    /// It must contain exactly one Distribution Point. Only its
    /// distributionPoint field must be present and it must contain
    /// the fullName choice which can be one or more uniformResourceIdentifier
    /// choices.
    fn take_crl_distribution_points<S: Source>(
        &mut self, cons: &mut decode::Constructed<S>,
    ) -> Result<(), DecodeError<S::Error>> {
        if self.crl_uri.is_some() {
            return Err(cons.content_err(
                "duplicate CRL Distribution Points extension"
            ))
        }
        self.crl_uri = Some(
            // CRLDistributionPoints
            cons.take_sequence(|cons| {
                // DistributionPoint
                cons.take_sequence(|cons| {
                    // distributionPoint
                    cons.take_constructed_if(Tag::CTX_0, |cons| {
                        // fullName
                        cons.take_constructed_if(Tag::CTX_0, |cons| {
                            take_general_names_content(
                                cons,
                                "invalid CRL Distribution Points extension",
                                uri::Rsync::from_bytes,
                            )
                        })
                    })
                })
            })?
        );
        Ok(())
    }

    /// Parses the Authority Information Access extension.
    ///
    /// ```text
    /// AuthorityInfoAccessSyntax  ::=
    ///         SEQUENCE SIZE (1..MAX) OF AccessDescription
    ///
    /// AccessDescription  ::=  SEQUENCE {
    ///         accessMethod          OBJECT IDENTIFIER,
    ///         accessLocation        GeneralName  }
    /// ```
    ///
    /// Must be present except in self-signed certificates. Must contain
    /// exactly one entry with accessMethod id-ad-caIssuers and URIs in the
    /// generalName. There must be one rsync URI, there may be more. We only
    /// support the one, though, so we’ll ignore the rest.
    fn take_authority_info_access<S: Source>(
        &mut self, cons: &mut decode::Constructed<S>,
    ) -> Result<(), DecodeError<S::Error>> {
        if self.ca_issuer.is_some() {
            return Err(cons.content_err(
                "duplicate Authority Information Access extension"
            ))
        }
        self.ca_issuer = Some(
            cons.take_sequence(|cons| {
                cons.take_sequence(|cons| {
                    oid::AD_CA_ISSUERS.skip_if(cons)?;
                    take_general_names_content(
                        cons,
                        "invalid Authority Information Access extension",
                        uri::Rsync::from_bytes,
                    )
                })
            })?
        );
        Ok(())
    }

    fn take_subject_info_access<S: Source>(
        &mut self, cons: &mut decode::Constructed<S>,
    ) -> Result<(), DecodeError<S::Error>> {
        if self.sia.is_some() {
            return Err(cons.content_err(
                "duplicate Subject Information Access extension"
            ))
        }
        self.sia = Some(Sia::take_from(cons)?);
        Ok(())
    }

    /// Parses the Certificate Policies extension.
    ///
    /// ```text
    /// certificatePolicies ::= SEQUENCE SIZE (1..MAX) OF PolicyInformation
    ///
    /// PolicyInformation ::= SEQUENCE {
    ///     policyIdentifier   CertPolicyId,
    ///     policyQualifiers   SEQUENCE SIZE (1..MAX) OF
    ///                             PolicyQualifierInfo OPTIONAL }
    /// ```
    ///
    /// Must be present with exactly one policy, the RPKI policy of RFC 6484.
    /// The policyQualifiers are not interesting for us.
    fn take_certificate_policies<S: Source>(
        &mut self, cons: &mut decode::Constructed<S>,
    ) -> Result<(), DecodeError<S::Error>> {
        if self.policies {
            return Err(cons.content_err(
                "duplicate Certificate Policies extension"
            ))
        }
        cons.take_sequence(|cons| {
            cons.take_sequence(|cons| {
                oid::CP_IPADDR_ASNUMBER.skip_if(cons)?;
                cons.skip_all()
            })
        })?;
        self.policies = true;
        Ok(())
    }

    /// Checks the collected extensions and produces the certificate data.
    fn into_tbs(
        self,
        serial_number: Serial,
        validity: Validity,
        public_key: PublicKey,
    ) -> Result<TbsCert, &'static str> {
        let ski = self.ski.ok_or(
            "missing Subject Key Identifier extension"
        )?;
        let key_usage = self.key_usage.ok_or(
            "missing Key Usage extension"
        )?;
        if !self.policies {
            return Err("missing Certificate Policies extension")
        }
        if self.ip_resources.is_none() && self.as_resources.is_none() {
            return Err("both AS and IP resources extensions are missing")
        }
        if ski != public_key.key_identifier() {
            return Err("Subject Key Identifier doesn’t match public key")
        }

        let purpose = match (self.basic_ca, self.extended_key_usage) {
            (Some(true), None) => CertPurpose::Ca,
            (Some(true), Some(_)) => {
                return Err("Extended Key Usage in CA certificate")
            }
            (Some(false), _) => {
                return Err("Basic Constraints without cA")
            }
            (None, Some((purposes, critical))) => {
                if critical {
                    return Err("critical Extended Key Usage extension")
                }
                if purposes.len() != 1
                    || purposes[0] != oid::KP_BGPSEC_ROUTER
                {
                    return Err("unsupported Extended Key Usage")
                }
                CertPurpose::Router
            }
            (None, None) => CertPurpose::Ee,
        };

        match purpose {
            CertPurpose::Ca => {
                if key_usage != KeyUsage::Ca {
                    return Err("invalid Key Usage for CA certificate")
                }
                if !public_key.allow_rpki_cert() {
                    return Err("invalid public key algorithm")
                }
            }
            CertPurpose::Ee => {
                if key_usage != KeyUsage::Ee {
                    return Err("invalid Key Usage for EE certificate")
                }
                if !public_key.allow_rpki_cert() {
                    return Err("invalid public key algorithm")
                }
            }
            CertPurpose::Router => {
                if key_usage != KeyUsage::Ee {
                    return Err("invalid Key Usage for router certificate")
                }
                if !public_key.allow_router_cert() {
                    return Err("invalid public key algorithm")
                }
                if self.ip_resources.is_some() {
                    return Err("IP resources in router certificate")
                }
            }
        }

        let sia = self.sia.unwrap_or_default();
        if purpose == CertPurpose::Ca {
            let repository = sia.ca_repository.as_ref().ok_or(
                "missing caRepository in Subject Information Access"
            )?;
            let manifest = sia.rpki_manifest.as_ref().ok_or(
                "missing rpkiManifest in Subject Information Access"
            )?;
            if !manifest.is_under(repository) {
                return Err("manifest outside of CA repository")
            }
            if
                ObjectType::from_file_name(manifest.file_name())
                    != Some(ObjectType::Mft)
            {
                return Err("manifest URI with wrong file extension")
            }
        }

        let self_signed = match self.aki {
            Some(aki) => aki == ski,
            None => true
        };
        if !self_signed {
            if self.ca_issuer.is_none() {
                return Err("missing Authority Information Access extension")
            }
            if self.crl_uri.is_none() {
                return Err("missing CRL Distribution Points extension")
            }
        }

        Ok(TbsCert {
            serial_number,
            validity,
            public_key,
            ski,
            aki: self.aki,
            purpose,
            as_resources: self.as_resources.unwrap_or_else(
                AsResources::missing
            ),
            ip_resources: self.ip_resources.unwrap_or_else(
                IpResources::missing
            ),
            crl_uri: self.crl_uri,
            ca_issuer: self.ca_issuer,
            ca_repository: sia.ca_repository,
            rpki_manifest: sia.rpki_manifest,
            signed_object: sia.signed_object,
            rpki_notify: sia.rpki_notify,
        })
    }
}


//------------ General Names -------------------------------------------------

/// Parses a GeneralNames value looking for exactly one URI.
///
/// ```text
/// GeneralNames ::= SEQUENCE SIZE (1..MAX) OF GeneralName
/// GeneralName ::= CHOICE {
///    ...
///    uniformResourceIdentifier       [6]     IA5String,
///    ... }
/// ```
///
/// Takes the first name for which the closure returns successfully. Ignores
/// values where the closure produces an error. If there is more than one case
/// where the closure returns successfully, that’s an error, too.
fn take_general_names_content<S: Source, F, T, E>(
    cons: &mut decode::Constructed<S>,
    error_msg: &'static str,
    mut op: F
) -> Result<T, DecodeError<S::Error>>
where F: FnMut(Bytes) -> Result<T, E> {
    let mut res = None;
    while let Some(()) = cons.take_opt_value_if(Tag::CTX_6, |content| {
        let uri = Ia5String::from_content(content)?;
        if let Ok(uri) = op(uri.into_bytes()) {
            if res.is_some() {
                return Err(content.content_err(error_msg))
            }
            res = Some(uri)
        }
        Ok(())
    })? {}
    match res {
        Some(res) => Ok(res),
        None => Err(cons.content_err(error_msg))
    }
}

fn take_general_name<S: Source, F, T, E>(
    cons: &mut decode::Constructed<S>,
    mut op: F
) -> Result<Option<T>, DecodeError<S::Error>>
where F: FnMut(Bytes) -> Result<T, E> {
    cons.take_value_if(Tag::CTX_6, |content| {
        Ia5String::from_content(content).map(|uri| {
            op(uri.into_bytes()).ok()
        })
    })
}


//------------ Sia -----------------------------------------------------------

/// Internal helper type for parsing Subject Information Access.
///
/// ```text
/// SubjectInfoAccessSyntax  ::=
///         SEQUENCE SIZE (1..MAX) OF AccessDescription
///
/// AccessDescription  ::=  SEQUENCE {
///         accessMethod          OBJECT IDENTIFIER,
///         accessLocation        GeneralName  }
/// ```
///
/// For CA certificates, there must be two AccessDescriptions, one with
/// id-ad-caRepository and one with id-ad-rpkiManifest, both with rsync
/// URIs. Additionally, an id-ad-rpkiNotify may be present with a HTTPS URI.
/// For EE certificates, there should be an id-ad-signedObject.
///
/// Only the first usable URI of each kind is kept. Since we don’t know what
/// kind of certificate we have yet, the requirements are checked later.
#[derive(Clone, Debug, Default)]
struct Sia {
    ca_repository: Option<uri::Rsync>,
    rpki_manifest: Option<uri::Rsync>,
    signed_object: Option<uri::Rsync>,
    rpki_notify: Option<uri::Https>,
}

impl Sia {
    fn take_from<S: Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let mut sia = Sia::default();
        let mut any_seen = false;
        cons.take_sequence(|cons| {
            while let Some(()) = cons.take_opt_sequence(|cons| {
                let oid = Oid::take_from(cons)?;
                any_seen = true;
                if oid == oid::AD_CA_REPOSITORY {
                    update_first(&mut sia.ca_repository, || {
                        take_general_name(
                            cons, uri::Rsync::from_bytes
                        )
                    })
                }
                else if oid == oid::AD_RPKI_MANIFEST {
                    update_first(&mut sia.rpki_manifest, || {
                        take_general_name(
                            cons, uri::Rsync::from_bytes
                        )
                    })
                }
                else if oid == oid::AD_SIGNED_OBJECT {
                    update_first(&mut sia.signed_object, || {
                        take_general_name(
                            cons, uri::Rsync::from_bytes
                        )
                    })
                }
                else if oid == oid::AD_RPKI_NOTIFY {
                    update_first(&mut sia.rpki_notify, || {
                        take_general_name(
                            cons, uri::Https::from_bytes
                        )
                    })
                }
                else {
                    // Since this is DER, skipping can’t be tricked into
                    // reading forever.
                    cons.skip_all()
                }
            })? { }
            Ok(())
        })?;
        if any_seen {
            Ok(sia)
        }
        else {
            Err(cons.content_err(
                "empty Subject Information Access extension"
            ))
        }
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::repository::resources::{Afi, Asn};
    use crate::repository::test::cert::{
        as_id, as_range, ip_prefix, DerData, TbsBuilder, TestKey,
    };

    const REPO: &str = "rsync://example.com/module/ca/";

    fn ca_builder(key: &TestKey, issuer: &TestKey) -> TbsBuilder {
        TbsBuilder::v3(key)
            .subject_key_id(key, false)
            .authority_key_id(issuer)
            .crl_uri("rsync://example.com/module/ta/ta.crl")
            .rpki_authority_info_access("rsync://example.com/module/ta.cer")
            .rpki_ca(REPO)
            .ip_resources(
                Some(DerData::sequence(&[
                    ip_prefix(Afi::Ipv4, "10.0.0.0/8")
                ])),
                None
            )
            .as_resources(DerData::sequence(&[as_id(65000)]))
    }

    #[test]
    fn decode_ca_cert() {
        let key = TestKey::rsa(1);
        let issuer = TestKey::rsa(2);
        let cert = Cert::decode(
            ca_builder(&key, &issuer).into_cert().as_ref()
        ).unwrap();
        assert_eq!(cert.purpose(), CertPurpose::Ca);
        assert_eq!(cert.subject_key_identifier(), key.id);
        assert_eq!(cert.authority_key_identifier(), Some(issuer.id));
        assert!(!cert.is_self_signed());
        assert_eq!(
            cert.rpki_manifest().unwrap().to_string(),
            "rsync://example.com/module/ca/ca.mft"
        );
        assert_eq!(
            cert.crl_uri().unwrap().file_name(), "ta.crl"
        );
        assert!(cert.as_resources().covers(Asn::from(65000), Asn::from(65000)));
        assert!(cert.ip_resources().has_concrete(Afi::Ipv4));
        assert!(!cert.ip_resources().has_concrete(Afi::Ipv6));
    }

    #[test]
    fn decode_ta_cert() {
        let key = TestKey::rsa(1);
        let cert = Cert::decode(
            TbsBuilder::v3(&key)
                .subject_key_id(&key, false)
                .rpki_ca(REPO)
                .as_resources(DerData::sequence(&[as_range(0, u32::MAX)]))
                .into_cert()
                .as_ref()
        ).unwrap();
        assert!(cert.is_self_signed());
        assert!(cert.crl_uri().is_none());
        assert!(cert.ca_issuer().is_none());
    }

    #[test]
    fn reject_critical_ski() {
        let key = TestKey::rsa(1);
        let issuer = TestKey::rsa(2);
        let der = TbsBuilder::v3(&key)
            .subject_key_id(&key, true)
            .authority_key_id(&issuer)
            .crl_uri("rsync://example.com/module/ta/ta.crl")
            .rpki_authority_info_access("rsync://example.com/module/ta.cer")
            .rpki_ca(REPO)
            .as_resources(DerData::sequence(&[as_id(65000)]))
            .into_cert();
        assert!(Cert::decode(der.as_ref()).is_err());
    }

    #[test]
    fn reject_aki_with_serial() {
        let key = TestKey::rsa(1);
        let issuer = TestKey::rsa(2);
        let der = TbsBuilder::v3(&key)
            .subject_key_id(&key, false)
            .authority_key_id_with_serial(&issuer)
            .crl_uri("rsync://example.com/module/ta/ta.crl")
            .rpki_authority_info_access("rsync://example.com/module/ta.cer")
            .rpki_ca(REPO)
            .as_resources(DerData::sequence(&[as_id(65000)]))
            .into_cert();
        assert!(Cert::decode(der.as_ref()).is_err());
    }

    #[test]
    fn reject_missing_aia() {
        let key = TestKey::rsa(1);
        let issuer = TestKey::rsa(2);
        let der = TbsBuilder::v3(&key)
            .subject_key_id(&key, false)
            .authority_key_id(&issuer)
            .crl_uri("rsync://example.com/module/ta/ta.crl")
            .rpki_ca(REPO)
            .as_resources(DerData::sequence(&[as_id(65000)]))
            .into_cert();
        assert!(Cert::decode(der.as_ref()).is_err());
    }

    #[test]
    fn reject_manifest_outside_repository() {
        let key = TestKey::rsa(1);
        let der = TbsBuilder::v3(&key)
            .subject_key_id(&key, false)
            .basic_constraints(true)
            .key_usage_ca()
            .rpki_ca_subject_info_access(
                REPO, "rsync://example.com/module/other/ca.mft"
            )
            .rpki_cert_policies()
            .as_resources(DerData::sequence(&[as_id(65000)]))
            .into_cert();
        assert!(Cert::decode(der.as_ref()).is_err());

        let der = TbsBuilder::v3(&key)
            .subject_key_id(&key, false)
            .basic_constraints(true)
            .key_usage_ca()
            .rpki_ca_subject_info_access(
                REPO, "rsync://example.com/module/ca/ca.roa"
            )
            .rpki_cert_policies()
            .as_resources(DerData::sequence(&[as_id(65000)]))
            .into_cert();
        assert!(Cert::decode(der.as_ref()).is_err());
    }

    #[test]
    fn reject_overlapping_as_resources() {
        let key = TestKey::rsa(1);
        let issuer = TestKey::rsa(2);
        let der = TbsBuilder::v3(&key)
            .subject_key_id(&key, false)
            .authority_key_id(&issuer)
            .crl_uri("rsync://example.com/module/ta/ta.crl")
            .rpki_authority_info_access("rsync://example.com/module/ta.cer")
            .rpki_ca(REPO)
            .as_resources(DerData::sequence(&[
                as_range(10, 20), as_range(15, 25)
            ]))
            .into_cert();
        assert!(Cert::decode(der.as_ref()).is_err());
    }

    #[test]
    fn router_cert() {
        let key = TestKey::ecdsa(1);
        let issuer = TestKey::rsa(2);
        let builder = || {
            TbsBuilder::v3(&key)
                .subject_key_id(&key, false)
                .authority_key_id(&issuer)
                .crl_uri("rsync://example.com/module/ta/ta.crl")
                .rpki_authority_info_access(
                    "rsync://example.com/module/ta.cer"
                )
                .key_usage_ee()
                .rpki_cert_policies()
                .as_resources(DerData::sequence(&[as_id(65000)]))
        };
        let cert = Cert::decode(
            builder()
                .extended_key_usage(&[oid::KP_BGPSEC_ROUTER], false)
                .into_cert()
                .as_ref()
        ).unwrap();
        assert!(cert.is_router());

        // Critical EKU.
        assert!(Cert::decode(
            builder()
                .extended_key_usage(&[oid::KP_BGPSEC_ROUTER], true)
                .into_cert()
                .as_ref()
        ).is_err());

        // Additional purpose.
        assert!(Cert::decode(
            builder()
                .extended_key_usage(
                    &[oid::KP_BGPSEC_ROUTER, oid::AD_CA_ISSUERS], false
                )
                .into_cert()
                .as_ref()
        ).is_err());
    }

    #[test]
    fn ee_cert() {
        let key = TestKey::rsa(1);
        let issuer = TestKey::rsa(2);
        let cert = Cert::decode(
            TbsBuilder::v3(&key)
                .subject_key_id(&key, false)
                .authority_key_id(&issuer)
                .crl_uri("rsync://example.com/module/ca/ca.crl")
                .rpki_authority_info_access(
                    "rsync://example.com/module/ca.cer"
                )
                .key_usage_ee()
                .rpki_ee_subject_info_access(
                    "rsync://example.com/module/ca/a.roa"
                )
                .rpki_cert_policies()
                .ip_resources(
                    Some(DerData::raw(b"\x05\x00")), None
                )
                .into_cert()
                .as_ref()
        ).unwrap();
        assert_eq!(cert.purpose(), CertPurpose::Ee);
        assert!(cert.ip_resources().is_inherited(Afi::Ipv4));
        assert!(cert.as_resources().is_empty());
        assert_eq!(
            cert.signed_object().unwrap().file_name(), "a.roa"
        );
    }

    #[test]
    fn serde_json_cert() {
        let cert: Cert = serde_json::from_str(r#"{
            "serial_number": "01",
            "validity": {
                "not_before": "2020-01-01T00:00:00Z",
                "not_after": "2030-01-01T00:00:00Z"
            },
            "ski": "0000000000000000000000000000000000000001",
            "aki": null,
            "purpose": "ca",
            "as_resources": ["0-4294967295"],
            "ip_resources": {"v4": ["0.0.0.0/0"]},
            "ca_repository": "rsync://example.com/module/ta/",
            "rpki_manifest": "rsync://example.com/module/ta/ta.mft"
        }"#).unwrap();
        assert!(cert.is_ca());
        assert!(cert.is_self_signed());
        assert!(cert.as_resources().covers(Asn::MIN, Asn::MAX));
    }
}
