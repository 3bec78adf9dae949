//! Checking certificates against their issuers.
//!
//! The central pieces are [`valid_as`] and [`valid_ip`] which check that a
//! range of resources is covered by a validated certificate. If that
//! certificate inherits its resources, the check moves up to its issuer
//! until a certificate with concrete resources is found.
//!
//! The remaining functions perform the full set of checks for trust
//! anchors, CRLs, and issued certificates.

use crate::error::{ChainValidationError, ObjectError};
use crate::repository::cert::Cert;
use crate::repository::crl::Crl;
use crate::repository::resources::{Addr, Afi, Asn};
use crate::repository::tal::Tal;
use crate::repository::x509::Time;
use super::auth::AuthTree;
use super::provider::Provider;


//------------ Resource Coverage ---------------------------------------------

/// Checks that the AS range from `min` to `max` is covered.
///
/// The check starts at the certificate with index `idx` in the tree. If
/// that certificate has concrete AS resources, they have to cover the
/// range. Otherwise the check is repeated for its issuer. If a trust
/// anchor is reached without finding concrete resources, the range isn’t
/// covered.
pub fn valid_as(
    auth: &AuthTree, min: Asn, max: Asn, idx: usize
) -> Result<(), ChainValidationError> {
    let record = auth.get(idx).ok_or_else(|| {
        ChainValidationError::new("unknown certificate index")
    })?;
    let resources = record.cert().as_resources();
    if resources.has_concrete() {
        if resources.covers(min, max) {
            Ok(())
        }
        else {
            Err(ChainValidationError::new(format!(
                "AS resources {}-{} not covered by issuer",
                min.into_u32(), max.into_u32()
            )))
        }
    }
    else if record.parent_idx() == idx {
        Err(ChainValidationError::new(format!(
            "AS resources {}-{} not covered by trust anchor",
            min.into_u32(), max.into_u32()
        )))
    }
    else {
        valid_as(auth, min, max, record.parent_idx())
    }
}

/// Checks that the address range from `min` to `max` is covered.
///
/// This works exactly like [`valid_as`] but for the addresses of the given
/// family.
pub fn valid_ip(
    auth: &AuthTree, afi: Afi, min: Addr, max: Addr, idx: usize
) -> Result<(), ChainValidationError> {
    let record = auth.get(idx).ok_or_else(|| {
        ChainValidationError::new("unknown certificate index")
    })?;
    let resources = record.cert().ip_resources();
    if resources.has_concrete(afi) {
        if resources.covers(afi, min, max) {
            Ok(())
        }
        else {
            Err(ChainValidationError::new(format!(
                "{} resources {}-{} not covered by issuer",
                afi, min.display(afi), max.display(afi)
            )))
        }
    }
    else if record.parent_idx() == idx {
        Err(ChainValidationError::new(format!(
            "{} resources {}-{} not covered by trust anchor",
            afi, min.display(afi), max.display(afi)
        )))
    }
    else {
        valid_ip(auth, afi, min, max, record.parent_idx())
    }
}

/// Checks that all concrete resources of a certificate are covered.
///
/// The certificate is checked against the chain starting at its issuer
/// `parent`. Inherited resources are skipped since they are covered by
/// definition.
pub fn check_resources(
    auth: &AuthTree, cert: &Cert, parent: usize
) -> Result<(), ChainValidationError> {
    for entry in cert.as_resources().entries() {
        if let Some((min, max)) = entry.bounds() {
            valid_as(auth, min, max, parent)?;
        }
    }
    for afi in [Afi::Ipv4, Afi::Ipv6] {
        for entry in cert.ip_resources().entries(afi) {
            if let Some((min, max)) = entry.bounds() {
                valid_ip(auth, afi, min, max, parent)?;
            }
        }
    }
    Ok(())
}

/// Checks that an EE certificate covers an AS range.
///
/// The concrete resources of the certificate are used if present.
/// Otherwise the check continues at its issuer `parent`.
pub fn ee_covers_as(
    auth: &AuthTree, ee: &Cert, parent: usize, min: Asn, max: Asn
) -> Result<(), ChainValidationError> {
    let resources = ee.as_resources();
    if resources.has_concrete() {
        if resources.covers(min, max) {
            Ok(())
        }
        else {
            Err(ChainValidationError::new(format!(
                "{} not covered by EE certificate", min
            )))
        }
    }
    else {
        valid_as(auth, min, max, parent)
    }
}

/// Checks that an EE certificate covers an address range.
pub fn ee_covers_ip(
    auth: &AuthTree, ee: &Cert, parent: usize,
    afi: Afi, min: Addr, max: Addr,
) -> Result<(), ChainValidationError> {
    let resources = ee.ip_resources();
    if resources.has_concrete(afi) {
        if resources.covers(afi, min, max) {
            Ok(())
        }
        else {
            Err(ChainValidationError::new(format!(
                "{} prefix {} not covered by EE certificate",
                afi, min.display(afi)
            )))
        }
    }
    else {
        valid_ip(auth, afi, min, max, parent)
    }
}


//------------ Trust Anchors -------------------------------------------------

/// Validates a trust anchor certificate against its TAL.
pub fn validate_ta<P: Provider>(
    provider: &P, cert: &Cert, tal: &Tal, now: Time,
) -> Result<(), ObjectError> {
    if !provider.keys_match(cert.public_key(), tal.key_info()) {
        return Err(ObjectError::chain(
            "trust anchor key doesn’t match the TAL"
        ))
    }
    if !cert.is_ca() {
        return Err(ObjectError::chain("trust anchor is not a CA"))
    }
    if !cert.is_self_signed() {
        return Err(ObjectError::chain("trust anchor is not self-signed"))
    }
    if cert.crl_uri().is_some() {
        return Err(ObjectError::chain(
            "trust anchor with CRL distribution point"
        ))
    }
    if cert.ca_issuer().is_some() {
        return Err(ObjectError::chain(
            "trust anchor with authority information access"
        ))
    }
    if cert.as_resources().is_inherited()
        || cert.ip_resources().any_inherited()
    {
        return Err(ObjectError::chain("trust anchor inherits resources"))
    }
    if cert.as_resources().is_empty() && cert.ip_resources().is_empty() {
        return Err(ObjectError::chain("trust anchor without resources"))
    }
    if !cert.validity().is_current(now) {
        return Err(ObjectError::chain("trust anchor is not current"))
    }
    provider.verify_signature(cert.signed_data(), cert.public_key())
}


//------------ CRLs ----------------------------------------------------------

/// Validates a CRL issued by the CA with index `issuer`.
pub fn validate_crl<P: Provider>(
    provider: &P, auth: &AuthTree, crl: &Crl, issuer: usize, now: Time,
) -> Result<(), ObjectError> {
    let issuer = auth.get(issuer).ok_or_else(|| {
        ObjectError::chain("unknown CRL issuer")
    })?.cert();
    if crl.authority_key_identifier() != issuer.subject_key_identifier() {
        return Err(ObjectError::chain("CRL issued by a different CA"))
    }
    if crl.this_update() > now {
        return Err(ObjectError::chain("CRL issued in the future"))
    }
    if crl.next_update() < now {
        return Err(ObjectError::chain("CRL has expired"))
    }
    provider.verify_signature(crl.signed_data(), issuer.public_key())
}


//------------ Issued Certificates -------------------------------------------

/// Validates a certificate issued by the CA with index `issuer`.
///
/// This checks the chain of custody, the validity, revocation, the
/// signature, and finally the resources. The certificate may be a CA,
/// router, or EE certificate.
pub fn validate_cert<P: Provider>(
    provider: &P,
    auth: &AuthTree,
    cert: &Cert,
    issuer: usize,
    crl: &Crl,
    now: Time,
) -> Result<(), ObjectError> {
    let issuer_cert = auth.get(issuer).ok_or_else(|| {
        ObjectError::chain("unknown issuer")
    })?.cert();
    let issuer_ski = issuer_cert.subject_key_identifier();
    if cert.authority_key_identifier() != Some(issuer_ski) {
        return Err(ObjectError::chain(
            "authority key identifier doesn’t match issuer"
        ))
    }
    if cert.subject_key_identifier() == issuer_ski {
        return Err(ObjectError::chain("certificate issued by itself"))
    }
    if cert.ca_issuer().is_none() {
        return Err(ObjectError::chain(
            "missing authority information access"
        ))
    }
    if cert.crl_uri().is_none() {
        return Err(ObjectError::chain("missing CRL distribution point"))
    }
    if crl.authority_key_identifier() != issuer_ski {
        return Err(ObjectError::chain("CRL of a different issuer"))
    }
    if !cert.validity().is_current(now) {
        return Err(ObjectError::chain("certificate is not current"))
    }
    if crl.contains(cert.serial_number()) {
        return Err(ObjectError::chain("certificate has been revoked"))
    }
    if cert.is_ca()
        && cert.as_resources().is_empty()
        && cert.ip_resources().is_empty()
    {
        return Err(ObjectError::chain("CA certificate without resources"))
    }
    provider.verify_signature(cert.signed_data(), issuer_cert.public_key())?;
    check_resources(auth, cert, issuer)?;
    Ok(())
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::validation::test::{
        time, tal, CertBuilder, CrlBuilder, JsonProvider
    };
    use crate::repository::object::{Object, ObjectType};
    use crate::validation::provider::DerProvider;

    fn asn(id: u32) -> Asn {
        Asn::from_u32(id)
    }

    fn v4(s: &str) -> Addr {
        Addr::parse(Afi::Ipv4, s).unwrap()
    }

    /// Builds a tree with a trust anchor and the given certificates below.
    ///
    /// Each certificate is issued by the previous one.
    fn tree(chain: Vec<Cert>) -> (AuthTree, Vec<usize>) {
        let mut auth = AuthTree::new();
        let mut res: Vec<usize> = Vec::new();
        for cert in chain {
            let parent = res.last().copied();
            res.push(auth.insert(cert, parent, "ta".into()).unwrap());
        }
        (auth, res)
    }

    #[test]
    fn as_coverage() {
        let (auth, idx) = tree(vec![
            CertBuilder::ca(1).as_resources(&["50-150"]).build(),
        ]);
        assert!(valid_as(&auth, asn(100), asn(100), idx[0]).is_ok());
        assert!(valid_as(&auth, asn(50), asn(150), idx[0]).is_ok());
        assert!(valid_as(&auth, asn(200), asn(200), idx[0]).is_err());
        assert!(valid_as(&auth, asn(100), asn(151), idx[0]).is_err());

        let child = CertBuilder::ca(2).issuer(1).as_resources(&["100"])
            .build();
        assert!(check_resources(&auth, &child, idx[0]).is_ok());
        let child = CertBuilder::ca(2).issuer(1).as_resources(&["200"])
            .build();
        assert!(check_resources(&auth, &child, idx[0]).is_err());
    }

    #[test]
    fn coverage_across_multiple_entries() {
        let (auth, idx) = tree(vec![
            CertBuilder::ca(1).as_resources(&["10-19", "20-29"])
                .ipv4(&["10.0.0.0/9", "10.128.0.0/9"]).build(),
        ]);
        assert!(valid_as(&auth, asn(15), asn(25), idx[0]).is_ok());
        assert!(valid_ip(
            &auth, Afi::Ipv4, v4("10.0.0.0"), v4("10.255.255.255"), idx[0]
        ).is_ok());
        assert!(valid_ip(
            &auth, Afi::Ipv4, v4("10.0.0.0"), v4("11.0.0.0"), idx[0]
        ).is_err());
    }

    #[test]
    fn inherited_resources_recurse() {
        let (auth, idx) = tree(vec![
            CertBuilder::ca(1).as_resources(&["0-1000"])
                .ipv4(&["10.0.0.0/8"]).build(),
            CertBuilder::ca(2).issuer(1).as_resources(&["inherit"])
                .ipv4(&["inherit"]).build(),
            CertBuilder::ca(3).issuer(2).as_resources(&["inherit"])
                .ipv4(&["inherit"]).build(),
        ]);

        // Starting at the inheriting certificates has to end up at the
        // trust anchor.
        assert!(valid_as(&auth, asn(500), asn(500), idx[2]).is_ok());
        assert!(valid_as(&auth, asn(2000), asn(2000), idx[2]).is_err());
        assert!(valid_ip(
            &auth, Afi::Ipv4, v4("10.1.0.0"), v4("10.1.255.255"), idx[1]
        ).is_ok());
        assert!(valid_ip(
            &auth, Afi::Ipv4, v4("11.1.0.0"), v4("11.1.255.255"), idx[2]
        ).is_err());

        // IPv6 isn’t present anywhere, so nothing is covered.
        let any = Addr::parse(Afi::Ipv6, "2001:db8::").unwrap();
        assert!(valid_ip(&auth, Afi::Ipv6, any, any, idx[2]).is_err());

        // A grandchild claiming resources is checked against the TA.
        let child = CertBuilder::ca(4).issuer(3).as_resources(&["999"])
            .build();
        assert!(check_resources(&auth, &child, idx[2]).is_ok());
        let child = CertBuilder::ca(4).issuer(3).as_resources(&["1001"])
            .build();
        assert!(check_resources(&auth, &child, idx[2]).is_err());
    }

    #[test]
    fn inheriting_root_covers_nothing() {
        let (auth, idx) = tree(vec![
            CertBuilder::ca(1).as_resources(&["inherit"]).build(),
        ]);
        assert!(valid_as(&auth, asn(1), asn(1), idx[0]).is_err());
    }

    #[test]
    fn ee_coverage() {
        let (auth, idx) = tree(vec![
            CertBuilder::ca(1).as_resources(&["65000"])
                .ipv4(&["10.0.0.0/8"]).build(),
        ]);
        let ee = CertBuilder::ee(2).issuer(1).ipv4(&["inherit"]).build();
        assert!(ee_covers_ip(
            &auth, &ee, idx[0], Afi::Ipv4, v4("10.0.0.0"), v4("10.0.0.255")
        ).is_ok());
        assert!(ee_covers_as(&auth, &ee, idx[0], asn(65000), asn(65000))
            .is_ok());

        let ee = CertBuilder::ee(2).issuer(1).ipv4(&["10.1.0.0/16"]).build();
        assert!(ee_covers_ip(
            &auth, &ee, idx[0], Afi::Ipv4, v4("10.0.0.0"), v4("10.0.0.255")
        ).is_err());
    }

    #[test]
    fn trust_anchor_checks() {
        let tal = tal("ta", 1);
        let now = time("2024-01-01T00:00:00Z");
        let good = CertBuilder::ca(1).as_resources(&["0-4294967295"]);
        assert!(validate_ta(&JsonProvider, &good.clone().build(), &tal, now)
            .is_ok());

        // Wrong key.
        let cert = CertBuilder::ca(2).as_resources(&["0-4294967295"]).build();
        assert!(validate_ta(&JsonProvider, &cert, &tal, now).is_err());

        // Inheriting.
        let cert = CertBuilder::ca(1).as_resources(&["inherit"])
            .ipv4(&["10.0.0.0/8"]).build();
        assert!(validate_ta(&JsonProvider, &cert, &tal, now).is_err());

        // CRL distribution point.
        let cert = good.clone()
            .crl_uri("rsync://example.net/repo/ta.crl").build();
        assert!(validate_ta(&JsonProvider, &cert, &tal, now).is_err());

        // Expired.
        let cert = good.clone().not_after("2023-01-01T00:00:00Z").build();
        assert!(validate_ta(&JsonProvider, &cert, &tal, now).is_err());

        // Bad signature.
        let cert = good.signed_by(3).build();
        assert!(validate_ta(&JsonProvider, &cert, &tal, now).is_err());
    }

    #[test]
    fn issued_certificate_checks() {
        let now = time("2024-01-01T00:00:00Z");
        let (auth, idx) = tree(vec![
            CertBuilder::ca(1).as_resources(&["0-4294967295"]).build(),
        ]);
        let crl = CrlBuilder::new(1).revoke(9).build();
        let good = CertBuilder::ca(2).issuer(1).as_resources(&["65000"]);
        assert!(validate_cert(
            &JsonProvider, &auth, &good.clone().build(), idx[0], &crl, now
        ).is_ok());

        let check = |cert: Cert| {
            let err = validate_cert(
                &JsonProvider, &auth, &cert, idx[0], &crl, now
            ).unwrap_err();
            assert!(err.is_chain(), "{}", err);
        };
        check(good.clone().serial(9).build());
        check(good.clone().signed_by(2).build());
        check(good.clone().not_before("2025-01-01T00:00:00Z").build());
        check(CertBuilder::ca(2).issuer(3).as_resources(&["65000"]).build());
        check(CertBuilder::ca(2).issuer(1).build());

        // A CRL for another issuer.
        let other = CrlBuilder::new(3).build();
        assert!(validate_cert(
            &JsonProvider, &auth, &good.build(), idx[0], &other, now
        ).is_err());
    }

    #[test]
    fn crl_checks() {
        let now = time("2024-01-01T00:00:00Z");
        let (auth, idx) = tree(vec![
            CertBuilder::ca(1).as_resources(&["0-4294967295"]).build(),
        ]);
        assert!(validate_crl(
            &JsonProvider, &auth, &CrlBuilder::new(1).build(), idx[0], now
        ).is_ok());
        assert!(validate_crl(
            &JsonProvider, &auth, &CrlBuilder::new(2).build(), idx[0], now
        ).is_err());
        assert!(validate_crl(
            &JsonProvider, &auth,
            &CrlBuilder::new(1).next_update("2023-12-31T00:00:00Z").build(),
            idx[0], now
        ).is_err());
        assert!(validate_crl(
            &JsonProvider, &auth,
            &CrlBuilder::new(1).this_update("2024-02-01T00:00:00Z").build(),
            idx[0], now
        ).is_err());
        assert!(validate_crl(
            &JsonProvider, &auth,
            &CrlBuilder::new(1).signed_by(2).build(),
            idx[0], now
        ).is_err());
    }

    fn der_cert(data: &[u8]) -> Cert {
        match DerProvider.decode(ObjectType::Cer, data, None).unwrap() {
            Object::Cert(cert) => cert,
            _ => panic!("not a certificate"),
        }
    }

    #[test]
    fn signed_chain() {
        let now = Time::utc(2026, 10, 18, 0, 0, 0).unwrap();
        let tal = Tal::read_named(
            "ta".into(),
            &mut include_bytes!("../../test-data/ta.tal").as_ref()
        ).unwrap();
        let ta = der_cert(include_bytes!("../../test-data/ta.cer"));
        validate_ta(&DerProvider, &ta, &tal, now).unwrap();

        let mut auth = AuthTree::new();
        let ta_idx = auth.insert(ta, None, "ta".into()).unwrap();
        let crl = match DerProvider.decode(
            ObjectType::Crl, include_bytes!("../../test-data/ta.crl"), None
        ).unwrap() {
            Object::Crl(crl) => crl,
            _ => panic!("not a CRL"),
        };
        validate_crl(&DerProvider, &auth, &crl, ta_idx, now).unwrap();

        let ca = der_cert(include_bytes!("../../test-data/ca.cer"));
        assert!(ca.is_ca());
        validate_cert(&DerProvider, &auth, &ca, ta_idx, &crl, now).unwrap();

        let roa = match DerProvider.decode(
            ObjectType::Roa, include_bytes!("../../test-data/route.roa"), None
        ).unwrap() {
            Object::Roa(roa) => roa,
            _ => panic!("not a ROA"),
        };
        assert_eq!(roa.asid(), asn(65000));
        assert_eq!(roa.prefixes().len(), 1);
        let prefix = roa.prefixes()[0];
        assert_eq!(prefix.afi(), Afi::Ipv4);
        assert_eq!(prefix.prefix().len(), 24);
        assert_eq!(prefix.prefix().min(), v4("10.0.0.0"));
        validate_cert(
            &DerProvider, &auth, roa.ee(), ta_idx, &crl, now
        ).unwrap();
        ee_covers_ip(
            &auth, roa.ee(), ta_idx, Afi::Ipv4,
            prefix.prefix().min(), prefix.prefix().max()
        ).unwrap();

        // The CA certificate is not the issuer of the ROA.
        let ca_idx = auth.insert(ca, Some(ta_idx), "ta".into()).unwrap();
        assert!(validate_cert(
            &DerProvider, &auth, roa.ee(), ca_idx, &crl, now
        ).is_err());
    }

    #[test]
    fn signed_chain_with_broken_signature() {
        let now = Time::utc(2026, 10, 18, 0, 0, 0).unwrap();
        let mut auth = AuthTree::new();
        let ta_idx = auth.insert(
            der_cert(include_bytes!("../../test-data/ta.cer")),
            None, "ta".into()
        ).unwrap();
        let crl = match DerProvider.decode(
            ObjectType::Crl, include_bytes!("../../test-data/ta.crl"), None
        ).unwrap() {
            Object::Crl(crl) => crl,
            _ => panic!("not a CRL"),
        };

        // The signature is the last thing in the certificate.
        let mut data = include_bytes!("../../test-data/ca.cer").to_vec();
        let last = data.len() - 1;
        data[last] ^= 0x01;
        let ca = der_cert(&data);
        assert!(validate_cert(
            &DerProvider, &auth, &ca, ta_idx, &crl, now
        ).is_err());

        // The message digest no longer matches the content.
        let mut data = include_bytes!("../../test-data/route.roa").to_vec();
        let pos = data.windows(4).position(|w| {
            w == [0x00, 0xfd, 0xe8, 0x30]
        }).unwrap();
        data[pos + 2] = 0xe9;
        assert!(DerProvider.decode(ObjectType::Roa, &data, None).is_err());
    }
}
