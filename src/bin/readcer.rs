use std::{env, fs};
use rpki_validator::repository::cert::Cert;
use rpki_validator::repository::resources::Afi;


fn main() {
    let path = match env::args().nth(1) {
        Some(path) => path,
        None => {
            println!("Usage: readcer <path>");
            return
        }
    };
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) => {
            println!("Can’t read file: {}", err);
            return;
        }
    };
    let cert = match Cert::decode(data.as_ref()) {
        Ok(cert) => cert,
        Err(err) => {
            println!("Can’t decode cert: {}", err);
            return
        }
    };

    println!("Serial:      {}", cert.serial_number());
    println!("Not before:  {}", cert.validity().not_before());
    println!("Not after:   {}", cert.validity().not_after());
    println!("Purpose:     {:?}", cert.purpose());
    println!("SKI:         {}", cert.subject_key_identifier());
    if let Some(aki) = cert.authority_key_identifier() {
        println!("AKI:         {}", aki);
    }
    for (label, uri) in [
        ("CRL:        ", cert.crl_uri()),
        ("Issuer:     ", cert.ca_issuer()),
        ("Repository: ", cert.ca_repository()),
        ("Manifest:   ", cert.rpki_manifest()),
        ("Object:     ", cert.signed_object()),
    ] {
        if let Some(uri) = uri {
            println!("{} {}", label, uri);
        }
    }
    if let Some(notify) = cert.rpki_notify() {
        println!("Notify:      {}", notify);
    }
    if cert.as_resources().is_inherited() {
        println!("AS:          inherit");
    }
    else {
        for entry in cert.as_resources().entries() {
            println!("AS:          {}", entry);
        }
    }
    for afi in [Afi::Ipv4, Afi::Ipv6] {
        if cert.ip_resources().is_inherited(afi) {
            println!("{}:        inherit", afi);
            continue
        }
        for entry in cert.ip_resources().entries(afi) {
            println!("{}:        {}", afi, entry.display(afi));
        }
    }
}
