use std::{env, fs};
use std::path::PathBuf;
use rpki_validator::crypto::DigestAlgorithm;
use rpki_validator::repository::manifest::Manifest;
use rpki_validator::util::hex;


fn main() {
    if let Err(err) = process() {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

fn process() -> Result<(), String> {
    let path = env::args().nth(1).map(PathBuf::from).ok_or(
        "Usage: readmft <path>"
    )?;
    let data = fs::read(&path).map_err(|err| {
        format!("Can’t read file: {}", err)
    })?;
    let manifest = Manifest::decode(data.as_ref(), None).map_err(|err| {
        format!("Can’t decode manifest: {}", err)
    })?;

    println!(
        "File hash:   {}",
        hex::encode_string(DigestAlgorithm::default().digest(&data).as_ref())
    );
    println!("This update: {}", manifest.this_update());
    println!("Next update: {}", manifest.next_update());
    println!("Number:      {}", manifest.number());
    println!();
    println!("File list:");
    for item in manifest.files() {
        println!("{} {}", item.hash(), item.file());
    }
    Ok(())
}
