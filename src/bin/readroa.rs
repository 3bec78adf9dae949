use std::{env, fs};
use rpki_validator::repository::roa::Roa;


fn main() {
    let path = match env::args().nth(1) {
        Some(path) => path,
        None => {
            println!("Usage: readroa <path>");
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
    let roa = match Roa::decode(data.as_ref(), None) {
        Ok(roa) => roa,
        Err(err) => {
            println!("Can’t decode roa: {}", err);
            return
        }
    };

    println!("ASN: {}", roa.asid());
    for prefix in roa.prefixes() {
        println!("     {}", prefix);
    }
}
