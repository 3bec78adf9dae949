//! Runs a validation and prints the validated payload.
//!
//! Usage: `rpki-validate <tal-dir> <cache-dir> [--offline]`
//!
//! With `--offline`, the repositories are not fetched and everything is
//! taken from the cache directory.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use rpki_validator::config::Config;
use rpki_validator::repository::tal::Tal;
use rpki_validator::validation::{
    run, DerProvider, Fetcher, LocalFetcher, RsyncFetcher
};


fn main() {
    if let Err(err) = process() {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

fn process() -> Result<(), String> {
    let mut args = env::args().skip(1);
    let (tal_dir, cache_dir) = match (args.next(), args.next()) {
        (Some(tal_dir), Some(cache_dir)) => {
            (PathBuf::from(tal_dir), PathBuf::from(cache_dir))
        }
        _ => {
            return Err(
                "Usage: rpki-validate <tal-dir> <cache-dir> [--offline]".into()
            )
        }
    };
    let offline = args.any(|arg| arg == "--offline");

    let config = Config { tal_dir, cache_dir, .. Default::default() };
    let mut tals = Vec::new();
    for tal in Tal::read_dir(&config.tal_dir).map_err(|err| {
        format!("Can’t open TAL directory: {}", err)
    })? {
        tals.push(tal.map_err(|err| format!("Bad TAL: {}", err))?);
    }

    let fetcher: Arc<dyn Fetcher> = if offline {
        Arc::new(LocalFetcher)
    }
    else {
        Arc::new(RsyncFetcher::from_config(&config))
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|err| format!("Can’t create runtime: {}", err))?;
    let outcome = runtime.block_on(
        run(&config, tals, DerProvider, fetcher)
    ).map_err(|err| format!("Validation failed: {}", err))?;

    println!("ASN,IP Prefix,Max Length,Trust Anchor");
    for vrp in outcome.output.vrps() {
        println!("{}", vrp);
    }
    println!();
    for vap in outcome.output.vaps() {
        println!("{}", vap);
    }
    println!();
    for key in outcome.output.router_keys() {
        println!("{}", key);
    }
    eprintln!("{}", outcome.stats);
    Ok(())
}
