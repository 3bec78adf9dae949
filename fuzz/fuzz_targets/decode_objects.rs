#![no_main]

use libfuzzer_sys::fuzz_target;
use rpki_validator::repository::{ObjectType, Tal};
use rpki_validator::validation::{DerProvider, Provider};

fuzz_target!(|data: &[u8]| {
    let (which, mut data) = match data.split_first() {
        Some((first, data)) => (*first, data),
        None => return,
    };

    let which = usize::from(which) % (ObjectType::ALL.len() + 1);
    match ObjectType::ALL.get(which) {
        Some(kind) => {
            let _ = DerProvider.decode(*kind, data, None);
        }
        None => {
            let _ = Tal::read_named("foo".into(), &mut data);
        }
    }
});
