//! Building encoded test data.
//!
//! The decoders are tested against objects assembled here from their
//! individual parts. The signatures in these objects are not valid.

pub mod cms;
