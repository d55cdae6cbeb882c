// Certificates module - Certificate decoding

pub mod parser;

pub use parser::{ParsedCertificate, RawCertificate};
