pub mod fingerprint;
pub mod plain;

pub use fingerprint::{FingerprintProfile, FingerprintStrategy};
pub use plain::PlainStrategy;
