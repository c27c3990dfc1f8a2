pub mod browser;
pub mod classifier;
pub mod headers;
pub mod middleware;
pub mod service;
pub mod strategies;

#[cfg(test)]
pub(crate) mod testing;

pub use browser::BrowserStrategy;
pub use classifier::{ChallengeClassifier, ChallengeReason, Verdict};
pub use strategies::{FingerprintProfile, FingerprintStrategy, PlainStrategy};
