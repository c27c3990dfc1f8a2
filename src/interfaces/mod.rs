pub mod extractor;
pub mod strategy;

pub use extractor::RecordExtractor;
pub use strategy::{AcquisitionStrategy, RawContent, StrategyId};
