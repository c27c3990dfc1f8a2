pub mod orchestrator;
pub mod pipeline;
pub mod retry;

pub use orchestrator::{FetchOrchestrator, FetchResult};
pub use pipeline::ScrapeEngine;
