//! Watch page parsing, cipher interpretation and page fetching

pub mod cipher;
pub mod client;
pub mod config;
pub mod descrambler;
pub mod locator;
pub mod retry;
pub mod signature;

pub use cipher::{CipherProgram, Primitive};
pub use client::{HttpClientConfig, HttpFetcher, PageFetcher};
pub use config::PlayerConfig;
pub use retry::{RetryConfig, RetryExecutor};
pub use signature::apply_signature;
