//! # sigres - playable stream resolution
//!
//! Resolves a video's watch page into directly fetchable stream urls.
//!
//! ## Features
//!
//! - Player config extraction with fallback embedding patterns
//! - Legacy and structured stream map descrambling
//! - Signature cipher interpretation without running the player script
//! - Cipher program caching by player script url
//!
//! ## Example
//!
//! ```rust,no_run
//! use sigres::StreamResolver;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resolver = StreamResolver::new()?;
//!     let video = resolver.resolve("https://www.youtube.com/watch?v=dQw4w9WgXcQ").await?;
//!
//!     for stream in &video.streams {
//!         println!("{} {}", stream.itag, stream.url);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod core;
pub mod error;
pub mod platform;
pub mod utils;

// Re-export main types
pub use crate::core::{
    resolve_page, ResolvedVideo, ResolverOptions, SignatureCipher, StreamDescriptor,
    StreamResolver,
};
pub use error::ResolveError;
pub use platform::{CipherProgram, PageFetcher, Primitive};

/// Result type alias for sigres operations
pub type Result<T> = std::result::Result<T, ResolveError>;
