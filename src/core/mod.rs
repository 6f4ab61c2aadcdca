//! Core resolution types and pipeline

pub mod resolver;
pub mod select;
pub mod video_info;

pub use resolver::{resolve_page, ResolverOptions, StreamResolver};
pub use video_info::*;
