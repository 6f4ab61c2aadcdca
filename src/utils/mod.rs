//! Utility functions for sigres

pub mod cache;
pub mod mime;
pub mod url;

pub use self::mime::*;
pub use self::url::*;
