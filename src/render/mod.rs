//! Message content rendering.

pub mod markdown;

pub use markdown::{Block, DEFAULT_LANGUAGE, Inline, render};
