//! Quire Core Library
//!
//! Core types, configuration, and error handling for the Quire static site generator.

pub mod config;
pub mod content;
pub mod data;
pub mod error;
pub mod frontmatter;

pub use config::Config;
pub use content::ContentFormat;
pub use error::{CoreError, Result};
pub use frontmatter::{Metadata, SourceFile};
