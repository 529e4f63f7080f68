//! Quire Generator Library
//!
//! Static site generation engine for Quire.
//!
//! # Modules
//!
//! - [`engine`] - Handlebars-style template engine
//! - [`resolver`] - Layout-chain resolution and the template registry
//! - [`hooks`] - Build lifecycle hooks
//! - [`plugin`] - Plugin interface and selection
//! - [`permalink`] - Permalink patterns
//! - [`post`] - Posts and the post collection
//! - [`page`] - Pages, pagination, rendering and writing
//! - [`scan`] - Source tree discovery
//! - [`site`] - Build orchestration

pub mod engine;
pub mod hooks;
pub mod page;
pub mod permalink;
pub mod plugin;
pub mod plugins;
pub mod post;
pub mod resolver;
pub mod scan;
pub mod site;

pub use engine::{TemplateEngine, TemplateError};
pub use hooks::{BuildHook, FileHook, HookError, Hooks, PageHook, PostHook};
pub use page::{Page, PageError, Pagination};
pub use permalink::compute_permalink;
pub use plugin::{Plugin, PluginError};
pub use post::{Post, PostCollection};
pub use resolver::{ResolveError, Template, TemplateRegistry};
pub use site::{BuildError, BuildStats, Site};
