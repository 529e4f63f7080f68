//! Plugins: named bundles of hook listeners.

use std::sync::Arc;

use quire_core::Config;
use thiserror::Error;
use tracing::debug;

use crate::{hooks::Hooks, plugins::MarkdownPlugin};

/// Plugin errors.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin `{name}` failed to register: {message}")]
    Register { name: String, message: String },
}

impl PluginError {
    /// Create a registration error.
    pub fn register(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Register {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// A plugin registers listeners on a fresh hook set at the start of every
/// build.
pub trait Plugin: Send + Sync {
    /// Unique name; a local plugin replaces a built-in of the same name.
    fn name(&self) -> &str;

    /// Register listeners for one build.
    fn register(&self, hooks: &mut Hooks, config: &Config) -> Result<(), PluginError>;
}

/// Plugins shipped with the generator.
#[must_use]
pub fn builtin_plugins() -> Vec<Arc<dyn Plugin>> {
    vec![Arc::new(MarkdownPlugin)]
}

/// Plugins to load: built-ins not shadowed by a local plugin, then local
/// plugins, minus the excluded names.
#[must_use]
pub fn select_plugins(
    builtins: &[Arc<dyn Plugin>],
    locals: &[Arc<dyn Plugin>],
    excluded: &[String],
) -> Vec<Arc<dyn Plugin>> {
    let shadowed = |name: &str| locals.iter().any(|local| local.name() == name);
    let enabled = |plugin: &Arc<dyn Plugin>| {
        let keep = !excluded.iter().any(|name| name == plugin.name());
        if !keep {
            debug!(plugin = plugin.name(), "plugin excluded");
        }
        keep
    };

    builtins
        .iter()
        .filter(|plugin| !shadowed(plugin.name()))
        .chain(locals.iter())
        .filter(|plugin| enabled(*plugin))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl Plugin for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn register(&self, _hooks: &mut Hooks, _config: &Config) -> Result<(), PluginError> {
            Ok(())
        }
    }

    fn names(plugins: &[Arc<dyn Plugin>]) -> Vec<&str> {
        plugins.iter().map(|p| p.name()).collect()
    }

    #[test]
    fn test_builtins_include_markdown() {
        assert_eq!(names(&builtin_plugins()), ["markdown"]);
    }

    #[test]
    fn test_local_overrides_builtin() {
        let builtins: Vec<Arc<dyn Plugin>> = vec![Arc::new(Named("markdown")), Arc::new(Named("feed"))];
        let locals: Vec<Arc<dyn Plugin>> = vec![Arc::new(Named("markdown")), Arc::new(Named("extra"))];

        let selected = select_plugins(&builtins, &locals, &[]);
        assert_eq!(names(&selected), ["feed", "markdown", "extra"]);
        assert!(Arc::ptr_eq(&selected[1], &locals[0]));
    }

    #[test]
    fn test_excluded_plugins_are_skipped() {
        let builtins: Vec<Arc<dyn Plugin>> = vec![Arc::new(Named("markdown"))];
        let locals: Vec<Arc<dyn Plugin>> = vec![Arc::new(Named("extra"))];

        let selected = select_plugins(&builtins, &locals, &["markdown".to_string()]);
        assert_eq!(names(&selected), ["extra"]);
    }
}
