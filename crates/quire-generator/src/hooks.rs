//! Lifecycle hooks fired during a build.
//!
//! Listeners are grouped by family, keyed by hook name and fired in
//! registration order. The set is owned by the `Site` and replaced on every
//! build, so plugins register against a fresh `Hooks` each time.

use std::{collections::HashMap, fmt, path::Path};

use quire_core::Config;
use thiserror::Error;

use crate::{page::Page, post::Post};

/// Error type listeners may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by listeners.
pub type ListenerResult = std::result::Result<(), BoxError>;

/// A listener failed; the build is aborted.
#[derive(Debug, Error)]
#[error("`{hook}` listener failed: {source}")]
pub struct HookError {
    hook: &'static str,
    #[source]
    source: BoxError,
}

impl HookError {
    /// Name of the hook whose listener failed.
    #[must_use]
    pub fn hook(&self) -> &'static str {
        self.hook
    }
}

/// Result type for firing hooks.
pub type Result<T> = std::result::Result<T, HookError>;

/// Build-level hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildHook {
    BeforeBuild,
    BeforeRender,
    AfterBuild,
}

/// Hooks around copying a plain file; listeners get the source path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileHook {
    BeforeCopy,
    AfterCopy,
}

/// Page-level hooks; listeners may mutate the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageHook {
    BeforeRenderContent,
    AfterRenderContent,
    BeforeRenderLayout,
    AfterRenderLayout,
    BeforeWrite,
    AfterWrite,
}

/// Hooks around rendering a post's content for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostHook {
    BeforeRenderPost,
    AfterRenderPost,
}

impl BuildHook {
    /// Hook name as used in logs and errors.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::BeforeBuild => "beforeBuild",
            Self::BeforeRender => "beforeRender",
            Self::AfterBuild => "afterBuild",
        }
    }
}

impl FileHook {
    /// Hook name as used in logs and errors.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::BeforeCopy => "beforeCopy",
            Self::AfterCopy => "afterCopy",
        }
    }
}

impl PageHook {
    /// Hook name as used in logs and errors.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::BeforeRenderContent => "beforeRenderContent",
            Self::AfterRenderContent => "afterRenderContent",
            Self::BeforeRenderLayout => "beforeRenderLayout",
            Self::AfterRenderLayout => "afterRenderLayout",
            Self::BeforeWrite => "beforeWrite",
            Self::AfterWrite => "afterWrite",
        }
    }
}

impl PostHook {
    /// Hook name as used in logs and errors.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::BeforeRenderPost => "beforeRenderPost",
            Self::AfterRenderPost => "afterRenderPost",
        }
    }
}

type BuildListener = Box<dyn FnMut(&Config) -> ListenerResult + Send>;
type FileListener = Box<dyn FnMut(&Path) -> ListenerResult + Send>;
type PageListener = Box<dyn FnMut(&mut Page) -> ListenerResult + Send>;
type PostListener = Box<dyn FnMut(&mut Post) -> ListenerResult + Send>;

/// Ordered listener registrations for one build.
#[derive(Default)]
pub struct Hooks {
    build: HashMap<BuildHook, Vec<BuildListener>>,
    file: HashMap<FileHook, Vec<FileListener>>,
    page: HashMap<PageHook, Vec<PageListener>>,
    post: HashMap<PostHook, Vec<PostListener>>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl Hooks {
    /// Create an empty hook set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a build-level listener.
    pub fn on_build<F>(&mut self, hook: BuildHook, listener: F)
    where
        F: FnMut(&Config) -> ListenerResult + Send + 'static,
    {
        self.build.entry(hook).or_default().push(Box::new(listener));
    }

    /// Register a file-level listener.
    pub fn on_file<F>(&mut self, hook: FileHook, listener: F)
    where
        F: FnMut(&Path) -> ListenerResult + Send + 'static,
    {
        self.file.entry(hook).or_default().push(Box::new(listener));
    }

    /// Register a page-level listener.
    pub fn on_page<F>(&mut self, hook: PageHook, listener: F)
    where
        F: FnMut(&mut Page) -> ListenerResult + Send + 'static,
    {
        self.page.entry(hook).or_default().push(Box::new(listener));
    }

    /// Register a post-level listener.
    pub fn on_post<F>(&mut self, hook: PostHook, listener: F)
    where
        F: FnMut(&mut Post) -> ListenerResult + Send + 'static,
    {
        self.post.entry(hook).or_default().push(Box::new(listener));
    }

    /// Fire a build-level hook.
    pub fn fire_build(&mut self, hook: BuildHook, config: &Config) -> Result<()> {
        for listener in self.build.get_mut(&hook).into_iter().flatten() {
            listener(config).map_err(|source| HookError {
                hook: hook.name(),
                source,
            })?;
        }
        Ok(())
    }

    /// Fire a file-level hook.
    pub fn fire_file(&mut self, hook: FileHook, path: &Path) -> Result<()> {
        for listener in self.file.get_mut(&hook).into_iter().flatten() {
            listener(path).map_err(|source| HookError {
                hook: hook.name(),
                source,
            })?;
        }
        Ok(())
    }

    /// Fire a page-level hook.
    pub fn fire_page(&mut self, hook: PageHook, page: &mut Page) -> Result<()> {
        for listener in self.page.get_mut(&hook).into_iter().flatten() {
            listener(page).map_err(|source| HookError {
                hook: hook.name(),
                source,
            })?;
        }
        Ok(())
    }

    /// Fire a post-level hook.
    pub fn fire_post(&mut self, hook: PostHook, post: &mut Post) -> Result<()> {
        for listener in self.post.get_mut(&hook).into_iter().flatten() {
            listener(post).map_err(|source| HookError {
                hook: hook.name(),
                source,
            })?;
        }
        Ok(())
    }

    /// Total number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.build.values().map(Vec::len).sum::<usize>()
            + self.file.values().map(Vec::len).sum::<usize>()
            + self.page.values().map(Vec::len).sum::<usize>()
            + self.post.values().map(Vec::len).sum::<usize>()
    }

    /// Whether no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listener_count() == 0
    }
}
