// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test kinds: pluggable capabilities for finding, resolving and launching tests.
//!
//! A kind is looked up by id in a [`TestKindRegistry`]. Unknown ids resolve to [`NullTestKind`],
//! whose capabilities all do nothing, so callers never need to handle a missing kind.

use indexmap::IndexMap;
use std::{fmt, sync::Arc};
use tracing::debug;

/// A launch of the external test process that a session's results come from.
pub trait TestLaunch: Send + Sync + fmt::Debug {
    /// The name of the launch configuration.
    fn name(&self) -> &str;

    /// Returns true once the external process has exited.
    fn is_terminated(&self) -> bool;

    /// The id of the test kind the launch was created with.
    fn test_kind_id(&self) -> Option<&str> {
        None
    }

    /// The project under test.
    fn project(&self) -> Option<&str> {
        None
    }

    /// Tags used to select tests.
    fn include_tags(&self) -> Option<&str> {
        None
    }

    /// Tags used to deselect tests.
    fn exclude_tags(&self) -> Option<&str> {
        None
    }
}

/// A location in the source of the project under test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourcePosition {
    /// The module (symbolic path) containing the position.
    pub module: String,
    /// The 1-based line, if known.
    pub line: Option<u32>,
}

/// Enumerates the tests contained in a module.
pub trait TestFinder: Send + Sync {
    /// Returns the names of the tests in `module`.
    fn find_tests(&self, module: &str) -> Vec<String>;
}

/// Maps a module and line reported in a trace to a position in the project's sources.
pub trait TestResolver: Send + Sync {
    /// Returns the source position, or `None` if it cannot be resolved.
    fn resolve(&self, module: &str, line: Option<u32>) -> Option<SourcePosition>;
}

/// Starts the external test process.
pub trait TestLauncher: Send + Sync {
    /// Launches the given tests, or all tests if `tests` is empty. Returns `None` if nothing was
    /// launched.
    fn launch(&self, launch_name: &str, tests: &[String]) -> Option<Arc<dyn TestLaunch>>;
}

/// A set of capabilities for one kind of test.
pub trait TestKind: Send + Sync + fmt::Debug {
    /// The identifier the kind is registered under.
    fn id(&self) -> &str;

    /// A human-readable name.
    fn display_name(&self) -> &str;

    /// Returns the finder capability.
    fn finder(&self) -> &dyn TestFinder;

    /// Returns the resolver capability.
    fn resolver(&self) -> &dyn TestResolver;

    /// Returns the launcher capability.
    fn launcher(&self) -> &dyn TestLauncher;

    /// Returns true for the null kind.
    fn is_null(&self) -> bool {
        false
    }
}

/// The kind used when no kind is registered for an id. Every capability is a no-op.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullTestKind;

impl NullTestKind {
    /// The id of the null kind.
    pub const ID: &'static str = "null";
}

impl TestKind for NullTestKind {
    fn id(&self) -> &str {
        Self::ID
    }

    fn display_name(&self) -> &str {
        "None"
    }

    fn finder(&self) -> &dyn TestFinder {
        self
    }

    fn resolver(&self) -> &dyn TestResolver {
        self
    }

    fn launcher(&self) -> &dyn TestLauncher {
        self
    }

    fn is_null(&self) -> bool {
        true
    }
}

impl TestFinder for NullTestKind {
    fn find_tests(&self, _module: &str) -> Vec<String> {
        Vec::new()
    }
}

impl TestResolver for NullTestKind {
    fn resolve(&self, _module: &str, _line: Option<u32>) -> Option<SourcePosition> {
        None
    }
}

impl TestLauncher for NullTestKind {
    fn launch(&self, _launch_name: &str, _tests: &[String]) -> Option<Arc<dyn TestLaunch>> {
        None
    }
}

/// Registered test kinds, keyed by id.
#[derive(Clone, Debug)]
pub struct TestKindRegistry {
    kinds: IndexMap<String, Arc<dyn TestKind>>,
    null: Arc<dyn TestKind>,
}

impl Default for TestKindRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TestKindRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            kinds: IndexMap::new(),
            null: Arc::new(NullTestKind),
        }
    }

    /// Registers a kind under its id, returning the kind it replaced.
    pub fn register(&mut self, kind: Arc<dyn TestKind>) -> Option<Arc<dyn TestKind>> {
        debug!("registering test kind `{}`", kind.id());
        self.kinds.insert(kind.id().to_owned(), kind)
    }

    /// Returns the kind registered for `id`, or the null kind.
    pub fn kind(&self, id: Option<&str>) -> Arc<dyn TestKind> {
        match id.and_then(|id| self.kinds.get(id)) {
            Some(kind) => kind.clone(),
            None => self.null.clone(),
        }
    }

    /// Iterates over the registered kinds in registration order.
    pub fn kinds(&self) -> impl Iterator<Item = &Arc<dyn TestKind>> + '_ {
        self.kinds.values()
    }

    /// Returns the number of registered kinds.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Returns true if no kinds are registered.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::{test_helpers::FakeKind, *};

    #[test]
    fn unknown_kind_is_null() {
        let registry = TestKindRegistry::new();
        let kind = registry.kind(Some("missing"));
        assert!(kind.is_null());
        assert_eq!(kind.id(), NullTestKind::ID);
        assert!(kind.finder().find_tests("Module").is_empty());
        assert_eq!(kind.resolver().resolve("Module", Some(3)), None);
        assert!(kind.launcher().launch("run", &[]).is_none());

        assert!(registry.kind(None).is_null());
    }

    #[test]
    fn registered_kind_is_found() {
        let mut registry = TestKindRegistry::new();
        assert!(registry.register(Arc::new(FakeKind)).is_none());
        assert!(registry.register(Arc::new(FakeKind)).is_some());
        assert_eq!(registry.len(), 1);

        let kind = registry.kind(Some("fake"));
        assert!(!kind.is_null());
        assert_eq!(kind.finder().find_tests("Module"), vec!["Module.Test"]);
        let launch = kind
            .launcher()
            .launch("rerun", &[])
            .expect("fake kind launches");
        assert_eq!(launch.name(), "rerun");
        assert!(!launch.is_terminated());
    }
}
