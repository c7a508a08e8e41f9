// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The process-wide context that owns configuration, test kinds, sessions and history.

use crate::{
    config::UserConfig,
    errors::{HistoryError, ImportError},
    history::HistoryDir,
    kinds::{TestKind, TestKindRegistry, TestLaunch},
    model::ElementId,
    registry::{LegacySessionAdapter, SessionRegistry},
    serialize::import_session,
    session::TestRunSession,
    trace::{FailureTraceBuilder, TraceItem},
};
use camino::Utf8Path;
use std::sync::Arc;
use tracing::debug;

/// Everything a viewer needs, created once at startup and passed to whoever needs it.
///
/// Call [`Self::shutdown`] when the viewer goes away to delete pending swap files.
#[derive(Debug)]
pub struct ViewerContext {
    config: UserConfig,
    kinds: TestKindRegistry,
    history: HistoryDir,
    registry: Arc<SessionRegistry>,
    legacy: Arc<LegacySessionAdapter>,
}

impl ViewerContext {
    /// Creates a context from configuration, with the history directory it names.
    pub fn new(config: UserConfig) -> Result<Self, HistoryError> {
        let history = HistoryDir::from_config(&config.history)?;
        Ok(Self::with_history(config, history))
    }

    /// Creates a context that keeps swap files in `history`.
    pub fn with_history(config: UserConfig, history: HistoryDir) -> Self {
        let registry = Arc::new(
            SessionRegistry::new(config.history.max_sessions).with_history(history.clone()),
        );
        let legacy = Arc::new(LegacySessionAdapter::new());
        registry.add_listener(legacy.clone());
        Self {
            config,
            kinds: TestKindRegistry::new(),
            history,
            registry,
            legacy,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &UserConfig {
        &self.config
    }

    /// Returns the registered test kinds.
    pub fn kinds(&self) -> &TestKindRegistry {
        &self.kinds
    }

    /// Registers a test kind, replacing any kind with the same id.
    pub fn register_kind(&mut self, kind: Arc<dyn TestKind>) {
        self.kinds.register(kind);
    }

    /// Returns the history directory.
    pub fn history(&self) -> &HistoryDir {
        &self.history
    }

    /// Returns the session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Returns the adapter that serves legacy run listeners.
    pub fn legacy_adapter(&self) -> &Arc<LegacySessionAdapter> {
        &self.legacy
    }

    /// Creates a session for a launch and registers it.
    pub fn start_session(&self, launch: Arc<dyn TestLaunch>) -> Arc<TestRunSession> {
        let session = Arc::new(TestRunSession::for_launch(launch, &self.kinds));
        debug!("starting session `{session}`");
        self.registry.add_session(session.clone());
        session
    }

    /// Imports a report file and registers the resulting session. Nothing is registered if the
    /// import fails.
    pub fn import_session(&self, path: &Utf8Path) -> Result<Arc<TestRunSession>, ImportError> {
        let session = Arc::new(import_session(path)?);
        self.registry.add_session(session.clone());
        Ok(session)
    }

    /// Returns a trace builder set up from the configuration.
    pub fn trace_builder(&self) -> FailureTraceBuilder {
        FailureTraceBuilder::new(&self.config.trace)
    }

    /// Builds the failure trace tree of an element, resolving frames with the session's test
    /// kind.
    pub fn failure_trace(&self, session: &TestRunSession, id: ElementId) -> Vec<TraceItem> {
        let builder = self.trace_builder();
        let resolver = session.test_kind().resolver();
        session.with_tree(|tree| match tree.get(id) {
            Some(element) => builder.build(element, resolver),
            None => Vec::new(),
        })
    }

    /// Tears the context down: every session is removed and all swap files are deleted.
    ///
    /// Returns the number of swap files deleted.
    pub fn shutdown(self) -> usize {
        self.registry.clear();
        self.history.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::RunnerEvent,
        kinds::test_helpers::{FakeKind, FakeLaunch},
        model::{ElementSpec, TestErrorInfo, TestStatus},
        trace::FrameTag,
    };
    use camino_tempfile::tempdir;

    fn context(history: &Utf8Path) -> ViewerContext {
        let config = UserConfig::defaults().expect("defaults are valid");
        ViewerContext::with_history(config, HistoryDir::new(history))
    }

    #[test]
    fn launch_uses_registered_kind() {
        let temp_dir = tempdir().expect("tempdir created");
        let mut context = context(temp_dir.path());
        context.register_kind(Arc::new(FakeKind));

        let launch = Arc::new(FakeLaunch {
            name: "nightly".to_owned(),
            kind_id: Some("fake".to_owned()),
            ..Default::default()
        });
        let session = context.start_session(launch.clone());
        assert!(session.is_starting());
        assert_eq!(session.test_kind().id(), "fake");
        assert_eq!(session.include_tags(), Some("smoke"));
        assert!(context.registry().contains(&session));
        assert!(
            context
                .legacy_adapter()
                .active_session()
                .is_some_and(|active| Arc::ptr_eq(&active, &session))
        );

        for event in [
            RunnerEvent::RunStarted,
            RunnerEvent::CaseAdded {
                test_id: "1".to_owned(),
                parent_id: None,
                spec: ElementSpec::new("Тесты.Сложение"),
            },
            RunnerEvent::TestStarted {
                test_id: "1".to_owned(),
            },
            RunnerEvent::TestFailed {
                test_id: "1".to_owned(),
                error: TestErrorInfo::new(TestStatus::Failure)
                    .with_message("Не равно")
                    .with_trace("{ОбщийМодуль.Тесты.Модуль(4)}: Проверка"),
                assumption_failure: false,
            },
        ] {
            session.apply_event(event).expect("event applies");
        }

        let case = session.failed_test_elements()[0];
        let trace = context.failure_trace(&session, case);
        assert_eq!(trace.len(), 1);
        let frame = &trace[0].children[0];
        assert_eq!(frame.tag, FrameTag::Main);
        assert_eq!(frame.position.as_ref().and_then(|position| position.line), Some(4));
    }

    #[test]
    fn failed_import_registers_nothing() {
        let temp_dir = tempdir().expect("tempdir created");
        let context = context(temp_dir.path());
        let path = temp_dir.path().join("broken.xml");
        std::fs::write(&path, "<testrun name=\"x\"><unexpected/></testrun>").expect("written");

        context.import_session(&path).expect_err("import fails");
        assert!(context.registry().is_empty());
    }

    #[test]
    fn shutdown_deletes_swap_files() {
        let temp_dir = tempdir().expect("tempdir created");
        let context = context(temp_dir.path());
        let path = temp_dir.path().join("report.xml");
        std::fs::write(&path, "<testrun name=\"old\"><testcase name=\"a\"/></testrun>")
            .expect("written");

        let session = context.import_session(&path).expect("import succeeds");
        assert_eq!(context.registry().swap_out_inactive(None), 1);
        assert!(session.is_swapped_out());
        assert_eq!(context.history().list().expect("history lists").len(), 1);

        context.shutdown();
        assert!(std::fs::read_dir(temp_dir.path())
            .expect("dir readable")
            .filter_map(Result::ok)
            .all(|entry| entry.file_name() == "report.xml"));
    }
}
