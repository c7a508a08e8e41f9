// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::SessionRegistryListener;
use crate::{
    events::{SessionEvent, TestRunListener, TestSessionListener},
    session::TestRunSession,
};
use debug_ignore::DebugIgnore;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Forwards the lifecycle of one session at a time to [`TestRunListener`]s.
///
/// The adapter follows the first session added to the registry while it is idle, until that
/// session ends, is stopped, terminates or is removed. Sessions added in the meantime are not
/// followed at all: run listeners cannot tell concurrent sessions apart.
///
/// Register it with [`SessionRegistry::add_listener`](super::SessionRegistry::add_listener).
#[derive(Debug, Default)]
pub struct LegacySessionAdapter {
    state: Arc<AdapterState>,
}

#[derive(Debug, Default)]
struct AdapterState {
    run_listeners: DebugIgnore<Mutex<Vec<Arc<dyn TestRunListener>>>>,
    active: Mutex<Option<ActiveSession>>,
}

#[derive(Debug)]
struct ActiveSession {
    session: Arc<TestRunSession>,
    listener: DebugIgnore<Arc<dyn TestSessionListener>>,
}

impl LegacySessionAdapter {
    /// Creates an adapter with no run listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a run listener.
    pub fn add_run_listener(&self, listener: Arc<dyn TestRunListener>) {
        self.state.run_listeners.lock().push(listener);
    }

    /// Removes a run listener. Does nothing if it was not registered.
    pub fn remove_run_listener(&self, listener: &Arc<dyn TestRunListener>) {
        self.state
            .run_listeners
            .lock()
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }

    /// Returns the session currently followed.
    pub fn active_session(&self) -> Option<Arc<TestRunSession>> {
        self.state
            .active
            .lock()
            .as_ref()
            .map(|active| active.session.clone())
    }
}

impl SessionRegistryListener for LegacySessionAdapter {
    fn session_added(&self, session: &Arc<TestRunSession>) {
        let mut active = self.state.active.lock();
        if active.is_some() {
            debug!("not following session `{session}`: another session is active");
            return;
        }

        let listener: Arc<dyn TestSessionListener> = Arc::new(Forwarder {
            state: Arc::downgrade(&self.state),
            session: Arc::downgrade(session),
        });
        session.add_listener(listener.clone());
        *active = Some(ActiveSession {
            session: session.clone(),
            listener: DebugIgnore(listener),
        });
    }

    fn session_removed(&self, session: &Arc<TestRunSession>) {
        self.state.detach(session);
    }
}

impl AdapterState {
    fn detach(&self, session: &TestRunSession) {
        let mut active = self.active.lock();
        let is_active = active
            .as_ref()
            .is_some_and(|active| std::ptr::eq(Arc::as_ptr(&active.session), session));
        if !is_active {
            return;
        }
        if let Some(ActiveSession { session, listener }) = active.take() {
            session.remove_listener(&listener);
        }
    }

    fn run_listeners(&self) -> Vec<Arc<dyn TestRunListener>> {
        self.run_listeners.lock().clone()
    }
}

// Installed on the active session. Holds only weak references so that the session and the
// adapter can be dropped independently.
struct Forwarder {
    state: Weak<AdapterState>,
    session: Weak<TestRunSession>,
}

impl TestSessionListener for Forwarder {
    fn on_event(&self, session: &TestRunSession, event: &SessionEvent) {
        let (Some(state), Some(arc_session)) = (self.state.upgrade(), self.session.upgrade())
        else {
            return;
        };

        match event {
            SessionEvent::SessionStarted => {
                for listener in state.run_listeners() {
                    listener.session_started(&arc_session);
                }
            }
            SessionEvent::SessionEnded { .. } | SessionEvent::SessionStopped { .. } => {
                for listener in state.run_listeners() {
                    listener.session_finished(&arc_session);
                }
                state.detach(session);
            }
            SessionEvent::SessionTerminated => {
                for listener in state.run_listeners() {
                    listener.session_terminated(&arc_session);
                }
                state.detach(session);
            }
            SessionEvent::RunningBegins
            | SessionEvent::TestAdded { .. }
            | SessionEvent::TestStarted { .. }
            | SessionEvent::TestEnded { .. }
            | SessionEvent::TestFailed { .. }
            | SessionEvent::TestRerun { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{events::RunnerEvent, registry::SessionRegistry};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingRunListener {
        calls: Mutex<Vec<String>>,
    }

    impl TestRunListener for RecordingRunListener {
        fn session_started(&self, session: &Arc<TestRunSession>) {
            self.calls.lock().push(format!("started {}", session.name()));
        }

        fn session_finished(&self, session: &Arc<TestRunSession>) {
            self.calls.lock().push(format!("finished {}", session.name()));
        }

        fn session_terminated(&self, session: &Arc<TestRunSession>) {
            self.calls
                .lock()
                .push(format!("terminated {}", session.name()));
        }
    }

    fn setup() -> (SessionRegistry, Arc<LegacySessionAdapter>, Arc<RecordingRunListener>) {
        let registry = SessionRegistry::new(10);
        let adapter = Arc::new(LegacySessionAdapter::new());
        let recorder = Arc::new(RecordingRunListener::default());
        adapter.add_run_listener(recorder.clone());
        registry.add_listener(adapter.clone());
        (registry, adapter, recorder)
    }

    #[test]
    fn follows_only_the_first_session() {
        let (registry, adapter, recorder) = setup();
        let first = Arc::new(TestRunSession::new("first"));
        let second = Arc::new(TestRunSession::new("second"));
        registry.add_session(first.clone());
        registry.add_session(second.clone());
        assert!(
            adapter
                .active_session()
                .is_some_and(|active| Arc::ptr_eq(&active, &first))
        );

        second
            .apply_event(RunnerEvent::RunStarted)
            .expect("second starts");
        first
            .apply_event(RunnerEvent::RunStarted)
            .expect("first starts");
        first
            .apply_event(RunnerEvent::RunEnded {
                elapsed: Duration::from_millis(5),
            })
            .expect("first ends");
        second
            .apply_event(RunnerEvent::RunTerminated)
            .expect("second terminates");

        assert_eq!(
            *recorder.calls.lock(),
            ["started first".to_owned(), "finished first".to_owned()]
        );
        assert!(adapter.active_session().is_none());
    }

    #[test]
    fn next_session_is_followed_after_detaching() {
        let (registry, adapter, recorder) = setup();
        let first = Arc::new(TestRunSession::new("first"));
        registry.add_session(first.clone());
        first
            .apply_event(RunnerEvent::RunTerminated)
            .expect("first terminates");

        let second = Arc::new(TestRunSession::new("second"));
        registry.add_session(second.clone());
        second
            .apply_event(RunnerEvent::RunStopped {
                elapsed: Duration::from_millis(5),
            })
            .expect("second stops");

        assert_eq!(
            *recorder.calls.lock(),
            ["terminated first".to_owned(), "finished second".to_owned()]
        );
        assert!(adapter.active_session().is_none());
    }

    #[test]
    fn removal_detaches() {
        let (registry, adapter, recorder) = setup();
        let session = Arc::new(TestRunSession::new("run"));
        registry.add_session(session.clone());
        registry.remove_session(&session);
        assert!(adapter.active_session().is_none());

        session
            .apply_event(RunnerEvent::RunStarted)
            .expect("run starts");
        assert!(recorder.calls.lock().is_empty());
    }
}
