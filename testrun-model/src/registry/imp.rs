// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{history::HistoryDir, session::TestRunSession};
use debug_ignore::DebugIgnore;
use parking_lot::Mutex;
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use tracing::{debug, warn};

/// The default number of sessions kept in a registry.
pub const DEFAULT_MAX_SESSIONS: usize = 10;

/// Receives notifications about sessions entering and leaving a [`SessionRegistry`].
///
/// Listeners are called after the registry's lock has been released.
pub trait SessionRegistryListener: Send + Sync {
    /// A session was added.
    fn session_added(&self, session: &Arc<TestRunSession>);

    /// A session was removed or evicted.
    fn session_removed(&self, session: &Arc<TestRunSession>);
}

/// Sessions, youngest first, bounded by a maximum count.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: Mutex<VecDeque<Arc<TestRunSession>>>,
    max_sessions: AtomicUsize,
    history: Option<HistoryDir>,
    listeners: DebugIgnore<Mutex<Vec<Arc<dyn SessionRegistryListener>>>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SESSIONS)
    }
}

impl SessionRegistry {
    /// Creates an empty registry holding up to `max_sessions` idle sessions.
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(VecDeque::new()),
            max_sessions: AtomicUsize::new(max_sessions),
            history: None,
            listeners: DebugIgnore(Mutex::new(Vec::new())),
        }
    }

    /// Uses `history` for swap files: removed sessions have theirs deleted, and idle sessions
    /// can be swapped out with [`Self::swap_out_inactive`].
    pub fn with_history(mut self, history: HistoryDir) -> Self {
        self.history = Some(history);
        self
    }

    /// Returns the history directory, if one is in use.
    pub fn history(&self) -> Option<&HistoryDir> {
        self.history.as_ref()
    }

    /// Returns the capacity.
    pub fn max_sessions(&self) -> usize {
        self.max_sessions.load(Ordering::Acquire)
    }

    /// Changes the capacity. Takes effect the next time a session is added.
    pub fn set_max_sessions(&self, max_sessions: usize) {
        self.max_sessions.store(max_sessions, Ordering::Release);
    }

    /// Returns a copy of the sessions, youngest first.
    pub fn sessions(&self) -> Vec<Arc<TestRunSession>> {
        self.sessions.lock().iter().cloned().collect()
    }

    /// Returns the youngest session.
    pub fn latest(&self) -> Option<Arc<TestRunSession>> {
        self.sessions.lock().front().cloned()
    }

    /// Returns the number of sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Returns true if there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Returns true if `session` is registered.
    pub fn contains(&self, session: &Arc<TestRunSession>) -> bool {
        self.sessions
            .lock()
            .iter()
            .any(|registered| Arc::ptr_eq(registered, session))
    }

    /// Adds a session as the youngest, then evicts idle sessions past the capacity, oldest
    /// first.
    ///
    /// Listeners see the evictions before the addition. Evicted sessions are stopped and their
    /// swap files deleted.
    ///
    /// # Panics
    ///
    /// Panics if the session is already registered.
    pub fn add_session(&self, session: Arc<TestRunSession>) {
        let evicted = {
            let mut sessions = self.sessions.lock();
            assert!(
                !sessions
                    .iter()
                    .any(|registered| Arc::ptr_eq(registered, &session)),
                "session `{session}` is already registered"
            );
            sessions.push_front(session.clone());

            let max_sessions = self.max_sessions();
            let mut evicted = Vec::new();
            if sessions.len() > max_sessions {
                let mut index = max_sessions;
                while index < sessions.len() {
                    let candidate = &sessions[index];
                    if candidate.is_starting() || candidate.is_running() || candidate.is_kept_alive()
                    {
                        index += 1;
                    } else if let Some(removed) = sessions.remove(index) {
                        evicted.push(removed);
                    }
                }
            }
            evicted
        };

        debug!(
            "added session `{session}`, evicting {} old session(s)",
            evicted.len()
        );
        for old in &evicted {
            self.session_removed(old);
        }
        for listener in self.listeners() {
            listener.session_added(&session);
        }
    }

    /// Removes a session. Does nothing, and notifies nobody, if it is not registered.
    ///
    /// The session's swap file is deleted either way.
    pub fn remove_session(&self, session: &Arc<TestRunSession>) {
        let existed = {
            let mut sessions = self.sessions.lock();
            let index = sessions
                .iter()
                .position(|registered| Arc::ptr_eq(registered, session));
            index.and_then(|index| sessions.remove(index)).is_some()
        };
        if existed {
            self.session_removed(session);
        } else if let Some(history) = &self.history {
            history.remove_swap_file(session);
        }
    }

    /// Removes every session.
    pub fn clear(&self) {
        let removed: Vec<_> = self.sessions.lock().drain(..).collect();
        for session in &removed {
            self.session_removed(session);
        }
    }

    fn session_removed(&self, session: &Arc<TestRunSession>) {
        session.stop_test_run();
        if let Some(history) = &self.history {
            history.remove_swap_file(session);
        }
        for listener in self.listeners() {
            listener.session_removed(session);
        }
    }

    /// Swaps every session other than `current` out to the history directory. Sessions that are
    /// in use stay in memory.
    ///
    /// Returns the number of sessions swapped out. Failures are logged and otherwise ignored.
    pub fn swap_out_inactive(&self, current: Option<&Arc<TestRunSession>>) -> usize {
        let Some(history) = &self.history else {
            return 0;
        };
        self.sessions()
            .into_iter()
            .filter(|session| current.is_none_or(|current| !Arc::ptr_eq(session, current)))
            .filter(|session| match session.swap_out(history) {
                Ok(swapped) => swapped,
                Err(error) => {
                    warn!("failed to swap out session `{session}`: {error}");
                    false
                }
            })
            .count()
    }

    /// Adds a listener.
    pub fn add_listener(&self, listener: Arc<dyn SessionRegistryListener>) {
        self.listeners.lock().push(listener);
    }

    /// Removes a listener. Does nothing if it was not registered.
    pub fn remove_listener(&self, listener: &Arc<dyn SessionRegistryListener>) {
        self.listeners
            .lock()
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }

    fn listeners(&self) -> Vec<Arc<dyn SessionRegistryListener>> {
        self.listeners.lock().clone()
    }
}
