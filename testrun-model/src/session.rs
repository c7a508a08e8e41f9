// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test run session: a result tree together with run-level counters and lifecycle.

use crate::{
    errors::{HistoryError, SessionEventError, TreeError},
    events::{RunnerEvent, SessionEvent, TestSessionListener},
    history::HistoryDir,
    kinds::{NullTestKind, TestKind, TestKindRegistry, TestLaunch},
    model::{CountedFailure, ElementId, ProgressState, TestResult, TestStatus, TestTree},
    serialize::{export, import},
};
use camino::Utf8PathBuf;
use chrono::{DateTime, Local};
use debug_ignore::DebugIgnore;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};
use tracing::{debug, warn};

/// A snapshot of a session's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionCounters {
    /// Cases that ran to completion.
    pub started: usize,
    /// Completed cases that were ignored.
    pub ignored: usize,
    /// Elements whose outcome was an assumption failure.
    pub assumption_failures: usize,
    /// Elements that ended with an error.
    pub errors: usize,
    /// Elements that ended with a failure.
    pub failures: usize,
    /// Cases that were reported as ended, completed or not.
    pub total: usize,
}

/// Live counters, updated as elements end or fail.
///
/// Each element is counted at most once per transition: the `end_counted` and `failure_counted`
/// markers on the element guard against repeated calls. `failure_counted` remembers which counter
/// was incremented, so that a rerun takes back exactly that one.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    started: AtomicUsize,
    ignored: AtomicUsize,
    assumption_failures: AtomicUsize,
    errors: AtomicUsize,
    failures: AtomicUsize,
    total: AtomicUsize,
}

impl Counters {
    pub(crate) fn snapshot(&self) -> SessionCounters {
        SessionCounters {
            started: self.started.load(Ordering::Acquire),
            ignored: self.ignored.load(Ordering::Acquire),
            assumption_failures: self.assumption_failures.load(Ordering::Acquire),
            errors: self.errors.load(Ordering::Acquire),
            failures: self.failures.load(Ordering::Acquire),
            total: self.total.load(Ordering::Acquire),
        }
    }

    pub(crate) fn restore(&self, counters: SessionCounters) {
        self.started.store(counters.started, Ordering::Release);
        self.ignored.store(counters.ignored, Ordering::Release);
        self.assumption_failures
            .store(counters.assumption_failures, Ordering::Release);
        self.errors.store(counters.errors, Ordering::Release);
        self.failures.store(counters.failures, Ordering::Release);
        self.total.store(counters.total, Ordering::Release);
    }

    /// Records that an element ended.
    ///
    /// Cases always count towards the total. Only completed cases count as started, and a
    /// completed case that reported no error or failure is forced to `Ok`, ignored or not.
    /// Ignored cases show up as skipped only in their own [`TestResult`].
    pub(crate) fn register_test_ended(
        &self,
        tree: &mut TestTree,
        id: ElementId,
        completed: bool,
    ) -> Result<(), TreeError> {
        let element = tree.element_mut(id)?;
        if element.end_counted {
            return Ok(());
        }
        element.end_counted = true;

        let is_case = element.is_case();
        if is_case {
            self.total.fetch_add(1, Ordering::AcqRel);
        }
        if element.is_assumption_failure() {
            self.assumption_failures.fetch_add(1, Ordering::AcqRel);
        }
        if !is_case || !completed {
            return Ok(());
        }

        self.started.fetch_add(1, Ordering::AcqRel);
        if element.is_ignored() {
            self.ignored.fetch_add(1, Ordering::AcqRel);
        }

        let status = element.own_status();
        let status = if status.is_error_or_failure() {
            status.finished()
        } else {
            TestStatus::Ok
        };
        tree.set_status(id, status)
    }

    /// Records that an element entered a failing state. Assumption failures are not counted.
    pub(crate) fn register_test_failure_status(
        &self,
        tree: &mut TestTree,
        id: ElementId,
    ) -> Result<(), TreeError> {
        let element = tree.element_mut(id)?;
        if element.is_assumption_failure() || element.failure_counted.is_some() {
            return Ok(());
        }
        let status = element.own_status();
        let counted = if status.is_error() {
            CountedFailure::Error
        } else if status.is_failure() {
            CountedFailure::Failure
        } else {
            return Ok(());
        };
        self.counter(counted).fetch_add(1, Ordering::AcqRel);
        element.failure_counted = Some(counted);
        Ok(())
    }

    // Undoes register_test_failure_status before a rerun replaces the element's errors.
    fn unregister_test_failure_status(
        &self,
        tree: &mut TestTree,
        id: ElementId,
    ) -> Result<(), TreeError> {
        let element = tree.element_mut(id)?;
        if let Some(counted) = element.failure_counted.take() {
            self.counter(counted).fetch_sub(1, Ordering::AcqRel);
        }
        Ok(())
    }

    fn counter(&self, counted: CountedFailure) -> &AtomicUsize {
        match counted {
            CountedFailure::Error => &self.errors,
            CountedFailure::Failure => &self.failures,
        }
    }
}

/// One test run: its result tree, counters, lifecycle flags and listeners.
///
/// Sessions are shared as `Arc<TestRunSession>`. The tree is guarded by a read-write lock and may
/// be swapped out to disk while the session sits in history; any access to the tree transparently
/// swaps it back in.
#[derive(Debug)]
pub struct TestRunSession {
    name: String,
    start_time: Mutex<Option<DateTime<Local>>>,
    launch: Option<Arc<dyn TestLaunch>>,
    test_kind: Arc<dyn TestKind>,
    project: Option<String>,
    include_tags: Option<String>,
    exclude_tags: Option<String>,
    tree: RwLock<Option<TestTree>>,
    // Stands in for the tree's result while the tree is swapped out.
    swapped_result: Mutex<Option<TestResult>>,
    swap_file: Mutex<Option<Utf8PathBuf>>,
    id_map: Mutex<IndexMap<String, ElementId>>,
    counters: Counters,
    running: AtomicBool,
    stopped: AtomicBool,
    tests_began: AtomicBool,
    listeners: DebugIgnore<Mutex<Vec<Arc<dyn TestSessionListener>>>>,
}

impl TestRunSession {
    /// Creates a session that is not linked to a launch, started now.
    ///
    /// This is what imported sessions look like.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            tree: RwLock::new(Some(TestTree::new(name.clone()))),
            name,
            start_time: Mutex::new(Some(Local::now())),
            launch: None,
            test_kind: Arc::new(NullTestKind),
            project: None,
            include_tags: None,
            exclude_tags: None,
            swapped_result: Mutex::new(None),
            swap_file: Mutex::new(None),
            id_map: Mutex::new(IndexMap::new()),
            counters: Counters::default(),
            running: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            tests_began: AtomicBool::new(false),
            listeners: DebugIgnore(Mutex::new(Vec::new())),
        }
    }

    /// Creates a session for a launch. The session is starting until the first
    /// [`RunnerEvent::RunStarted`] arrives.
    pub fn for_launch(launch: Arc<dyn TestLaunch>, kinds: &TestKindRegistry) -> Self {
        let mut session = Self::new(launch.name());
        *session.start_time.get_mut() = None;
        session.test_kind = kinds.kind(launch.test_kind_id());
        session.project = launch.project().map(ToOwned::to_owned);
        session.include_tags = launch.include_tags().map(ToOwned::to_owned);
        session.exclude_tags = launch.exclude_tags().map(ToOwned::to_owned);
        session.launch = Some(launch);
        session
    }

    /// Sets the project under test.
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Sets the tag filters used to select tests.
    pub fn with_tags(mut self, include: Option<String>, exclude: Option<String>) -> Self {
        self.include_tags = include;
        self.exclude_tags = exclude;
        self
    }

    /// Returns the test run name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the time the run started, or `None` while it is still starting.
    pub fn start_time(&self) -> Option<DateTime<Local>> {
        *self.start_time.lock()
    }

    /// Returns the launch the session was created for.
    pub fn launch(&self) -> Option<&Arc<dyn TestLaunch>> {
        self.launch.as_ref()
    }

    /// Returns the test kind of the launch, or the null kind.
    pub fn test_kind(&self) -> &Arc<dyn TestKind> {
        &self.test_kind
    }

    /// Returns the project under test.
    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    /// Returns the tags used to select tests.
    pub fn include_tags(&self) -> Option<&str> {
        self.include_tags.as_deref()
    }

    /// Returns the tags used to deselect tests.
    pub fn exclude_tags(&self) -> Option<&str> {
        self.exclude_tags.as_deref()
    }

    /// Returns the name and start time, as shown in history lists.
    pub fn test_run_present(&self) -> String {
        match self.start_time() {
            Some(start) => format!("{} {}", self.name, start.format("%Y-%m-%d %H:%M:%S")),
            None => self.name.clone(),
        }
    }

    /// Returns a snapshot of the counters.
    pub fn counters(&self) -> SessionCounters {
        self.counters.snapshot()
    }

    /// Returns true while events are arriving.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Returns true if the run was stopped or its process terminated.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Returns true while the session waits for its launch to start reporting.
    pub fn is_starting(&self) -> bool {
        self.start_time().is_none()
            && self
                .launch
                .as_ref()
                .is_some_and(|launch| !launch.is_terminated())
    }

    /// Returns true if the run is over but the process that produced it is still alive.
    pub fn is_kept_alive(&self) -> bool {
        !self.is_running()
            && self
                .launch
                .as_ref()
                .is_some_and(|launch| !launch.is_terminated())
    }

    /// Returns the progress of the run as a whole.
    pub fn progress_state(&self) -> ProgressState {
        if self.is_running() {
            ProgressState::Running
        } else if self.is_stopped() {
            ProgressState::Stopped
        } else if self.start_time().is_none() {
            ProgressState::NotStarted
        } else {
            ProgressState::Completed
        }
    }

    /// Stops the run. Only flips a flag: the external process is not interrupted.
    ///
    /// A run whose process is still alive after it finished is left alone.
    pub fn stop_test_run(&self) {
        if self.is_running() || !self.is_kept_alive() {
            self.stopped.store(true, Ordering::Release);
        }
    }

    /// Returns true if the tree is currently swapped out to disk.
    pub fn is_swapped_out(&self) -> bool {
        self.tree.read().is_none()
    }

    /// Returns the swap file the tree was last written to.
    pub fn swap_file(&self) -> Option<Utf8PathBuf> {
        self.swap_file.lock().clone()
    }

    /// Calls `f` with the result tree, swapping it in first if necessary.
    pub fn with_tree<R>(&self, f: impl FnOnce(&TestTree) -> R) -> R {
        {
            let guard = self.tree.read();
            if let Some(tree) = guard.as_ref() {
                return f(tree);
            }
        }
        let mut guard = self.tree.write();
        let tree = guard.get_or_insert_with(|| self.load_swapped());
        f(tree)
    }

    /// Calls `f` with exclusive access to the result tree, swapping it in first if necessary.
    pub(crate) fn update_tree<R>(&self, f: impl FnOnce(&mut TestTree) -> R) -> R {
        let mut guard = self.tree.write();
        let tree = guard.get_or_insert_with(|| self.load_swapped());
        f(tree)
    }

    /// Replaces the tree and counters, e.g. with the contents of an imported report.
    pub(crate) fn install(&self, tree: TestTree, counters: SessionCounters) {
        *self.tree.write() = Some(tree);
        *self.swapped_result.lock() = None;
        self.id_map.lock().clear();
        self.counters.restore(counters);
    }

    fn load_swapped(&self) -> TestTree {
        self.swapped_result.lock().take();
        let Some(path) = self.swap_file() else {
            return TestTree::new(self.name.clone());
        };
        debug!("swapping in session `{}` from {path}", self.name);
        match import::read_tree(&path, &self.name) {
            Ok((tree, _)) => tree,
            Err(error) => {
                warn!("failed to swap in session `{}` from {path}: {error}", self.name);
                TestTree::new(self.name.clone())
            }
        }
    }

    /// Zeroes the counters and replaces the tree with an empty root, so that a kept-alive process
    /// can be rerun without creating a new session.
    pub fn reset(&self) {
        self.install(TestTree::new(self.name.clone()), SessionCounters::default());
        self.tests_began.store(false, Ordering::Release);
    }

    /// Returns the aggregated status of the whole run.
    pub fn status(&self) -> TestStatus {
        self.with_tree(|tree| tree.status(tree.root()))
    }

    /// Returns the result of the whole run. Uses the cached result while swapped out.
    pub fn test_result(&self) -> TestResult {
        if let Some(result) = *self.swapped_result.lock() {
            return result;
        }
        self.with_tree(|tree| tree.test_result(tree.root(), true))
    }

    /// Returns the elapsed time of the run in seconds, or NaN if it is unknown or the tree is
    /// swapped out.
    ///
    /// A root that was never timed itself, as after an import, reports the summed times of its
    /// top-level elements.
    pub fn elapsed_time_in_seconds(&self) -> f64 {
        let guard = self.tree.read();
        let Some(tree) = guard.as_ref() else {
            return f64::NAN;
        };
        let root = tree.root();
        let elapsed = tree.elapsed_time_in_seconds(root);
        if !elapsed.is_nan() {
            return elapsed;
        }
        tree[root]
            .children()
            .iter()
            .map(|&child| tree.elapsed_time_in_seconds(child))
            .filter(|time| !time.is_nan())
            .reduce(|total, time| total + time)
            .unwrap_or(f64::NAN)
    }

    /// Returns every case whose own result is an error or failure, in depth-first pre-order.
    pub fn failed_test_elements(&self) -> Vec<ElementId> {
        self.with_tree(TestTree::failed_cases)
    }

    /// Returns the names of the failed cases, in depth-first pre-order.
    pub fn failed_test_names(&self) -> Vec<String> {
        self.with_tree(|tree| {
            tree.failed_cases()
                .into_iter()
                .map(|id| tree[id].test_name().to_owned())
                .collect()
        })
    }

    /// Records that an element ended. See [`SessionCounters`] for what is counted.
    pub fn register_test_ended(&self, id: ElementId, completed: bool) -> Result<(), TreeError> {
        self.update_tree(|tree| self.counters.register_test_ended(tree, id, completed))
    }

    /// Records that an element entered a failing state.
    pub fn register_test_failure_status(&self, id: ElementId) -> Result<(), TreeError> {
        self.update_tree(|tree| self.counters.register_test_failure_status(tree, id))
    }

    /// Adds a listener for changes to this session.
    pub fn add_listener(&self, listener: Arc<dyn TestSessionListener>) {
        self.listeners.lock().push(listener);
    }

    /// Removes a listener. Does nothing if it was not registered.
    pub fn remove_listener(&self, listener: &Arc<dyn TestSessionListener>) {
        self.listeners
            .lock()
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }

    fn listeners(&self) -> Vec<Arc<dyn TestSessionListener>> {
        self.listeners.lock().clone()
    }

    fn notify(&self, event: &SessionEvent) {
        for listener in self.listeners() {
            listener.on_event(self, event);
        }
    }

    /// Applies an event from the reporting channel, then notifies listeners.
    ///
    /// An event that refers to an unknown test id is rejected and leaves the session unchanged.
    pub fn apply_event(&self, event: RunnerEvent) -> Result<(), SessionEventError> {
        let notifications = self.update_tree(|tree| self.apply_to_tree(tree, event))?;
        for notification in &notifications {
            self.notify(notification);
        }
        Ok(())
    }

    fn lookup(&self, test_id: &str) -> Result<ElementId, SessionEventError> {
        self.id_map
            .lock()
            .get(test_id)
            .copied()
            .ok_or_else(|| SessionEventError::UnknownTestId {
                test_id: test_id.to_owned(),
            })
    }

    fn parent_of(
        &self,
        tree: &TestTree,
        test_id: &str,
        parent_id: Option<&str>,
    ) -> Result<ElementId, SessionEventError> {
        if self.id_map.lock().contains_key(test_id) {
            return Err(SessionEventError::DuplicateTestId {
                test_id: test_id.to_owned(),
            });
        }
        match parent_id {
            Some(parent_id) => self.lookup(parent_id),
            None => Ok(tree.root()),
        }
    }

    fn apply_to_tree(
        &self,
        tree: &mut TestTree,
        event: RunnerEvent,
    ) -> Result<Vec<SessionEvent>, SessionEventError> {
        let notifications = match event {
            RunnerEvent::RunStarted => {
                self.start_time.lock().get_or_insert_with(Local::now);
                self.running.store(true, Ordering::Release);
                self.stopped.store(false, Ordering::Release);
                vec![SessionEvent::SessionStarted]
            }
            RunnerEvent::SuiteAdded {
                test_id,
                parent_id,
                spec,
            } => {
                let parent = self.parent_of(tree, &test_id, parent_id.as_deref())?;
                let id = tree.add_suite(parent, spec)?;
                self.id_map.lock().insert(test_id, id);
                vec![SessionEvent::TestAdded { id }]
            }
            RunnerEvent::CaseAdded {
                test_id,
                parent_id,
                spec,
            } => {
                let parent = self.parent_of(tree, &test_id, parent_id.as_deref())?;
                let id = tree.add_case(parent, spec)?;
                self.id_map.lock().insert(test_id, id);
                vec![SessionEvent::TestAdded { id }]
            }
            RunnerEvent::TestStarted { test_id } => {
                let id = self.lookup(&test_id)?;
                tree.set_status(id, TestStatus::Running)?;
                let mut notifications = Vec::with_capacity(2);
                if !self.tests_began.swap(true, Ordering::AcqRel) {
                    notifications.push(SessionEvent::RunningBegins);
                }
                notifications.push(SessionEvent::TestStarted { id });
                notifications
            }
            RunnerEvent::TestFailed {
                test_id,
                error,
                assumption_failure,
            } => {
                let id = self.lookup(&test_id)?;
                if assumption_failure {
                    tree.set_assumption_failure(id, true)?;
                }
                tree.push_error(id, error.clone())?;
                self.counters.register_test_failure_status(tree, id)?;
                vec![SessionEvent::TestFailed {
                    id,
                    status: tree[id].own_status(),
                    error,
                }]
            }
            RunnerEvent::TestEnded { test_id, ignored } => {
                let id = self.lookup(&test_id)?;
                if ignored {
                    tree.set_ignored(id, true)?;
                }
                // A test that never started did not complete.
                let completed = ignored || !tree[id].own_status().is_not_run();
                self.counters.register_test_ended(tree, id, completed)?;
                vec![SessionEvent::TestEnded { id }]
            }
            RunnerEvent::TestRerun { test_id, error } => {
                let id = self.lookup(&test_id)?;
                self.counters.unregister_test_failure_status(tree, id)?;
                tree.clear_errors(id)?;
                tree.set_status(id, TestStatus::NotRun)?;
                match &error {
                    Some(error) => {
                        tree.push_error(id, error.clone())?;
                        self.counters.register_test_failure_status(tree, id)?;
                    }
                    None => tree.set_status(id, TestStatus::Ok)?,
                }
                vec![SessionEvent::TestRerun {
                    id,
                    status: tree[id].own_status(),
                    error,
                }]
            }
            RunnerEvent::RunEnded { elapsed } => {
                self.running.store(false, Ordering::Release);
                vec![SessionEvent::SessionEnded { elapsed }]
            }
            RunnerEvent::RunStopped { elapsed } => {
                self.running.store(false, Ordering::Release);
                self.stopped.store(true, Ordering::Release);
                vec![SessionEvent::SessionStopped { elapsed }]
            }
            RunnerEvent::RunTerminated => {
                self.running.store(false, Ordering::Release);
                self.stopped.store(true, Ordering::Release);
                vec![SessionEvent::SessionTerminated]
            }
        };
        Ok(notifications)
    }

    /// Writes the tree to the history directory and drops it from memory.
    ///
    /// Returns `Ok(false)` without doing anything if the tree is already swapped out, the run may
    /// still produce results, or a listener refuses.
    pub fn swap_out(&self, history: &HistoryDir) -> Result<bool, HistoryError> {
        if self.is_starting() || self.is_running() || self.is_kept_alive() {
            return Ok(false);
        }
        if !self
            .listeners()
            .iter()
            .all(|listener| listener.accepts_swap_to_disk())
        {
            return Ok(false);
        }
        let Some(start_time) = self.start_time() else {
            return Ok(false);
        };

        let mut guard = self.tree.write();
        let Some(tree) = guard.as_ref() else {
            return Ok(false);
        };
        history.ensure_exists()?;
        let path = history.swap_file_path(start_time);
        export::write_tree_to_path(self, tree, &path)?;
        debug!("swapped out session `{}` to {path}", self.name);

        *self.swapped_result.lock() = Some(tree.test_result(tree.root(), true));
        *guard = None;
        *self.swap_file.lock() = Some(path);
        self.id_map.lock().clear();
        Ok(true)
    }

    /// Reads the tree back from the swap file, if it is swapped out.
    pub fn swap_in(&self) {
        let mut guard = self.tree.write();
        if guard.is_none() {
            *guard = Some(self.load_swapped());
        }
    }
}

impl fmt::Display for TestRunSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.test_run_present())
    }
}
