// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    ElementId, ElementKind, ElementSpec, ProgressState, TestElement, TestErrorInfo, TestResult,
    TestStatus, combine_status,
};
use crate::{errors::TreeError, helpers::now_secs};
use std::ops::Index;

/// The result tree of a test run.
///
/// Elements are stored in creation order and addressed by [`ElementId`]. The root is a suite with
/// no parent. Children are only ever appended, and every status change is propagated to the
/// ancestors of the changed element straight away.
#[derive(Clone, Debug)]
pub struct TestTree {
    elements: Vec<TestElement>,
}

impl TestTree {
    /// Creates a tree containing only a root suite with the given name.
    pub fn new(root_name: impl Into<String>) -> Self {
        let root = TestElement::new(ElementId(0), None, ElementSpec::new(root_name), true);
        Self {
            elements: vec![root],
        }
    }

    /// Returns the id of the root suite.
    pub fn root(&self) -> ElementId {
        ElementId(0)
    }

    /// Returns the number of elements, including the root.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if the tree contains nothing but the root.
    pub fn is_empty(&self) -> bool {
        self.elements.len() == 1
    }

    /// Returns the element with the given id, if it belongs to this tree.
    pub fn get(&self, id: ElementId) -> Option<&TestElement> {
        self.elements.get(id.0)
    }

    fn get_mut(&mut self, id: ElementId) -> Result<&mut TestElement, TreeError> {
        self.elements
            .get_mut(id.0)
            .ok_or(TreeError::UnknownElement { id })
    }

    /// Adds a new suite as the last child of `parent`.
    pub fn add_suite(&mut self, parent: ElementId, spec: ElementSpec) -> Result<ElementId, TreeError> {
        self.add_element(parent, spec, true)
    }

    /// Adds a new case as the last child of `parent`.
    pub fn add_case(&mut self, parent: ElementId, spec: ElementSpec) -> Result<ElementId, TreeError> {
        self.add_element(parent, spec, false)
    }

    fn add_element(
        &mut self,
        parent: ElementId,
        spec: ElementSpec,
        is_suite: bool,
    ) -> Result<ElementId, TreeError> {
        let id = ElementId(self.elements.len());
        let parent_element = self.get_mut(parent)?;
        let ElementKind::Suite(suite) = &mut parent_element.kind else {
            return Err(TreeError::NotASuite {
                id: parent,
                name: parent_element.name.clone(),
            });
        };
        suite.children.push(id);
        self.elements
            .push(TestElement::new(id, Some(parent), spec, is_suite));
        self.refresh_ancestors(Some(parent));
        Ok(id)
    }

    /// Iterates over all elements in depth-first pre-order, starting at the root.
    pub fn iter(&self) -> impl Iterator<Item = &TestElement> + '_ {
        self.descendants(self.root())
    }

    /// Iterates over `id` and everything below it in depth-first pre-order.
    pub fn descendants(&self, id: ElementId) -> impl Iterator<Item = &TestElement> + '_ {
        let mut stack = vec![id];
        std::iter::from_fn(move || {
            let element = self.get(stack.pop()?)?;
            stack.extend(element.children().iter().rev().copied());
            Some(element)
        })
    }

    /// Returns the depth of an element: 0 for the root.
    pub fn depth(&self, id: ElementId) -> usize {
        let mut depth = 0;
        let mut current = self.get(id).and_then(TestElement::parent);
        while let Some(parent) = current {
            depth += 1;
            current = self.get(parent).and_then(TestElement::parent);
        }
        depth
    }

    /// Finds the first element in pre-order with the given test name.
    pub fn find_by_name(&self, name: &str) -> Option<ElementId> {
        self.iter()
            .find(|element| element.name == name)
            .map(TestElement::id)
    }

    /// Returns the aggregated status of an element: its own status combined with the statuses of
    /// all of its children.
    pub fn status(&self, id: ElementId) -> TestStatus {
        let Some(element) = self.get(id) else {
            return TestStatus::NotRun;
        };
        match &element.kind {
            ElementKind::Suite(suite) => match suite.children_status {
                Some(children_status) => combine_status(children_status, element.status),
                None => element.status,
            },
            ElementKind::Case(_) => element.status,
        }
    }

    /// Returns the result of an element, either its own or including its children.
    pub fn test_result(&self, id: ElementId, include_children: bool) -> TestResult {
        let Some(element) = self.get(id) else {
            return TestResult::Undefined;
        };
        if element.is_case() || !include_children {
            return element.own_result();
        }
        if element.assumption_failure {
            return TestResult::Skipped;
        }
        self.status(id).to_result()
    }

    /// Returns the progress state derived from the aggregated status.
    pub fn progress_state(&self, id: ElementId) -> ProgressState {
        self.status(id).to_progress_state()
    }

    /// Returns the elapsed time in seconds, or NaN if the element has not finished or was never
    /// timed.
    pub fn elapsed_time_in_seconds(&self, id: ElementId) -> f64 {
        let Some(element) = self.get(id) else {
            return f64::NAN;
        };
        let finished = matches!(
            self.progress_state(id),
            ProgressState::Completed | ProgressState::Stopped
        );
        if finished && element.elapsed >= 0.0 {
            element.elapsed
        } else {
            f64::NAN
        }
    }

    /// Overrides the stored elapsed time, e.g. with a value read from a report.
    pub fn set_elapsed_time(&mut self, id: ElementId, secs: f64) -> Result<(), TreeError> {
        self.get_mut(id)?.elapsed = secs;
        Ok(())
    }

    /// Sets an element's own status and propagates the change to its ancestors.
    ///
    /// Entering a running status starts the element's clock; entering a terminal status stops it.
    pub fn set_status(&mut self, id: ElementId, status: TestStatus) -> Result<(), TreeError> {
        let now = now_secs();
        let element = self.get_mut(id)?;
        let restart = element.is_case();
        update_clock(&mut element.elapsed, element.status, status, now, restart);
        element.status = status;
        let parent = element.parent;
        self.refresh_ancestors(parent);
        Ok(())
    }

    /// Appends an error record and folds its status into the element's own status.
    ///
    /// For assumption failures the record contributes `Skipped` whatever its own status says.
    pub fn push_error(&mut self, id: ElementId, info: TestErrorInfo) -> Result<(), TreeError> {
        let element = self.get_mut(id)?;
        let contributed = if element.assumption_failure {
            TestStatus::Skipped
        } else {
            info.status
        };
        let status = combine_status(element.status, contributed);
        element.errors.push(info);
        self.set_status(id, status)
    }

    /// Removes all error records, e.g. before a test is rerun.
    pub fn clear_errors(&mut self, id: ElementId) -> Result<(), TreeError> {
        let element = self.get_mut(id)?;
        element.errors.clear();
        element.assumption_failure = false;
        element.failure_counted = None;
        Ok(())
    }

    /// Flags or unflags an element as an assumption failure.
    pub fn set_assumption_failure(&mut self, id: ElementId, value: bool) -> Result<(), TreeError> {
        self.get_mut(id)?.assumption_failure = value;
        Ok(())
    }

    /// Flags a case as ignored. Has no effect on suites.
    pub fn set_ignored(&mut self, id: ElementId, ignored: bool) -> Result<(), TreeError> {
        if let ElementKind::Case(case) = &mut self.get_mut(id)?.kind {
            case.ignored = ignored;
        }
        Ok(())
    }

    pub(crate) fn element_mut(&mut self, id: ElementId) -> Result<&mut TestElement, TreeError> {
        self.get_mut(id)
    }

    /// Returns all cases whose own result is an error or failure, in depth-first pre-order.
    pub fn failed_cases(&self) -> Vec<ElementId> {
        self.iter()
            .filter(|element| {
                element.is_case()
                    && matches!(
                        self.test_result(element.id, false),
                        TestResult::Error | TestResult::Failure
                    )
            })
            .map(TestElement::id)
            .collect()
    }

    // Recomputes the children status of each ancestor in turn, stopping at the first one whose
    // aggregated status did not change.
    fn refresh_ancestors(&mut self, mut next: Option<ElementId>) {
        let now = now_secs();
        while let Some(suite_id) = next {
            let before = self.status(suite_id);
            let children_status = self.elements[suite_id.0]
                .children()
                .iter()
                .map(|child| self.status(*child))
                .reduce(combine_status);

            let suite = &mut self.elements[suite_id.0];
            if let ElementKind::Suite(state) = &mut suite.kind {
                state.children_status = children_status;
            }
            let after = self.status(suite_id);
            if after == before {
                break;
            }

            let suite = &mut self.elements[suite_id.0];
            update_clock(&mut suite.elapsed, before, after, now, false);
            next = suite.parent;
        }
    }
}

impl Index<ElementId> for TestTree {
    type Output = TestElement;

    /// Panics if the id was not issued by this tree.
    fn index(&self, id: ElementId) -> &TestElement {
        &self.elements[id.0]
    }
}

// Running elements store minus their start time; finishing turns that into the elapsed time.
// Suites keep the clock of their first run unless `restart` is set.
fn update_clock(elapsed: &mut f64, before: TestStatus, after: TestStatus, now: f64, restart: bool) {
    if after.is_running() && !before.is_running() {
        if restart || elapsed.is_nan() {
            *elapsed = -now;
        }
    } else if after.is_done() && *elapsed < 0.0 {
        *elapsed += now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use test_strategy::proptest;

    fn case(tree: &mut TestTree, parent: ElementId, name: &str) -> ElementId {
        tree.add_case(parent, ElementSpec::new(name))
            .expect("parent is a suite")
    }

    #[test]
    fn children_are_visible_immediately() {
        let mut tree = TestTree::new("root");
        let suite = tree
            .add_suite(tree.root(), ElementSpec::new("Suite"))
            .expect("root is a suite");
        let first = case(&mut tree, suite, "Suite.first");
        let second = case(&mut tree, suite, "Suite.second");

        assert_eq!(tree[suite].children(), &[first, second]);
        assert_eq!(tree[first].parent(), Some(suite));
        assert_eq!(tree.status(first), TestStatus::NotRun);
        assert_eq!(tree.status(suite), TestStatus::NotRun);
        let names: Vec<_> = tree.iter().map(TestElement::test_name).collect();
        assert_eq!(names, ["root", "Suite", "Suite.first", "Suite.second"]);
    }

    #[test]
    fn cannot_add_under_case() {
        let mut tree = TestTree::new("root");
        let root = tree.root();
        let leaf = case(&mut tree, root, "leaf");
        let error = tree
            .add_case(leaf, ElementSpec::new("child"))
            .expect_err("cases cannot have children");
        assert!(matches!(error, TreeError::NotASuite { id, .. } if id == leaf));

        let error = tree
            .add_case(ElementId(99), ElementSpec::new("child"))
            .expect_err("unknown parent");
        assert!(matches!(error, TreeError::UnknownElement { .. }));
    }

    #[test]
    fn status_propagates_to_ancestors() {
        let mut tree = TestTree::new("root");
        let outer = tree
            .add_suite(tree.root(), ElementSpec::new("Outer"))
            .expect("root is a suite");
        let inner = tree
            .add_suite(outer, ElementSpec::new("Inner"))
            .expect("outer is a suite");
        let a = case(&mut tree, inner, "a");
        let b = case(&mut tree, inner, "b");

        tree.set_status(a, TestStatus::Running).expect("a exists");
        assert_eq!(tree.status(inner), TestStatus::Running);
        assert_eq!(tree.status(tree.root()), TestStatus::Running);

        tree.push_error(a, TestErrorInfo::new(TestStatus::Failure))
            .expect("a exists");
        assert_eq!(tree.status(a), TestStatus::RunningFailure);
        assert_eq!(tree.status(outer), TestStatus::RunningFailure);

        tree.set_status(a, TestStatus::Failure).expect("a exists");
        tree.set_status(b, TestStatus::Ok).expect("b exists");
        assert_eq!(tree.status(inner), TestStatus::Failure);
        assert_eq!(tree.status(tree.root()), TestStatus::Failure);
        assert_eq!(tree.test_result(tree.root(), true), TestResult::Failure);
        assert_eq!(tree.test_result(tree.root(), false), TestResult::Undefined);
    }

    #[test]
    fn own_suite_error_without_children() {
        let mut tree = TestTree::new("root");
        let suite = tree
            .add_suite(tree.root(), ElementSpec::new("Broken"))
            .expect("root is a suite");
        tree.push_error(suite, TestErrorInfo::new(TestStatus::Error).with_message("setup failed"))
            .expect("suite exists");
        assert_eq!(tree[suite].own_status(), TestStatus::Error);
        assert_eq!(tree.status(suite), TestStatus::Error);
        assert_eq!(tree.status(tree.root()), TestStatus::Error);
    }

    #[test]
    fn elapsed_time_after_run() {
        let mut tree = TestTree::new("root");
        let root = tree.root();
        let a = case(&mut tree, root, "a");
        assert!(tree.elapsed_time_in_seconds(a).is_nan());

        tree.set_status(a, TestStatus::Running).expect("a exists");
        assert!(tree[a].raw_elapsed() < 0.0);
        assert!(tree.elapsed_time_in_seconds(a).is_nan());

        tree.set_status(a, TestStatus::Ok).expect("a exists");
        let elapsed = tree.elapsed_time_in_seconds(a);
        assert!(!elapsed.is_nan());
        assert!(elapsed >= 0.0);

        // The root was timed through its child.
        assert!(tree.elapsed_time_in_seconds(tree.root()) >= 0.0);
    }

    #[test]
    fn never_started_case_has_no_time() {
        let mut tree = TestTree::new("root");
        let root = tree.root();
        let a = case(&mut tree, root, "a");
        tree.set_status(a, TestStatus::Ok).expect("a exists");
        assert!(tree.elapsed_time_in_seconds(a).is_nan());
    }

    #[test]
    fn failed_cases_in_pre_order() {
        let mut tree = TestTree::new("root");
        let s1 = tree
            .add_suite(tree.root(), ElementSpec::new("S1"))
            .expect("root is a suite");
        let a = case(&mut tree, s1, "a");
        let b = case(&mut tree, s1, "b");
        let s2 = tree
            .add_suite(tree.root(), ElementSpec::new("S2"))
            .expect("root is a suite");
        let c = case(&mut tree, s2, "c");

        tree.push_error(c, TestErrorInfo::new(TestStatus::Error)).expect("c exists");
        tree.push_error(a, TestErrorInfo::new(TestStatus::Failure)).expect("a exists");
        tree.set_status(b, TestStatus::Ok).expect("b exists");
        tree.push_error(s2, TestErrorInfo::new(TestStatus::Error)).expect("s2 exists");

        assert_eq!(tree.failed_cases(), vec![a, c]);
    }

    #[test]
    fn assumption_failure_is_skipped() {
        let mut tree = TestTree::new("root");
        let root = tree.root();
        let a = case(&mut tree, root, "a");
        tree.set_assumption_failure(a, true).expect("a exists");
        tree.push_error(a, TestErrorInfo::new(TestStatus::Failure).with_message("assumption"))
            .expect("a exists");
        assert_eq!(tree.status(a), TestStatus::Skipped);
        assert_eq!(tree.test_result(a, false), TestResult::Skipped);
        assert!(tree.failed_cases().is_empty());
    }

    #[proptest(cases = 64)]
    fn suite_status_is_fold_of_children(
        #[strategy(proptest::collection::vec(any::<TestStatus>(), 1..8))] statuses: Vec<TestStatus>,
    ) {
        let mut tree = TestTree::new("root");
        let suite = tree
            .add_suite(tree.root(), ElementSpec::new("S"))
            .expect("root is a suite");
        for (index, status) in statuses.iter().enumerate() {
            let id = tree
                .add_case(suite, ElementSpec::new(format!("c{index}")))
                .expect("suite is a suite");
            tree.set_status(id, *status).expect("case exists");
        }

        let forward = statuses.iter().copied().fold(TestStatus::NotRun, combine_status);
        let backward = statuses.iter().rev().copied().fold(TestStatus::NotRun, combine_status);
        prop_assert_eq!(tree.status(suite), forward);
        prop_assert_eq!(forward, backward);
    }
}
