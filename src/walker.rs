//! Tree walker
//!
//! Builds an [`ElementTree`] around a selected element: the ancestry up to the
//! platform root, the selected subtree, and optionally one level of sibling
//! context. The shape phase is sequential and bounded by a [`BoundedCounter`];
//! property population and (in test mode) rule evaluation run on rayon.

use crate::counter::{BoundedCounter, CounterError};
use crate::element::{ElementNode, ElementRef, ElementTree, NodeIndex, PropertyBag};
use crate::platform::{AccessibilityTree, PlatformError};
use crate::results::{ScanResult, ScanStatus};
use crate::rule::EvaluationCode;
use crate::runner::RuleRunner;
use log::{debug, warn};
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Walk error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalkError {
    #[error("Test mode requires a rule runner")]
    NoRunner,

    #[error(transparent)]
    Counter(#[from] CounterError),
}

/// What a walk does after building the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalkMode {
    /// Build and populate only
    Live,
    /// Also evaluate every rule against every element
    #[default]
    Test,
}

impl fmt::Display for WalkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalkMode::Live => write!(f, "live"),
            WalkMode::Test => write!(f, "test"),
        }
    }
}

/// Progress of a walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub enum WalkState {
    #[default]
    Idle,
    AncestryResolved,
    TreeBuilt,
    PropertiesPopulated,
    RulesEvaluated,
}

/// Walk behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkOptions {
    pub mode: WalkMode,
    /// Include the selected element's siblings as leaves
    pub sibling_context: bool,
    /// Populate properties and evaluate rules in parallel
    pub parallel: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            mode: WalkMode::Test,
            sibling_context: true,
            parallel: true,
        }
    }
}

/// Outcome of one walk
#[derive(Debug)]
pub struct ScanTree {
    tree: ElementTree,
    selected: NodeIndex,
    top_most: NodeIndex,
    mode: WalkMode,
    state: WalkState,
    elapsed: Duration,
    truncated: bool,
    unpopulated: usize,
}

impl ScanTree {
    pub fn tree(&self) -> &ElementTree {
        &self.tree
    }

    pub fn selected(&self) -> Option<ElementRef<'_>> {
        self.tree.get(self.selected)
    }

    /// Root-most ancestor reached, or the selected element if it has none
    pub fn top_most(&self) -> Option<ElementRef<'_>> {
        self.tree.get(self.top_most)
    }

    pub fn mode(&self) -> WalkMode {
        self.mode
    }

    pub fn state(&self) -> WalkState {
        self.state
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Whether the element limit cut the walk short
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Elements whose properties could not be read
    pub fn unpopulated(&self) -> usize {
        self.unpopulated
    }

    /// Worst status over every element's results
    pub fn status(&self) -> ScanStatus {
        ScanStatus::aggregate(self.tree.iter().map(|e| e.scan_results().status()))
    }
}

/// Walks a platform tree
///
/// The element counter is shared by every walk of one walker and is never
/// reset implicitly. Call [`TreeWalker::reset_counter`] between walks, or a
/// later walk starts with the budget already spent and comes back truncated.
pub struct TreeWalker<'a, P: AccessibilityTree> {
    platform: &'a P,
    counter: BoundedCounter,
    options: WalkOptions,
    runner: Option<&'a RuleRunner>,
    pool: Option<&'a ThreadPool>,
    state: WalkState,
}

impl<'a, P: AccessibilityTree> TreeWalker<'a, P> {
    pub fn new(platform: &'a P, counter: BoundedCounter, options: WalkOptions) -> Self {
        Self {
            platform,
            counter,
            options,
            runner: None,
            pool: None,
            state: WalkState::Idle,
        }
    }

    pub fn with_runner(mut self, runner: &'a RuleRunner) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Run parallel phases on `pool` instead of the global rayon pool
    pub fn with_pool(mut self, pool: &'a ThreadPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn options(&self) -> &WalkOptions {
        &self.options
    }

    pub fn counter(&self) -> &BoundedCounter {
        &self.counter
    }

    pub fn reset_counter(&mut self) {
        self.counter.reset();
    }

    pub fn state(&self) -> WalkState {
        self.state
    }

    /// Build, populate and (in test mode) evaluate the tree around `selected`
    pub fn walk(&mut self, selected: &P::Handle) -> Result<ScanTree, WalkError> {
        let runner = match (self.options.mode, self.runner) {
            (WalkMode::Test, None) => return Err(WalkError::NoRunner),
            (WalkMode::Test, Some(runner)) => Some(runner),
            (WalkMode::Live, _) => None,
        };

        let start = Instant::now();
        self.state = WalkState::Idle;

        let mut tree = ElementTree::new();
        let mut handles = Vec::new();
        let selected_index = add_node(&mut tree, &mut handles, selected.clone(), 0);

        let ancestors = self.resolve_ancestry(selected);
        let depth = i32::try_from(ancestors.len()).unwrap_or(i32::MAX);
        if !self.counter.try_add(depth)? {
            debug!("Element limit reached before counting {} ancestors", depth);
        }
        let mut child = selected_index;
        let mut id = -1;
        for handle in ancestors {
            let index = add_node(&mut tree, &mut handles, handle, id);
            tree.link(index, child);
            child = index;
            id -= 1;
        }
        let top_most = child;
        self.transition(WalkState::AncestryResolved);

        let mut next_id = 1;
        self.populate_subtree(&mut tree, &mut handles, selected_index, &mut next_id);
        if self.options.sibling_context {
            self.populate_siblings(&mut tree, &mut handles, selected_index, &mut next_id);
        }
        self.transition(WalkState::TreeBuilt);

        let unpopulated = self.populate_properties(&mut tree, &handles);
        self.transition(WalkState::PropertiesPopulated);

        if let Some(runner) = runner {
            self.evaluate_rules(&tree, runner);
            self.transition(WalkState::RulesEvaluated);
        }

        let truncated = self.counter.upper_bound_exceeded();
        if truncated {
            debug!(
                "Walk truncated: {} of {} element attempts admitted",
                self.counter.count(),
                self.counter.attempts()
            );
        }

        Ok(ScanTree {
            tree,
            selected: selected_index,
            top_most,
            mode: self.options.mode,
            state: self.state,
            elapsed: start.elapsed(),
            truncated,
            unpopulated,
        })
    }

    fn transition(&mut self, state: WalkState) {
        debug!("Walk state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Ancestors nearest first; stops at the root, a failure or a repeat
    fn resolve_ancestry(&self, selected: &P::Handle) -> Vec<P::Handle> {
        let mut ancestors: Vec<P::Handle> = Vec::new();
        let mut current = selected.clone();
        while let Some(parent) = best_effort("parent", self.platform.parent(&current)) {
            if parent == *selected || ancestors.contains(&parent) {
                debug!("Ancestry cycle at depth {}", ancestors.len() + 1);
                break;
            }
            ancestors.push(parent.clone());
            current = parent;
        }
        ancestors
    }

    /// Depth-first, ids in preorder
    fn populate_subtree(
        &mut self,
        tree: &mut ElementTree,
        handles: &mut Vec<P::Handle>,
        root: NodeIndex,
        next_id: &mut i32,
    ) {
        let first = best_effort("first_child", self.platform.first_child(&handles[root.get()]));
        let mut stack: Vec<(NodeIndex, Option<P::Handle>)> = vec![(root, first)];

        while let Some(frame) = stack.last_mut() {
            let parent = frame.0;
            let Some(handle) = frame.1.take() else {
                stack.pop();
                continue;
            };
            if !self.counter.try_increment() {
                stack.pop();
                continue;
            }
            frame.1 = best_effort("next_sibling", self.platform.next_sibling(&handle));

            let first = best_effort("first_child", self.platform.first_child(&handle));
            let index = add_node(tree, handles, handle, *next_id);
            *next_id += 1;
            tree.link(parent, index);
            stack.push((index, first));
        }
    }

    /// Re-parent the selected element among its siblings, in platform order
    fn populate_siblings(
        &mut self,
        tree: &mut ElementTree,
        handles: &mut Vec<P::Handle>,
        selected: NodeIndex,
        next_id: &mut i32,
    ) {
        let Some(parent) = tree.get(selected).and_then(|e| e.parent()).map(|p| p.index()) else {
            return;
        };
        let selected_handle = handles[selected.get()].clone();

        let mut ordered = Vec::new();
        let mut seen_selected = false;
        let mut cursor = best_effort("first_child", self.platform.first_child(&handles[parent.get()]));
        while let Some(handle) = cursor {
            if handle == selected_handle {
                if seen_selected {
                    break;
                }
                seen_selected = true;
                ordered.push(selected);
            } else {
                if !self.counter.try_increment() {
                    break;
                }
                ordered.push(add_node(tree, handles, handle.clone(), *next_id));
                *next_id += 1;
            }
            cursor = best_effort("next_sibling", self.platform.next_sibling(&handle));
        }
        if !seen_selected {
            ordered.push(selected);
        }
        tree.adopt_children(parent, ordered);
    }

    /// Returns the number of nodes left without properties
    fn populate_properties(&self, tree: &mut ElementTree, handles: &[P::Handle]) -> usize {
        let platform = self.platform;
        let fill = |node: &mut ElementNode, handle: &P::Handle| -> Result<(), PlatformError> {
            let snapshot = platform.snapshot(handle)?;
            node.populate(snapshot.control_type, snapshot.patterns, snapshot.properties);
            Ok(())
        };

        let nodes = tree.nodes_mut();
        if self.options.parallel {
            self.in_pool(|| {
                nodes
                    .par_iter_mut()
                    .zip(handles.par_iter())
                    .for_each(|(node, handle)| {
                        // Retried sequentially below.
                        let _ = fill(node, handle);
                    })
            });
        }

        let mut unpopulated = 0;
        for (node, handle) in nodes.iter_mut().zip(handles) {
            if node.is_populated() {
                continue;
            }
            if let Err(e) = fill(node, handle) {
                warn!("Properties unavailable for element {}: {}", node.unique_id(), e);
                let control_type = node.control_type();
                node.populate(control_type, Vec::new(), PropertyBag::new());
                unpopulated += 1;
            }
        }
        unpopulated
    }

    fn evaluate_rules(&self, tree: &ElementTree, runner: &RuleRunner) {
        runner.provider().materialize_all();

        let evaluate = |element: ElementRef<'_>| {
            let results = element.scan_results();
            results.clear();
            for run in runner.run_all(element) {
                if run.evaluation_code != EvaluationCode::NotApplicable {
                    results.add_scan_result(ScanResult::from_run_result(&run, element));
                }
            }
        };

        if self.options.parallel {
            let indices: Vec<NodeIndex> = tree.indices().collect();
            self.in_pool(|| {
                indices
                    .par_iter()
                    .filter_map(|&index| tree.get(index))
                    .for_each(&evaluate)
            });
        } else {
            tree.iter().for_each(evaluate);
        }
    }

    fn in_pool<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        match self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

impl<P: AccessibilityTree> fmt::Debug for TreeWalker<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeWalker")
            .field("counter", &self.counter)
            .field("options", &self.options)
            .field("state", &self.state)
            .finish()
    }
}

fn add_node<H>(tree: &mut ElementTree, handles: &mut Vec<H>, handle: H, unique_id: i32) -> NodeIndex {
    handles.push(handle);
    tree.push(ElementNode::new(unique_id, Default::default()))
}

fn best_effort<T>(operation: &str, result: Result<Option<T>, PlatformError>) -> Option<T> {
    result.unwrap_or_else(|e| {
        warn!("Platform {} call failed: {}", operation, e);
        None
    })
}
