// src/dag/graph.rs

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::catalog::{Catalog, Resource, ResourceId};

/// Lifecycle of one graph node.
///
/// `Waiting → Ready → Running → Done | Failed`; descendants of a failed node
/// jump `Waiting → Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Waiting,
    Ready,
    Running,
    Done,
    Failed,
    Skipped,
}

impl NodeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeState::Done | NodeState::Failed | NodeState::Skipped)
    }
}

/// Outcome reported for a dispatched node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The applier succeeded; `changed` records whether it mutated the host.
    Ok { changed: bool },
    Failed,
}

#[derive(Debug)]
struct Node {
    resource: Resource,
    /// Direct dependencies as node indices.
    deps: Vec<usize>,
    /// Reverse edges: nodes that depend on this one.
    dependents: Vec<usize>,
    /// Dependencies not yet `Done`.
    blocked_on: usize,
    state: NodeState,
    changed: bool,
}

/// The dependency graph: nodes in a flat vector, a side map from resource ID
/// to index, reverse edges as index lists.
///
/// Readiness ties always break by ascending resource ID, so identical inputs
/// produce identical dispatch orders (and `jobs = 1` runs are one fixed
/// topological order).
#[derive(Debug)]
pub struct DepGraph {
    nodes: Vec<Node>,
    index: HashMap<ResourceId, usize>,
    /// Ready-but-not-yet-dispatched nodes, ordered by ID.
    ready: BTreeSet<ResourceId>,
    /// Count of nodes in a terminal state.
    terminal: usize,
}

impl DepGraph {
    /// Build the graph from a catalog.
    ///
    /// Assumes the catalog passed [`crate::catalog::validate_catalog`]:
    /// unique nonzero IDs, resolvable dependencies, no cycles. Dependency
    /// lists are deduplicated here so a repeated edge counts once.
    pub fn from_catalog(catalog: Catalog) -> Self {
        let mut index = HashMap::with_capacity(catalog.resources.len());
        for (i, resource) in catalog.resources.iter().enumerate() {
            index.insert(resource.id, i);
        }

        let mut nodes: Vec<Node> = catalog
            .resources
            .into_iter()
            .map(|resource| Node {
                resource,
                deps: Vec::new(),
                dependents: Vec::new(),
                blocked_on: 0,
                state: NodeState::Waiting,
                changed: false,
            })
            .collect();

        for i in 0..nodes.len() {
            let deps: BTreeSet<ResourceId> =
                nodes[i].resource.dependencies.iter().copied().collect();
            for dep in deps {
                match index.get(&dep) {
                    Some(&d) => {
                        nodes[i].deps.push(d);
                        nodes[i].blocked_on += 1;
                        nodes[d].dependents.push(i);
                    }
                    None => {
                        // Validation rejects this; tolerate rather than panic.
                        warn!(
                            resource = nodes[i].resource.id,
                            dep, "dependency missing from graph"
                        );
                    }
                }
            }
        }

        let mut ready = BTreeSet::new();
        for node in &mut nodes {
            if node.blocked_on == 0 {
                node.state = NodeState::Ready;
                ready.insert(node.resource.id);
            }
        }

        Self {
            nodes,
            index,
            ready,
            terminal: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Lowest-ID ready node, transitioned `Ready → Running`.
    /// The engine dispatches it to a worker immediately.
    pub fn pop_ready(&mut self) -> Option<ResourceId> {
        let id = self.ready.iter().next().copied()?;
        self.ready.remove(&id);
        let idx = self.index[&id];
        self.nodes[idx].state = NodeState::Running;
        Some(id)
    }

    /// The resource behind a node. Panics on an ID the graph never held.
    pub fn resource(&self, id: ResourceId) -> &Resource {
        &self.nodes[self.index[&id]].resource
    }

    /// Whether any direct dependency of `id` recorded a change.
    /// Meaningful once `id` is dispatched (all its dependencies are `Done`).
    pub fn deps_changed(&self, id: ResourceId) -> bool {
        let idx = self.index[&id];
        self.nodes[idx].deps.iter().any(|&d| self.nodes[d].changed)
    }

    /// Record the outcome of a running node.
    ///
    /// On success, successors with no remaining unfinished dependencies
    /// enter the ready set. On failure, every transitive descendant is
    /// marked `Skipped` and will never be dispatched.
    pub fn mark(&mut self, id: ResourceId, outcome: Outcome) {
        let idx = match self.index.get(&id) {
            Some(&idx) => idx,
            None => {
                warn!(resource = id, "completion for unknown resource; ignoring");
                return;
            }
        };
        if self.nodes[idx].state != NodeState::Running {
            warn!(
                resource = id,
                state = ?self.nodes[idx].state,
                "completion for a node that is not running; ignoring"
            );
            return;
        }

        match outcome {
            Outcome::Ok { changed } => {
                self.nodes[idx].state = NodeState::Done;
                self.nodes[idx].changed = changed;
                self.terminal += 1;
                debug!(resource = id, changed, "resource done");

                let dependents = self.nodes[idx].dependents.clone();
                for d in dependents {
                    self.nodes[d].blocked_on -= 1;
                    if self.nodes[d].blocked_on == 0 && self.nodes[d].state == NodeState::Waiting {
                        self.nodes[d].state = NodeState::Ready;
                        self.ready.insert(self.nodes[d].resource.id);
                    }
                }
            }
            Outcome::Failed => {
                self.nodes[idx].state = NodeState::Failed;
                self.terminal += 1;
                self.skip_descendants(idx);
            }
        }
    }

    /// Reverse-edge traversal marking every not-yet-terminal descendant of a
    /// failed node as `Skipped`.
    fn skip_descendants(&mut self, failed: usize) {
        let mut stack = self.nodes[failed].dependents.clone();

        while let Some(i) = stack.pop() {
            match self.nodes[i].state {
                NodeState::Waiting | NodeState::Ready => {
                    if self.nodes[i].state == NodeState::Ready {
                        // Unreachable for a true descendant, but keep the
                        // ready set consistent if it ever happens.
                        self.ready.remove(&self.nodes[i].resource.id);
                    }
                    self.nodes[i].state = NodeState::Skipped;
                    self.terminal += 1;
                    debug!(
                        resource = self.nodes[i].resource.id,
                        "skipping resource: upstream failure"
                    );
                    stack.extend(self.nodes[i].dependents.iter().copied());
                }
                NodeState::Running | NodeState::Done | NodeState::Failed | NodeState::Skipped => {}
            }
        }
    }

    /// True once every node is terminal (`Done`, `Failed`, or `Skipped`).
    pub fn is_done(&self) -> bool {
        self.terminal == self.nodes.len()
    }

    pub fn has_ready(&self) -> bool {
        !self.ready.is_empty()
    }

    pub fn state(&self, id: ResourceId) -> Option<NodeState> {
        self.index.get(&id).map(|&idx| self.nodes[idx].state)
    }

    pub fn changed_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.changed).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.state == NodeState::Skipped)
            .count()
    }
}
