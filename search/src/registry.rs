//! The driver's per-state registry: a dense, append-only table of search nodes indexed by a
//! compact [`StateId`], plus the `State -> StateId` deduplication map.
//!
//! Follows the ref-pool/ref-store split used elsewhere in this workspace: states are deduplicated
//! the way an intern pool interns values, while the mutable per-state bookkeeping (open/closed/dead
//! flag, `g`, Tarjan fields) lives in a parallel `RefStore` that supports in-place mutation, which a
//! pure intern pool does not.

use mugs_collections::{create_ref_type, RefStore};
use mugs_model::state::OpId;
use mugs_model::State;
use std::collections::HashMap;

create_ref_type!(StateId);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Open,
    Closed,
    Dead,
}

/// Everything the drivers track about one visited state.
#[derive(Debug, Clone)]
pub struct SearchNode {
    pub parent: Option<StateId>,
    pub incoming_op: Option<OpId>,
    pub g: u32,
    pub status: NodeStatus,
    /// Tarjan bookkeeping; unused (`None`/`false`) under the best-first driver.
    pub tarjan_index: Option<u32>,
    pub tarjan_lowlink: Option<u32>,
    pub on_stack: bool,
    /// Set by the Tarjan driver when some edge out of this node reaches an already-resolved,
    /// non-dead-end state. Aggregated (by OR) across an SCC's members to decide whether the
    /// component as a whole is closed.
    pub has_live_successor: bool,
}

impl SearchNode {
    fn root() -> Self {
        SearchNode {
            parent: None,
            incoming_op: None,
            g: 0,
            status: NodeStatus::Open,
            tarjan_index: None,
            tarjan_lowlink: None,
            on_stack: false,
            has_live_successor: false,
        }
    }

    fn child(parent: StateId, op: OpId, g: u32) -> Self {
        SearchNode {
            parent: Some(parent),
            incoming_op: Some(op),
            g,
            status: NodeStatus::Open,
            tarjan_index: None,
            tarjan_lowlink: None,
            on_stack: false,
            has_live_successor: false,
        }
    }
}

/// Owns every visited [`State`] (deduplicated) and its [`SearchNode`].
#[derive(Default)]
pub struct StateRegistry {
    states: RefStore<StateId, State>,
    index: HashMap<State, StateId>,
    nodes: RefStore<StateId, SearchNode>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers the initial state, returning its id. Must be called exactly once, before any
    /// `get_or_create`.
    pub fn insert_root(&mut self, state: State) -> StateId {
        let id = self.states.push(state.clone());
        self.index.insert(state, id);
        let node_id = self.nodes.push(SearchNode::root());
        debug_assert_eq!(id, node_id);
        id
    }

    /// Interns `state`, returning its id and whether it had not been seen before. When new, the
    /// node is created as a child of `parent` via `op` at path cost `g`; an already-known state's
    /// existing node is left untouched (the caller decides whether to improve it).
    pub fn get_or_create(&mut self, state: State, parent: StateId, op: OpId, g: u32) -> (StateId, bool) {
        if let Some(&id) = self.index.get(&state) {
            return (id, false);
        }
        let id = self.states.push(state.clone());
        self.index.insert(state, id);
        let node_id = self.nodes.push(SearchNode::child(parent, op, g));
        debug_assert_eq!(id, node_id);
        (id, true)
    }

    pub fn state(&self, id: StateId) -> &State {
        self.states.get(id)
    }

    pub fn node(&self, id: StateId) -> &SearchNode {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: StateId) -> &mut SearchNode {
        self.nodes.get_mut(id)
    }

    pub fn set_status(&mut self, id: StateId, status: NodeStatus) {
        self.nodes.get_mut(id).status = status;
    }

    pub fn mark_live(&mut self, id: StateId) {
        self.nodes.get_mut(id).has_live_successor = true;
    }

    /// Rewires `id`'s parent pointer, used both for first-discovery and for reopening/improving.
    pub fn relink(&mut self, id: StateId, parent: StateId, op: OpId, g: u32) {
        let node = self.nodes.get_mut(id);
        node.parent = Some(parent);
        node.incoming_op = Some(op);
        node.g = g;
    }

    /// Walks parent pointers from `id` back to the root, returning the operator sequence in
    /// forward (root-to-`id`) order.
    pub fn extract_plan(&self, id: StateId) -> Vec<OpId> {
        let mut steps = Vec::new();
        let mut current = id;
        loop {
            let node = self.node(current);
            match (node.parent, node.incoming_op) {
                (Some(parent), Some(op)) => {
                    steps.push(op);
                    current = parent;
                }
                _ => break,
            }
        }
        steps.reverse();
        steps
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
