//! Orchid Workflow
//!
//! This crate provides the building blocks of a workflow: the immutable
//! [`RunState`] threaded between nodes, the [`Node`] contract each step
//! implements, and the validated [`WorkflowGraph`] of nodes and edges.
//!
//! Key properties:
//! - State is never mutated in place; each node produces a new snapshot,
//!   so any transition can be replayed from its logged state.
//! - Routing is explicit: an edge is either a single target or a pure
//!   selector over the state choosing among declared targets. There is no
//!   hidden dispatch.
//! - Topology is validated at construction, never discovered mid-run.

mod error;
mod graph;
mod node;
mod state;

pub use error::GraphError;
pub use graph::{Edge, EdgeSelector, GraphBuilder, WorkflowGraph};
pub use node::{FailureKind, Node, NodeResult, RetryPolicy};
pub use state::RunState;
