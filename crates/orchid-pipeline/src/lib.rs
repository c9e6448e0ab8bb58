//! Orchid Pipeline
//!
//! The standard computation pipeline: structure loading, calculation
//! planning, energy/force evaluation with an SCF retry loop, and final
//! validation. Each step implements the workflow node contract and works
//! purely on the shared run state; artifact writing stays with the
//! executor.
//!
//! The evaluation step is the slot for the eventual science kernels. The
//! implementation shipped here is a deterministic model: convergence and
//! energies are pure functions of the plan and the structure descriptor,
//! which is what makes end-to-end runs reproducible byte for byte.

mod build_plan;
mod graph;
mod load_structure;
mod repair_and_retry;
mod run_relaxation;
mod util;
mod validate_and_report;

pub use build_plan::BuildPlan;
pub use graph::{initial_state, route_after_run, standard_graph};
pub use load_structure::LoadStructure;
pub use repair_and_retry::RepairAndRetry;
pub use run_relaxation::RunRelaxation;
pub use validate_and_report::ValidateAndReport;
