//! # Sightline SFM
//!
//! The reconstruction-preparation engine: given the entity graph from
//! `sightline-core`, this crate validates constraint consistency, propagates
//! partial knowledge into a best-effort 3d position for every point, and
//! marshals the graph across the boundary to an external bundle-adjustment
//! solver.
//!
//! The intended flow after any graph mutation:
//!
//! 1. optionally [`validate`](validator::validate) — advisory, never
//!    mutates;
//! 2. [`propagate`](propagator::propagate) — recomputes the inferred layer
//!    of the dirty subgraph deterministically and with a hard pass cap;
//! 3. on demand, [`SolveSession::begin_solve`](session::SolveSession) hands
//!    a [`SolveSnapshot`](bridge::SolveSnapshot) to the external solver, and
//!    [`SolveSession::complete_solve`](session::SolveSession) commits the
//!    result atomically (or not at all).
//!
//! Validation and propagation are synchronous and single-threaded; the
//! solve is the only asynchronous unit of work and at most one is in flight.

pub mod bridge;
pub mod propagator;
pub mod session;
pub mod settings;
pub mod snapshot;
pub mod validator;

pub use bridge::{
    export_snapshot, ingest_result, BridgeError, SolveDiagnostics, SolveResult, SolveSnapshot,
    SnapshotIndex,
};
pub use propagator::{propagate, Conflict, PropagationReport, Priority};
pub use session::SolveSession;
pub use settings::{InferenceSettings, RobustLoss};
pub use snapshot::{ProjectSnapshot, RestoreError};
pub use validator::{validate, Issue, IssueKind, Severity, ValidationReport};
