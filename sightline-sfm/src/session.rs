//! The single-flight solve session.
//!
//! A solve is the only long-running operation in the system, and it runs
//! outside the process. The session models it as a cancellable unit of work:
//! beginning a solve hands out a snapshot and arms the in-flight ticket,
//! cancellation discards the ticket with no graph mutation, and completion
//! ingests the result atomically. At most one solve may be in flight; a
//! second request is rejected rather than queued so the graph never sees
//! concurrent writers.

use sightline_core::SceneGraph;

use crate::bridge::{
    export_snapshot, ingest_result, BridgeError, SnapshotIndex, SolveDiagnostics, SolveResult,
    SolveSnapshot,
};
use crate::InferenceSettings;

#[derive(Debug, Default)]
pub struct SolveSession {
    pending: Option<SnapshotIndex>,
}

impl SolveSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self) -> bool {
        self.pending.is_some()
    }

    /// Starts a solve: exports a snapshot for the external solver and arms
    /// the in-flight ticket.
    ///
    /// Fails with [`BridgeError::SolveInProgress`] while a solve is pending.
    pub fn begin_solve(
        &mut self,
        graph: &SceneGraph,
        settings: &InferenceSettings,
    ) -> Result<SolveSnapshot, BridgeError> {
        if self.pending.is_some() {
            return Err(BridgeError::SolveInProgress);
        }
        let (snapshot, index) = export_snapshot(graph, settings);
        self.pending = Some(index);
        Ok(snapshot)
    }

    /// Discards the pending solve, if any, with no graph mutation. Returns
    /// whether there was one.
    pub fn cancel_solve(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Completes the pending solve by ingesting the result.
    ///
    /// Commits atomically on acceptance; leaves the graph untouched on
    /// solver-reported failure, on rejection by the acceptance policy, and
    /// on a malformed result. The ticket is consumed in every case.
    pub fn complete_solve(
        &mut self,
        graph: &mut SceneGraph,
        result: &SolveResult,
        settings: &InferenceSettings,
    ) -> Result<SolveDiagnostics, BridgeError> {
        let index = self.pending.take().ok_or(BridgeError::NoSolveInFlight)?;
        ingest_result(graph, &index, result, settings)
    }
}
