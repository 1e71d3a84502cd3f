//! The rewrite pass catalogue and its supporting analyses.
//!
//! A pass is a match/transform pair over the Arborist. Safe passes are
//! purely syntactic; unsafe passes consult the sandbox or reference analysis
//! and fail closed per candidate. The orchestrator drives both lists to
//! fixpoint.

pub mod cache;
pub mod context;
pub mod mutation;
pub mod orchestrator;
pub mod safe;
pub mod semantic;

pub use orchestrator::{deobfuscate, Config};

use tracing::debug;
use unweave_arborist::{Arborist, NodeId};
use unweave_sandbox::Sandbox;

/// Candidate filter composed on the match stream.
pub type Filter<'a> = &'a dyn Fn(&Arborist, NodeId) -> bool;

/// Accept-everything default filter.
pub fn accept_all(_arb: &Arborist, _node: NodeId) -> bool {
    true
}

/// One rewrite pass: a pure candidate search plus a staged mutation per
/// candidate. `run` is the orchestrator's entry point; it commits through
/// `apply_changes`, so callers must treat all previously held node ids as
/// stale afterwards.
pub trait Pass {
    fn name(&self) -> &'static str;

    /// Pure search; must not mutate the substrate.
    fn match_candidates(&self, arb: &Arborist, filter: Filter) -> Vec<NodeId>;

    /// Stage the rewrite for one candidate. Refusals just decline to mark.
    fn transform(&self, arb: &mut Arborist, node: NodeId, sandbox: &mut Sandbox);

    /// Match through a caller-composed filter, transform each candidate in
    /// order, commit. Returns whether the committed source changed.
    fn run_filtered(&self, arb: &mut Arborist, filter: Filter) -> bool {
        let candidates = self.match_candidates(arb, filter);
        if candidates.is_empty() {
            return false;
        }
        debug!(pass = self.name(), candidates = candidates.len(), "pass start");
        let mut sandbox = Sandbox::new();
        for candidate in candidates {
            self.transform(arb, candidate, &mut sandbox);
        }
        commit(self.name(), arb)
    }

    /// The orchestrator's entry point: `run_filtered` with every candidate
    /// accepted.
    fn run(&self, arb: &mut Arborist) -> bool {
        self.run_filtered(arb, &accept_all)
    }
}

/// Commit staged marks, mapping a reparse failure to "no progress" (the
/// previous substrate stays valid, per the error design).
pub(crate) fn commit(pass: &str, arb: &mut Arborist) -> bool {
    match arb.apply_changes() {
        Ok(changed) => {
            if changed {
                debug!(pass, "pass changed the source");
            }
            changed
        }
        Err(err) => {
            debug!(pass, error = %err, "commit failed; skipping pass result");
            false
        }
    }
}
