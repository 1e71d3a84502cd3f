//! Isolated fragment evaluator.
//!
//! `eval_in_vm` executes a source fragment in a sandboxed interpreter with no
//! host globals beyond a fixed pure subset and converts the completion value
//! to a literal syntax node. `None` is the bad-value verdict: timeout, fuel
//! exhaustion, a thrown value, a reference to a disallowed global, or a
//! non-literalisable result. Callers treat it as "skip this candidate".

pub mod builtins;
pub mod interp;
pub mod literal;
pub mod value;

pub use interp::{Budget, Signal};
pub use literal::literalise;
pub use value::Value;

use interp::Interp;
use tracing::trace;
use unweave_syntax::ast::Node;

/// A warm sandbox: global environment plus budget configuration. One
/// instance may serve many calls within a pass (definitions accumulate), but
/// never crosses passes.
pub struct Sandbox {
    interp: Interp,
}

impl Sandbox {
    pub fn new() -> Sandbox {
        Sandbox::with_budget(Budget::default())
    }

    pub fn with_budget(budget: Budget) -> Sandbox {
        Sandbox {
            interp: Interp::new(budget),
        }
    }
}

impl Default for Sandbox {
    fn default() -> Sandbox {
        Sandbox::new()
    }
}

/// Execute a fragment and literalise its completion value.
pub fn eval_in_vm(fragment: &str, sandbox: &mut Sandbox) -> Option<Node> {
    let program = match unweave_syntax::parse(fragment) {
        Ok(program) => program,
        Err(err) => {
            trace!(error = %err, "fragment failed to parse; bad value");
            return None;
        }
    };
    sandbox.interp.begin_call();
    match sandbox.interp.eval_program(&program.root) {
        Ok(value) => {
            let node = literalise(&value);
            if node.is_none() {
                trace!(value = ?value, "completion value is not literalisable; bad value");
            }
            node
        }
        Err(signal) => {
            trace!(signal = ?signal, "fragment evaluation aborted; bad value");
            None
        }
    }
}

#[cfg(test)]
#[path = "tests/sandbox.rs"]
mod tests;
