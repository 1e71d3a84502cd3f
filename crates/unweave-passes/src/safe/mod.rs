//! Safe passes: purely syntactic rewrites that never consult the sandbox
//! and are idempotent on fixpoint inputs.

pub mod normalize_computed_accesses;
pub mod normalize_empty_statements;
pub mod remove_dead_nodes;
pub mod replace_identifier_with_fixed_assigned_value;
pub mod replace_sequences_with_expressions;

use crate::Pass;

/// The safe pass list, in execution order.
pub fn passes() -> Vec<Box<dyn Pass>> {
    vec![
        Box::new(normalize_computed_accesses::NormalizeComputedAccesses),
        Box::new(normalize_empty_statements::NormalizeEmptyStatements),
        Box::new(replace_sequences_with_expressions::ReplaceSequencesWithExpressions),
        Box::new(
            replace_identifier_with_fixed_assigned_value::ReplaceIdentifierWithFixedAssignedValue,
        ),
    ]
}
