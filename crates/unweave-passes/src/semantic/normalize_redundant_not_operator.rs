//! Fold `!expr` where the operand reduces to a literal: `!0` → `true`,
//! `![]` → `false`, `!!!true` → `false`. `!variable` and `!call()` stay.

use super::{eval_cached, statement_src};
use crate::{Filter, Pass};
use unweave_arborist::{Arborist, FlatKind, NodeId};
use unweave_sandbox::Sandbox;
use unweave_syntax::ast::{Kind, UnaryOp};

pub struct NormalizeRedundantNotOperator;

impl Pass for NormalizeRedundantNotOperator {
    fn name(&self) -> &'static str {
        "normalizeRedundantNotOperator"
    }

    fn match_candidates(&self, arb: &Arborist, filter: Filter) -> Vec<NodeId> {
        arb.nodes_of_kind(Kind::UnaryExpression)
            .iter()
            .copied()
            .filter(|&id| {
                let FlatKind::UnaryExpression {
                    op: UnaryOp::Not,
                    argument,
                } = &arb.node(id).kind
                else {
                    return false;
                };
                is_reducible(arb, *argument)
            })
            .filter(|&id| filter(arb, id))
            .collect()
    }

    fn transform(&self, arb: &mut Arborist, node: NodeId, sandbox: &mut Sandbox) {
        let fragment = statement_src(arb, node);
        if let Some(replacement) = eval_cached(arb, &fragment, sandbox) {
            arb.mark_node(node, replacement);
        }
    }
}

/// Literal / Array / Object / nested Unary operands reduce; anything with a
/// free name or call does not.
fn is_reducible(arb: &Arborist, id: NodeId) -> bool {
    match &arb.node(id).kind {
        FlatKind::Literal { .. } | FlatKind::BigIntLiteral { .. } => true,
        FlatKind::ArrayExpression { elements } => elements
            .iter()
            .all(|&el| el.is_none() || is_reducible(arb, el)),
        FlatKind::ObjectExpression { properties } => properties.iter().all(|&prop| {
            matches!(
                &arb.node(prop).kind,
                FlatKind::Property { value, .. } if is_reducible(arb, *value)
            )
        }),
        FlatKind::UnaryExpression { argument, .. } => is_reducible(arb, *argument),
        _ => false,
    }
}
