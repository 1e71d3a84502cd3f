//! Fold ternaries with literal tests: `1 ? a : b` → `a`, `0n ? a : b` → `b`.

use super::{bigint_truthy, literal_truthy};
use crate::{Filter, Pass};
use unweave_arborist::{Arborist, FlatKind, NodeId};
use unweave_sandbox::Sandbox;
use unweave_syntax::ast::Kind;

pub struct ResolveDeterministicConditionalExpressions;

impl Pass for ResolveDeterministicConditionalExpressions {
    fn name(&self) -> &'static str {
        "resolveDeterministicConditionalExpressions"
    }

    fn match_candidates(&self, arb: &Arborist, filter: Filter) -> Vec<NodeId> {
        arb.nodes_of_kind(Kind::ConditionalExpression)
            .iter()
            .copied()
            .filter(|&id| {
                let FlatKind::ConditionalExpression { test, .. } = &arb.node(id).kind else {
                    return false;
                };
                matches!(
                    arb.node(*test).kind(),
                    Kind::Literal | Kind::BigIntLiteral
                )
            })
            .filter(|&id| filter(arb, id))
            .collect()
    }

    fn transform(&self, arb: &mut Arborist, node: NodeId, _sandbox: &mut Sandbox) {
        let FlatKind::ConditionalExpression {
            test,
            consequent,
            alternate,
        } = &arb.node(node).kind
        else {
            return;
        };
        let truthy = match &arb.node(*test).kind {
            FlatKind::Literal { value } => literal_truthy(value),
            FlatKind::BigIntLiteral { text } => bigint_truthy(text),
            _ => return,
        };
        let chosen = if truthy { *consequent } else { *alternate };
        let replacement = arb.to_ast(chosen);
        arb.mark_node(node, replacement);
    }
}
