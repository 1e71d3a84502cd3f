//! Evaluate binary expressions whose whole subtree is literal-valued:
//! `5 * 3` → `15`, `'2' + 2` → `'22'`, `3 - -1` → `4`.

use super::{eval_cached, is_literal_valued, statement_src};
use crate::{Filter, Pass};
use unweave_arborist::{Arborist, NodeId};
use unweave_sandbox::Sandbox;
use unweave_syntax::ast::Kind;

pub struct ResolveDefiniteBinaryExpressions;

impl Pass for ResolveDefiniteBinaryExpressions {
    fn name(&self) -> &'static str {
        "resolveDefiniteBinaryExpressions"
    }

    fn match_candidates(&self, arb: &Arborist, filter: Filter) -> Vec<NodeId> {
        arb.nodes_of_kind(Kind::BinaryExpression)
            .iter()
            .copied()
            .filter(|&id| is_literal_valued(arb, id))
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
