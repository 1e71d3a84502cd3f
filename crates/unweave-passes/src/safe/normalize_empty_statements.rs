//! Remove stray `;` statements.

use crate::{Filter, Pass};
use unweave_arborist::{Arborist, NodeId};
use unweave_sandbox::Sandbox;
use unweave_syntax::ast::Kind;

pub struct NormalizeEmptyStatements;

impl Pass for NormalizeEmptyStatements {
    fn name(&self) -> &'static str {
        "normalizeEmptyStatements"
    }

    fn match_candidates(&self, arb: &Arborist, filter: Filter) -> Vec<NodeId> {
        arb.nodes_of_kind(Kind::EmptyStatement)
            .iter()
            .copied()
            // Only list positions: `while (x);` bodies must survive.
            .filter(|&id| {
                let parent = arb.node(id).parent;
                !parent.is_none()
                    && matches!(
                        arb.node(parent).kind(),
                        Kind::Program | Kind::BlockStatement | Kind::SwitchCase
                    )
            })
            .filter(|&id| filter(arb, id))
            .collect()
    }

    fn transform(&self, arb: &mut Arborist, node: NodeId, _sandbox: &mut Sandbox) {
        arb.mark_removed(node);
    }
}
