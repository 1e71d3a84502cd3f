//! Split top-level comma sequences into separate statements:
//! `a(), b();` → `a();\nb();`.

use crate::{Filter, Pass};
use unweave_arborist::{Arborist, FlatKind, NodeId};
use unweave_sandbox::Sandbox;
use unweave_syntax::ast::{Kind, Node, NodeKind};

pub struct ReplaceSequencesWithExpressions;

impl Pass for ReplaceSequencesWithExpressions {
    fn name(&self) -> &'static str {
        "replaceSequencesWithExpressions"
    }

    fn match_candidates(&self, arb: &Arborist, filter: Filter) -> Vec<NodeId> {
        arb.nodes_of_kind(Kind::ExpressionStatement)
            .iter()
            .copied()
            .filter(|&id| {
                let FlatKind::ExpressionStatement { expression } = &arb.node(id).kind else {
                    return false;
                };
                arb.node(*expression).kind() == Kind::SequenceExpression
            })
            .filter(|&id| filter(arb, id))
            .collect()
    }

    fn transform(&self, arb: &mut Arborist, node: NodeId, _sandbox: &mut Sandbox) {
        let FlatKind::ExpressionStatement { expression } = &arb.node(node).kind else {
            return;
        };
        let FlatKind::SequenceExpression { expressions } = &arb.node(*expression).kind else {
            return;
        };
        let statements: Vec<Node> = expressions
            .iter()
            .map(|&e| {
                Node::synth(NodeKind::ExpressionStatement {
                    expression: Box::new(arb.to_ast(e)),
                })
            })
            .collect();
        // A Program replacement splices as a run of sibling statements.
        arb.mark_node(node, Node::synth(NodeKind::Program { body: statements }));
    }
}
