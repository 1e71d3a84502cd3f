//! Dead-code cleanup: declarations nothing references any more. Run only
//! when cleanup is requested, repeated to fixpoint by the orchestrator.

use crate::{Filter, Pass};
use unweave_arborist::{Arborist, FlatKind, NodeId};
use unweave_sandbox::Sandbox;
use unweave_syntax::ast::Kind;

pub struct RemoveDeadNodes;

impl Pass for RemoveDeadNodes {
    fn name(&self) -> &'static str {
        "removeDeadNodes"
    }

    fn match_candidates(&self, arb: &Arborist, filter: Filter) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = Vec::new();

        for &id in arb.nodes_of_kind(Kind::FunctionDeclaration) {
            let FlatKind::FunctionDeclaration { id: name, .. } = &arb.node(id).kind else {
                continue;
            };
            if arb.node(*name).references.is_empty() {
                out.push(id);
            }
        }

        for &id in arb.nodes_of_kind(Kind::VariableDeclaration) {
            let FlatKind::VariableDeclaration { declarations, .. } = &arb.node(id).kind else {
                continue;
            };
            // Only whole statements go; a partially dead multi-declarator
            // list stays.
            let all_dead = declarations.iter().all(|&decl| {
                let FlatKind::VariableDeclarator { id: name, init } = &arb.node(decl).kind else {
                    return false;
                };
                arb.node(*name).references.is_empty()
                    && (init.is_none() || is_pure_init(arb, *init))
            });
            if all_dead {
                out.push(id);
            }
        }

        out.retain(|&id| filter(arb, id));
        out.sort();
        out
    }

    fn transform(&self, arb: &mut Arborist, node: NodeId, _sandbox: &mut Sandbox) {
        arb.mark_removed(node);
    }
}

/// Initializers that can vanish without observable effect.
fn is_pure_init(arb: &Arborist, init: NodeId) -> bool {
    match &arb.node(init).kind {
        FlatKind::Literal { .. }
        | FlatKind::RegExpLiteral { .. }
        | FlatKind::BigIntLiteral { .. }
        | FlatKind::Identifier { .. }
        | FlatKind::ThisExpression
        | FlatKind::FunctionExpression { .. }
        | FlatKind::ArrowFunctionExpression { .. } => true,
        FlatKind::ArrayExpression { elements } => elements
            .iter()
            .all(|&el| el.is_none() || is_pure_init(arb, el)),
        FlatKind::ObjectExpression { properties } => properties.iter().all(|&prop| {
            match &arb.node(prop).kind {
                FlatKind::Property { value, .. } => is_pure_init(arb, *value),
                _ => false,
            }
        }),
        FlatKind::UnaryExpression { argument, .. } => is_pure_init(arb, *argument),
        FlatKind::BinaryExpression { left, right, .. }
        | FlatKind::LogicalExpression { left, right, .. } => {
            is_pure_init(arb, *left) && is_pure_init(arb, *right)
        }
        FlatKind::MemberExpression { object, .. } => is_pure_init(arb, *object),
        _ => false,
    }
}
