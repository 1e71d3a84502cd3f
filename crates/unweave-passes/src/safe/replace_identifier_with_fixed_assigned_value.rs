//! Inline bindings whose initializer is a primitive literal and which are
//! provably never written again: `var k = 3; f(k);` → `f(3);`.

use crate::mutation;
use crate::{Filter, Pass};
use unweave_arborist::{Arborist, FlatKind, NodeId};
use unweave_sandbox::Sandbox;
use unweave_syntax::ast::Kind;

pub struct ReplaceIdentifierWithFixedAssignedValue;

impl Pass for ReplaceIdentifierWithFixedAssignedValue {
    fn name(&self) -> &'static str {
        "replaceIdentifierWithFixedAssignedValue"
    }

    fn match_candidates(&self, arb: &Arborist, filter: Filter) -> Vec<NodeId> {
        arb.nodes_of_kind(Kind::VariableDeclarator)
            .iter()
            .copied()
            .filter(|&id| {
                let FlatKind::VariableDeclarator { id: name, init } = &arb.node(id).kind else {
                    return false;
                };
                if init.is_none() || arb.node(*init).kind() != Kind::Literal {
                    return false;
                }
                !arb.node(*name).references.is_empty() && !mutation::is_mutated(arb, *name)
            })
            .filter(|&id| filter(arb, id))
            .collect()
    }

    fn transform(&self, arb: &mut Arborist, node: NodeId, _sandbox: &mut Sandbox) {
        let FlatKind::VariableDeclarator { id: name, init } = &arb.node(node).kind else {
            return;
        };
        let init = *init;
        let references = arb.node(*name).references.clone();
        let literal = arb.to_ast(init);
        for reference in references {
            // A shorthand property value shares its span with the key;
            // splicing a literal there would corrupt the object.
            let parent = arb.node(reference).parent;
            if !parent.is_none() {
                if let FlatKind::Property { shorthand: true, .. } = &arb.node(parent).kind {
                    continue;
                }
            }
            arb.mark_node(reference, literal.clone());
        }
    }
}
