//! `obj['key']` → `obj.key` when the key is a valid identifier.

use crate::{Filter, Pass};
use unweave_arborist::{Arborist, FlatKind, NodeId};
use unweave_sandbox::Sandbox;
use unweave_syntax::ast::{Kind, Lit, Node, NodeKind};

pub struct NormalizeComputedAccesses;

impl Pass for NormalizeComputedAccesses {
    fn name(&self) -> &'static str {
        "normalizeComputedAccesses"
    }

    fn match_candidates(&self, arb: &Arborist, filter: Filter) -> Vec<NodeId> {
        arb.nodes_of_kind(Kind::MemberExpression)
            .iter()
            .copied()
            .filter(|&id| {
                let FlatKind::MemberExpression {
                    property, computed, ..
                } = &arb.node(id).kind
                else {
                    return false;
                };
                *computed
                    && matches!(
                        arb.node(*property).literal(),
                        Some(Lit::Str(key)) if is_identifier_name(key)
                    )
            })
            .filter(|&id| filter(arb, id))
            .collect()
    }

    fn transform(&self, arb: &mut Arborist, node: NodeId, _sandbox: &mut Sandbox) {
        let FlatKind::MemberExpression {
            object, property, ..
        } = &arb.node(node).kind
        else {
            return;
        };
        let Some(Lit::Str(key)) = arb.node(*property).literal().cloned() else {
            return;
        };
        let object = arb.to_ast(*object);
        arb.mark_node(
            node,
            Node::synth(NodeKind::MemberExpression {
                object: Box::new(object),
                property: Box::new(Node::ident(key)),
                computed: false,
            }),
        );
    }
}

/// Valid dot-notation key: identifier shape and not a reserved word.
fn is_identifier_name(key: &str) -> bool {
    let mut chars = key.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_' || first == '$') {
        return false;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
        return false;
    }
    !matches!(
        key,
        "var" | "let" | "const" | "function" | "return" | "if" | "else" | "for" | "in" | "of"
            | "while" | "do" | "break" | "continue" | "new" | "delete" | "typeof" | "void"
            | "instanceof" | "this" | "null" | "true" | "false" | "throw" | "try" | "catch"
            | "finally" | "switch" | "case" | "default" | "class" | "extends" | "super"
            | "import" | "export" | "yield" | "await" | "static" | "enum"
    )
}
