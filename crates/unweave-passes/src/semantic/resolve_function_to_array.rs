//! Replace calls to a function whose whole body is `return [ … ]` with the
//! array literal itself — the string-array idiom at the heart of most
//! obfuscator output.

use crate::{Filter, Pass};
use unweave_arborist::{Arborist, FlatKind, NodeId};
use unweave_sandbox::Sandbox;
use unweave_syntax::ast::Kind;

pub struct ResolveFunctionToArray;

impl Pass for ResolveFunctionToArray {
    fn name(&self) -> &'static str {
        "resolveFunctionToArray"
    }

    fn match_candidates(&self, arb: &Arborist, filter: Filter) -> Vec<NodeId> {
        arb.nodes_of_kind(Kind::CallExpression)
            .iter()
            .copied()
            .filter(|&id| returned_array(arb, id).is_some())
            .filter(|&id| filter(arb, id))
            .collect()
    }

    fn transform(&self, arb: &mut Arborist, node: NodeId, _sandbox: &mut Sandbox) {
        let Some(array) = returned_array(arb, node) else {
            return;
        };
        let replacement = arb.to_ast(array);
        arb.mark_node(node, replacement);
    }
}

/// The ArrayExpression a qualifying callee returns.
fn returned_array(arb: &Arborist, call: NodeId) -> Option<NodeId> {
    let FlatKind::CallExpression { callee, arguments } = &arb.node(call).kind else {
        return None;
    };
    if !arguments.is_empty() {
        return None;
    }
    let decl = arb.node(*callee).decl_node;
    if decl.is_none() {
        return None;
    }
    let decl_parent = arb.node(decl).parent;
    if decl_parent.is_none() {
        return None;
    }
    let FlatKind::FunctionDeclaration { params, body, .. } = &arb.node(decl_parent).kind else {
        return None;
    };
    if !params.is_empty() {
        return None;
    }
    let FlatKind::BlockStatement { body: stmts } = &arb.node(*body).kind else {
        return None;
    };
    let [only] = stmts.as_slice() else {
        return None;
    };
    let FlatKind::ReturnStatement { argument } = &arb.node(*only).kind else {
        return None;
    };
    if argument.is_none() || arb.node(*argument).kind() != Kind::ArrayExpression {
        return None;
    }
    Some(*argument)
}
