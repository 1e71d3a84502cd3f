//! Fold the unary/array "alphabet" JSFuck-style obfuscators build on:
//! `+[]` → `0`, `![]` → `false`, `+!+[]` → `1`, `[]+[]` → `''`.
//!
//! The sandbox is the oracle; the candidate shape is restricted to
//! unary/binary trees over array and literal atoms so meaning-changing mixes
//! (`+this`) never qualify.

use super::{eval_cached, statement_src};
use crate::{Filter, Pass};
use unweave_arborist::{Arborist, FlatKind, NodeId};
use unweave_sandbox::Sandbox;
use unweave_syntax::ast::{BinaryOp, Kind, UnaryOp};

pub struct ResolveMinimalAlphabet;

impl Pass for ResolveMinimalAlphabet {
    fn name(&self) -> &'static str {
        "resolveMinimalAlphabet"
    }

    fn match_candidates(&self, arb: &Arborist, filter: Filter) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = Vec::new();
        for &id in arb.nodes_of_kind(Kind::UnaryExpression) {
            let FlatKind::UnaryExpression { op, argument } = &arb.node(id).kind else {
                continue;
            };
            if matches!(
                op,
                UnaryOp::Plus | UnaryOp::Minus | UnaryOp::Not | UnaryOp::BitNot
            ) && is_alphabet_operand(arb, *argument)
                && contains_array(arb, *argument)
            {
                out.push(id);
            }
        }
        for &id in arb.nodes_of_kind(Kind::BinaryExpression) {
            let FlatKind::BinaryExpression {
                op: BinaryOp::Add,
                left,
                right,
            } = &arb.node(id).kind
            else {
                continue;
            };
            if is_alphabet_operand(arb, *left)
                && is_alphabet_operand(arb, *right)
                && (contains_array(arb, *left) || contains_array(arb, *right))
            {
                out.push(id);
            }
        }
        out.retain(|&id| filter(arb, id));
        out.sort();
        out
    }

    fn transform(&self, arb: &mut Arborist, node: NodeId, sandbox: &mut Sandbox) {
        let fragment = statement_src(arb, node);
        if let Some(replacement) = eval_cached(arb, &fragment, sandbox) {
            arb.mark_node(node, replacement);
        }
    }
}

fn is_alphabet_operand(arb: &Arborist, id: NodeId) -> bool {
    match &arb.node(id).kind {
        FlatKind::Literal { .. } => true,
        FlatKind::ArrayExpression { elements } => elements
            .iter()
            .all(|&el| el.is_none() || is_alphabet_operand(arb, el)),
        FlatKind::UnaryExpression {
            op: UnaryOp::Plus | UnaryOp::Minus | UnaryOp::Not | UnaryOp::BitNot,
            argument,
        } => is_alphabet_operand(arb, *argument),
        FlatKind::BinaryExpression {
            op: BinaryOp::Add,
            left,
            right,
        } => is_alphabet_operand(arb, *left) && is_alphabet_operand(arb, *right),
        _ => false,
    }
}

fn contains_array(arb: &Arborist, id: NodeId) -> bool {
    match &arb.node(id).kind {
        FlatKind::ArrayExpression { .. } => true,
        FlatKind::UnaryExpression { argument, .. } => contains_array(arb, *argument),
        FlatKind::BinaryExpression { left, right, .. } => {
            contains_array(arb, *left) || contains_array(arb, *right)
        }
        _ => false,
    }
}
