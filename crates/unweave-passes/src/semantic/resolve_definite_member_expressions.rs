//! Fold member accesses on literal bases: `'123'[0]` → `'1'`,
//! `'hello'.length` → `5`. Out-of-bounds indices are left alone — the
//! sandbox would yield `undefined`, which is not a safe substitute.

use super::{eval_cached, is_undefined_ident, statement_src};
use crate::{Filter, Pass};
use unweave_arborist::{Arborist, FlatKind, NodeId};
use unweave_sandbox::Sandbox;
use unweave_syntax::ast::{Kind, Lit};

pub struct ResolveDefiniteMemberExpressions;

impl Pass for ResolveDefiniteMemberExpressions {
    fn name(&self) -> &'static str {
        "resolveDefiniteMemberExpressions"
    }

    fn match_candidates(&self, arb: &Arborist, filter: Filter) -> Vec<NodeId> {
        arb.nodes_of_kind(Kind::MemberExpression)
            .iter()
            .copied()
            .filter(|&id| is_candidate(arb, id))
            .filter(|&id| filter(arb, id))
            .collect()
    }

    fn transform(&self, arb: &mut Arborist, node: NodeId, sandbox: &mut Sandbox) {
        let fragment = statement_src(arb, node);
        if let Some(replacement) = eval_cached(arb, &fragment, sandbox) {
            if is_undefined_ident(&replacement) {
                return;
            }
            arb.mark_node(node, replacement);
        }
    }
}

fn is_candidate(arb: &Arborist, id: NodeId) -> bool {
    let FlatKind::MemberExpression {
        object,
        property,
        computed,
    } = &arb.node(id).kind
    else {
        return false;
    };

    // Position guards: no `++'a'[0]`, no folding a method out from under its
    // receiver.
    let parent = arb.node(id).parent;
    if !parent.is_none() {
        let parent_kind = arb.node(parent).kind();
        if parent_kind == Kind::UpdateExpression {
            return false;
        }
        if (parent_kind == Kind::CallExpression || parent_kind == Kind::NewExpression)
            && arb.node(id).parent_key == "callee"
        {
            return false;
        }
        if arb.node(id).parent_key == "left" && parent_kind == Kind::AssignmentExpression {
            return false;
        }
    }

    let base_len = match &arb.node(*object).kind {
        FlatKind::Literal {
            value: Lit::Str(s), ..
        } => Some(s.encode_utf16().count()),
        FlatKind::ArrayExpression { elements } => {
            if !elements.iter().all(|&el| {
                !el.is_none()
                    && matches!(
                        arb.node(el).kind(),
                        Kind::Literal | Kind::BigIntLiteral
                    )
            }) {
                return false;
            }
            Some(elements.len())
        }
        FlatKind::ObjectExpression { properties } => {
            let all_literal = properties.iter().all(|&prop| {
                matches!(
                    &arb.node(prop).kind,
                    FlatKind::Property {
                        value,
                        computed: false,
                        ..
                    } if matches!(arb.node(*value).kind(), Kind::Literal | Kind::BigIntLiteral)
                )
            });
            if !all_literal {
                return false;
            }
            // Key membership is checked below instead of a length bound.
            None
        }
        _ => return false,
    };

    // Empty bases never fold.
    if base_len == Some(0) {
        return false;
    }

    if *computed {
        match arb.node(*property).literal() {
            Some(Lit::Num(n)) => {
                let Some(len) = base_len else { return false };
                *n >= 0.0 && n.trunc() == *n && (*n as usize) < len
            }
            Some(Lit::Str(key)) => match &arb.node(*object).kind {
                FlatKind::ObjectExpression { properties } => {
                    object_has_key(arb, properties, key)
                }
                _ => key == "length",
            },
            _ => false,
        }
    } else {
        match arb.node(*property).ident_name() {
            Some("length") => true,
            Some(name) => match &arb.node(*object).kind {
                FlatKind::ObjectExpression { properties } => {
                    object_has_key(arb, properties, name)
                }
                _ => false,
            },
            None => false,
        }
    }
}

fn object_has_key(arb: &Arborist, properties: &[NodeId], key: &str) -> bool {
    properties.iter().any(|&prop| {
        let FlatKind::Property {
            key: key_node,
            computed: false,
            ..
        } = &arb.node(prop).kind
        else {
            return false;
        };
        match &arb.node(*key_node).kind {
            FlatKind::Identifier { name } => name == key,
            FlatKind::Literal {
                value: Lit::Str(s), ..
            } => s == key,
            _ => false,
        }
    })
}
