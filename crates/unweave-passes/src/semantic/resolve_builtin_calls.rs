//! Fold calls to whitelisted pure builtins with literal arguments:
//! `atob('…')`, `String.fromCharCode(104)`, `'abc'.toUpperCase()`.
//!
//! Refusals: a shadowed callee, a receiver of unknown identity, a computed
//! property fed by a variable, the `constructor` property, or any
//! non-literal argument.

use super::{all_literal_arguments, eval_cached, is_undefined_ident, statement_src};
use crate::{Filter, Pass};
use unweave_arborist::{Arborist, FlatKind, NodeId};
use unweave_sandbox::Sandbox;
use unweave_syntax::ast::{Kind, Lit};

pub struct ResolveBuiltinCalls;

const GLOBAL_WHITELIST: &[&str] = &[
    "atob",
    "btoa",
    "parseInt",
    "parseFloat",
    "isNaN",
    "isFinite",
    "escape",
    "unescape",
    "encodeURIComponent",
    "decodeURIComponent",
    "String",
    "Number",
    "Boolean",
];

/// Namespaces whose (non-computed) static methods are pure.
const NAMESPACE_WHITELIST: &[&str] = &["String", "Math", "Number", "JSON"];

impl Pass for ResolveBuiltinCalls {
    fn name(&self) -> &'static str {
        "resolveBuiltinCalls"
    }

    fn match_candidates(&self, arb: &Arborist, filter: Filter) -> Vec<NodeId> {
        arb.nodes_of_kind(Kind::CallExpression)
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
    let FlatKind::CallExpression { callee, arguments } = &arb.node(id).kind else {
        return false;
    };
    if !all_literal_arguments(arb, arguments) {
        return false;
    }

    match &arb.node(*callee).kind {
        // Bare global: must not be shadowed by a local declaration.
        FlatKind::Identifier { name } => {
            GLOBAL_WHITELIST.contains(&name.as_str()) && arb.node(*callee).decl_node.is_none()
        }
        FlatKind::MemberExpression {
            object,
            property,
            computed,
        } => {
            let Some(prop_name) = property_name(arb, *property, *computed) else {
                return false;
            };
            if prop_name == "constructor" {
                return false;
            }
            match &arb.node(*object).kind {
                // Namespace statics: `String.fromCharCode`, `Math.max`, …
                FlatKind::Identifier { name } => {
                    NAMESPACE_WHITELIST.contains(&name.as_str())
                        && arb.node(*object).decl_node.is_none()
                }
                // Literal receiver: `'abc'.toUpperCase()`. The receiver's
                // identity is known, so `this` is safe.
                FlatKind::Literal {
                    value: Lit::Str(_), ..
                } => unweave_sandbox::builtins::is_string_method(&prop_name),
                FlatKind::Literal {
                    value: Lit::Num(_), ..
                } => unweave_sandbox::builtins::is_number_method(&prop_name),
                _ => false,
            }
        }
        _ => false,
    }
}

/// The property name when it is statically known: an identifier, or a
/// computed access with a string literal. A computed access through a
/// variable is refused.
fn property_name(arb: &Arborist, property: NodeId, computed: bool) -> Option<String> {
    if computed {
        match arb.node(property).literal() {
            Some(Lit::Str(s)) => Some(s.clone()),
            _ => None,
        }
    } else {
        arb.node(property).ident_name().map(str::to_owned)
    }
}
