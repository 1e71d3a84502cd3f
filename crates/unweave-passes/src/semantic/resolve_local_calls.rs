//! Inline calls whose callee resolves to a local declaration or a literal
//! object method, by evaluating them together with their collected context:
//! `function add(a, b) { return a + b; } add(1, 2);` → `… 3;`, and likewise
//! `var calc = { add: function (a, b) { … } }; calc.add(1, 2);`.
//!
//! Candidates are ordered by callee-name frequency (descending) so the
//! most-called helpers land first and later rewrites see resolved constants.

use rustc_hash::FxHashMap;
use tracing::debug;

use super::{all_literal_arguments, eval_cached, is_undefined_ident, statement_src};
use crate::context::{context_of, ordered_source};
use crate::mutation;
use crate::{accept_all, commit, Filter, Pass};
use unweave_arborist::{Arborist, FlatKind, NodeId};
use unweave_common::Span;
use unweave_sandbox::Sandbox;
use unweave_syntax::ast::{Kind, Lit, PropertyKind};

pub struct ResolveLocalCalls;

/// Local declarations that shadow well-known globals are left alone: a
/// program redefining `atob` is exactly the kind of trap obfuscators set,
/// and other passes key off these names.
const SHADOWED_BUILTIN_SKIP: &[&str] = &[
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
    "eval",
    "String",
    "Number",
    "Boolean",
    "Array",
    "Object",
    "Math",
    "JSON",
    "RegExp",
    "Symbol",
    "BigInt",
];

impl Pass for ResolveLocalCalls {
    fn name(&self) -> &'static str {
        "resolveLocalCalls"
    }

    fn match_candidates(&self, arb: &Arborist, filter: Filter) -> Vec<NodeId> {
        arb.nodes_of_kind(Kind::CallExpression)
            .iter()
            .copied()
            .filter(|&id| callee_declaration(arb, id).is_some())
            .filter(|&id| filter(arb, id))
            .collect()
    }

    fn transform(&self, arb: &mut Arborist, node: NodeId, sandbox: &mut Sandbox) {
        let Some(origin) = callee_declaration(arb, node) else {
            return;
        };
        let call_span = arb.node(node).span;
        let mut context = context_of(arb, origin);
        // The call's own source is appended below; context pieces inside it
        // (an inline object-literal receiver) would only duplicate text.
        context.retain(|&id| !call_span.contains_span(arb.node(id).span));
        let mut fragment = ordered_source(arb, &context, false);
        fragment.push_str(&statement_src(arb, node));
        if let Some(replacement) = eval_cached(arb, &fragment, sandbox) {
            // Folding a call to `undefined` would erase a possibly
            // side-effecting statement.
            if is_undefined_ident(&replacement) {
                return;
            }
            arb.mark_node(node, replacement);
        }
    }

    fn run(&self, arb: &mut Arborist) -> bool {
        let candidates = self.match_candidates(arb, &accept_all);
        if candidates.is_empty() {
            return false;
        }

        // Frequency sort: inline the most-called helpers first. Stable, so
        // equal counts stay in id order.
        let mut counts: FxHashMap<String, usize> = FxHashMap::default();
        for &id in &candidates {
            if let Some(name) = callee_name(arb, id) {
                *counts.entry(name).or_insert(0) += 1;
            }
        }
        let mut ordered = candidates;
        ordered.sort_by_key(|&id| {
            std::cmp::Reverse(
                callee_name(arb, id)
                    .and_then(|name| counts.get(&name).copied())
                    .unwrap_or(0),
            )
        });

        debug!(pass = self.name(), candidates = ordered.len(), "pass start");
        let mut sandbox = Sandbox::new();
        let mut rewritten: Vec<Span> = Vec::new();
        for id in ordered {
            let span = arb.node(id).span;
            // A range already rewritten this pass owns everything inside it.
            if rewritten.iter().any(|r| r.contains_span(span)) {
                continue;
            }
            self.transform(arb, id, &mut sandbox);
            if arb.is_marked(id) {
                rewritten.push(span);
            }
        }
        commit(self.name(), arb)
    }
}

/// The context origin behind the callee, when the call qualifies: the local
/// function declaration, the declarator holding a function or object-literal
/// value, or an inline object literal whose method is being called.
fn callee_declaration(arb: &Arborist, call: NodeId) -> Option<NodeId> {
    let FlatKind::CallExpression { callee, arguments } = &arb.node(call).kind else {
        return None;
    };

    // Bad-argument set: ThisExpression has no identity inside a fragment.
    if arguments
        .iter()
        .any(|&arg| !arg.is_none() && arb.node(arg).kind() == Kind::ThisExpression)
    {
        return None;
    }
    if !all_literal_arguments(arb, arguments) {
        return None;
    }

    let callee = *callee;
    match &arb.node(callee).kind {
        FlatKind::Identifier { name } => {
            if SHADOWED_BUILTIN_SKIP.contains(&name.as_str()) {
                return None;
            }
            let decl = arb.node(callee).decl_node;
            if decl.is_none() {
                return None;
            }
            // A binding rewritten later in the program cannot be inlined
            // from its declaration alone; the augmented-function pass owns
            // that idiom.
            if mutation::is_mutated(arb, decl) {
                return None;
            }

            let decl_parent = arb.node(decl).parent;
            if decl_parent.is_none() {
                return None;
            }
            match &arb.node(decl_parent).kind {
                FlatKind::FunctionDeclaration { .. } => Some(decl_parent),
                FlatKind::VariableDeclarator { init, .. } => {
                    if init.is_none() {
                        return None;
                    }
                    match arb.node(*init).kind() {
                        Kind::FunctionExpression | Kind::ArrowFunctionExpression => {
                            Some(decl_parent)
                        }
                        // Trivial identifier/literal wrappers cascade badly
                        // with other passes; leave them to the inliner.
                        _ => None,
                    }
                }
                _ => None,
            }
        }
        // Literal object method: `obj.foo(…)` on a local object-literal
        // binding, or `{foo: function () {…}}.foo(…)` inline.
        FlatKind::MemberExpression {
            object,
            property,
            computed,
        } => {
            let method = property_key(arb, *property, *computed)?;
            match &arb.node(*object).kind {
                FlatKind::ObjectExpression { .. } => {
                    if has_function_property(arb, *object, &method) {
                        Some(*object)
                    } else {
                        None
                    }
                }
                FlatKind::Identifier { name } => {
                    if SHADOWED_BUILTIN_SKIP.contains(&name.as_str()) {
                        return None;
                    }
                    let decl = arb.node(*object).decl_node;
                    if decl.is_none() {
                        return None;
                    }
                    if mutation::is_mutated(arb, decl) {
                        return None;
                    }
                    let decl_parent = arb.node(decl).parent;
                    if decl_parent.is_none() {
                        return None;
                    }
                    let FlatKind::VariableDeclarator { init, .. } =
                        &arb.node(decl_parent).kind
                    else {
                        return None;
                    };
                    if init.is_none() || arb.node(*init).kind() != Kind::ObjectExpression {
                        return None;
                    }
                    if has_function_property(arb, *init, &method) {
                        Some(decl_parent)
                    } else {
                        None
                    }
                }
                _ => None,
            }
        }
        _ => None,
    }
}

/// Statically known property key: an identifier, or a computed access with a
/// string literal.
fn property_key(arb: &Arborist, property: NodeId, computed: bool) -> Option<String> {
    if computed {
        match arb.node(property).literal() {
            Some(Lit::Str(s)) => Some(s.clone()),
            _ => None,
        }
    } else {
        arb.node(property).ident_name().map(str::to_owned)
    }
}

/// Whether an object literal carries `method` as a plain function-valued
/// property.
fn has_function_property(arb: &Arborist, object: NodeId, method: &str) -> bool {
    let FlatKind::ObjectExpression { properties } = &arb.node(object).kind else {
        return false;
    };
    properties.iter().any(|&prop| {
        let FlatKind::Property {
            key,
            value,
            computed,
            kind,
            ..
        } = &arb.node(prop).kind
        else {
            return false;
        };
        if *kind != PropertyKind::Init {
            return false;
        }
        let name_matches = if *computed {
            matches!(arb.node(*key).literal(), Some(Lit::Str(s)) if s == method)
        } else {
            match &arb.node(*key).kind {
                FlatKind::Identifier { name } => name == method,
                FlatKind::Literal {
                    value: Lit::Str(s), ..
                } => s == method,
                _ => false,
            }
        };
        name_matches
            && matches!(
                arb.node(*value).kind(),
                Kind::FunctionExpression | Kind::ArrowFunctionExpression
            )
    })
}

fn callee_name(arb: &Arborist, call: NodeId) -> Option<String> {
    let FlatKind::CallExpression { callee, .. } = &arb.node(call).kind else {
        return None;
    };
    match &arb.node(*callee).kind {
        FlatKind::Identifier { name } => Some(name.clone()),
        FlatKind::MemberExpression {
            object,
            property,
            computed,
        } => {
            let method = property_key(arb, *property, *computed)?;
            match arb.node(*object).ident_name() {
                Some(receiver) => Some(format!("{receiver}.{method}")),
                None => Some(method),
            }
        }
        _ => None,
    }
}
