//! Evaluate calls to methods the program injected onto builtin prototypes:
//! `String.prototype.secret = function () { … }; 'hello'.secret();` folds
//! the call while leaving the installation in place.

use super::{all_literal_arguments, eval_cached, is_undefined_ident};
use crate::{Filter, Pass};
use unweave_arborist::{Arborist, FlatKind, NodeId};
use unweave_sandbox::Sandbox;
use unweave_syntax::ast::{Kind, Lit};

pub struct ResolveInjectedPrototypeMethodCalls;

const INJECTABLE: &[&str] = &["String", "Number", "Array", "Object"];

impl Pass for ResolveInjectedPrototypeMethodCalls {
    fn name(&self) -> &'static str {
        "resolveInjectedPrototypeMethodCalls"
    }

    fn match_candidates(&self, arb: &Arborist, filter: Filter) -> Vec<NodeId> {
        arb.nodes_of_kind(Kind::CallExpression)
            .iter()
            .copied()
            .filter(|&id| installation_for(arb, id).is_some())
            .filter(|&id| filter(arb, id))
            .collect()
    }

    fn transform(&self, arb: &mut Arborist, node: NodeId, sandbox: &mut Sandbox) {
        let Some(installation) = installation_for(arb, node) else {
            return;
        };
        let fragment = format!("{};\n{};", arb.src(installation), arb.src(node));
        if let Some(replacement) = eval_cached(arb, &fragment, sandbox) {
            if is_undefined_ident(&replacement) {
                return;
            }
            arb.mark_node(node, replacement);
        }
    }
}

/// For `'lit'.method(…)`, find the `X.prototype.method = function …`
/// assignment that defines it.
fn installation_for(arb: &Arborist, call: NodeId) -> Option<NodeId> {
    let FlatKind::CallExpression { callee, arguments } = &arb.node(call).kind else {
        return None;
    };
    if !all_literal_arguments(arb, arguments) {
        return None;
    }
    let FlatKind::MemberExpression {
        object,
        property,
        computed: false,
    } = &arb.node(*callee).kind
    else {
        return None;
    };
    // Receiver must be a literal so `this` has known identity.
    if !matches!(arb.node(*object).literal(), Some(Lit::Str(_) | Lit::Num(_))) {
        return None;
    }
    let method = arb.node(*property).ident_name()?;
    // Native methods belong to resolveBuiltinCalls; this pass only handles
    // names the program itself installed.
    if unweave_sandbox::builtins::is_string_method(method)
        || unweave_sandbox::builtins::is_number_method(method)
    {
        return None;
    }

    for &assign in arb.nodes_of_kind(Kind::AssignmentExpression) {
        let FlatKind::AssignmentExpression { left, right, .. } = &arb.node(assign).kind else {
            continue;
        };
        if !matches!(
            arb.node(*right).kind(),
            Kind::FunctionExpression | Kind::ArrowFunctionExpression
        ) {
            continue;
        }
        // left: <Builtin>.prototype.<method>
        let FlatKind::MemberExpression {
            object: proto_member,
            property: method_node,
            computed: false,
        } = &arb.node(*left).kind
        else {
            continue;
        };
        if arb.node(*method_node).ident_name() != Some(method) {
            continue;
        }
        let FlatKind::MemberExpression {
            object: builtin,
            property: proto_name,
            computed: false,
        } = &arb.node(*proto_member).kind
        else {
            continue;
        };
        if arb.node(*proto_name).ident_name() != Some("prototype") {
            continue;
        }
        let Some(builtin_name) = arb.node(*builtin).ident_name() else {
            continue;
        };
        if INJECTABLE.contains(&builtin_name) && arb.node(*builtin).decl_node.is_none() {
            return Some(assign);
        }
    }
    None
}
