//! The augmented-decoder idiom: a decoder function is reassigned
//! (`decode = something(decode)`) or handed to an IIFE that permutes the
//! string array, and call sites decode through the rewritten binding. The
//! context collector gathers the declaration, the augmenting assignments,
//! and the IIFE; deferring the IIFE to the end of the fragment reproduces
//! the installed state, so each call site can be evaluated and inlined.

use tracing::debug;

use super::{all_literal_arguments, eval_cached, is_undefined_ident};
use crate::context::{context_of, ordered_source};
use crate::mutation;
use crate::{accept_all, commit, Filter, Pass};
use unweave_arborist::{Arborist, FlatKind, NodeId};
use unweave_common::Span;
use unweave_sandbox::Sandbox;
use unweave_syntax::ast::Kind;

pub struct ResolveAugmentedFunctionWrappedArrayReplacements;

impl Pass for ResolveAugmentedFunctionWrappedArrayReplacements {
    fn name(&self) -> &'static str {
        "resolveAugmentedFunctionWrappedArrayReplacements"
    }

    fn match_candidates(&self, arb: &Arborist, filter: Filter) -> Vec<NodeId> {
        arb.nodes_of_kind(Kind::CallExpression)
            .iter()
            .copied()
            .filter(|&id| augmented_declaration(arb, id).is_some())
            .filter(|&id| filter(arb, id))
            .collect()
    }

    fn transform(&self, arb: &mut Arborist, node: NodeId, sandbox: &mut Sandbox) {
        let Some(decl_parent) = augmented_declaration(arb, node) else {
            return;
        };
        let context = context_of(arb, decl_parent);
        let mut fragment = ordered_source(arb, &context, false);
        fragment.push_str(arb.src(node));
        fragment.push(';');
        if let Some(replacement) = eval_cached(arb, &fragment, sandbox) {
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
        debug!(pass = self.name(), candidates = candidates.len(), "pass start");
        let mut sandbox = Sandbox::new();
        let mut rewritten: Vec<Span> = Vec::new();
        for id in candidates {
            let span = arb.node(id).span;
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

/// A call whose callee is a locally declared function that IS mutated — by
/// direct reassignment or by being passed to an augmenting call — with
/// literal arguments. The complement of resolveLocalCalls' mutation guard.
fn augmented_declaration(arb: &Arborist, call: NodeId) -> Option<NodeId> {
    let FlatKind::CallExpression { callee, arguments } = &arb.node(call).kind else {
        return None;
    };
    if !all_literal_arguments(arb, arguments) {
        return None;
    }
    let callee = *callee;
    if arb.node(callee).kind() != Kind::Identifier {
        return None;
    }
    let decl = arb.node(callee).decl_node;
    if decl.is_none() {
        return None;
    }
    let decl_parent = arb.node(decl).parent;
    if decl_parent.is_none() || arb.node(decl_parent).kind() != Kind::FunctionDeclaration {
        return None;
    }
    // Mutated bindings are this pass's domain; pristine ones belong to
    // resolveLocalCalls.
    if !mutation::is_mutated(arb, decl) && !passed_to_call(arb, decl) {
        return None;
    }
    Some(decl_parent)
}

/// Whether any reference hands the binding to a call as an argument (the
/// wrapping IIFE that permutes the array).
fn passed_to_call(arb: &Arborist, decl: NodeId) -> bool {
    arb.node(decl).references.iter().any(|&reference| {
        let parent = arb.node(reference).parent;
        !parent.is_none()
            && arb.node(reference).parent_key == "arguments"
            && arb.node(parent).kind() == Kind::CallExpression
    })
}
