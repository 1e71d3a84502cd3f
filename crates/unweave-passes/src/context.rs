//! Context collection and fragment assembly.
//!
//! `context_of` gathers the minimal set of nodes whose concatenated source
//! makes an origin node self-contained: the declarations it references, the
//! assignments and augmenting calls that shape those bindings, and the free
//! variables captured by any function in the set. `ordered_source` then
//! prints the set as a standalone fragment for the sandbox.
//!
//! The traversal is an explicit work stack over node ids with a visited set;
//! ranges already covered by a collected ancestor are skipped, and pure
//! leaves are filtered at the end since they contribute no standalone
//! statement.

use rustc_hash::FxHashSet;
use unweave_arborist::{Arborist, FlatKind, NodeId};
use unweave_common::{Fingerprint, Span};
use unweave_syntax::ast::Kind;

use crate::cache::{self, ContextKey};
use crate::mutation::MUTATING_PROPERTIES;

/// Collect the context for `origin`. Results are memoised per fingerprint
/// generation under both an identity key and a content-only key.
pub fn context_of(arb: &Arborist, origin: NodeId) -> Vec<NodeId> {
    let generation = arb.fingerprint();
    let content = Fingerprint::of(arb.src(origin));
    let id_key = ContextKey::NodeContent(origin, content);
    let content_key = ContextKey::ContentOnly(content);

    if let Some(hit) = cache::with_bucket(generation, |bucket| {
        bucket
            .contexts
            .get(&id_key)
            .or_else(|| bucket.contexts.get(&content_key))
            .cloned()
    }) {
        return hit;
    }

    let result = collect(arb, origin);
    cache::with_bucket(generation, |bucket| {
        bucket.contexts.insert(id_key, result.clone());
        bucket.contexts.insert(content_key, result.clone());
    });
    result
}

fn collect(arb: &Arborist, origin: NodeId) -> Vec<NodeId> {
    let mut stack: Vec<NodeId> = vec![origin];
    let mut visited: FxHashSet<NodeId> = FxHashSet::default();
    let mut collected: Vec<NodeId> = Vec::new();
    let mut ranges: Vec<Span> = Vec::new();

    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        if arb.is_marked_for_deletion(id) {
            continue;
        }

        let node = arb.node(id);
        let span = node.span;
        let covered = ranges.iter().any(|r| r.contains_span(span) && *r != span);
        if !covered {
            collected.push(id);
            ranges.push(span);
        }

        match &node.kind {
            FlatKind::VariableDeclarator { id: decl_ident, .. } => {
                // Everything that writes through this binding is part of its
                // observable setup: direct assignments, content-modifying
                // property writes and method calls, and calls that take the
                // binding as an argument (augmenting functions).
                for &reference in &arb.node(*decl_ident).references {
                    if let Some(relevant) = relevant_use(arb, reference) {
                        stack.push(relevant);
                    }
                }
            }
            FlatKind::FunctionDeclaration { id: decl_ident, .. } => {
                for &reference in &arb.node(*decl_ident).references {
                    if let Some(relevant) = relevant_use(arb, reference) {
                        stack.push(relevant);
                    }
                }
            }
            FlatKind::AssignmentExpression { right, .. } => {
                stack.push(*right);
            }
            FlatKind::CallExpression { arguments, .. } => {
                for &arg in arguments {
                    if !arg.is_none() && arb.node(arg).kind() == Kind::Identifier {
                        stack.push(arg);
                    }
                }
            }
            FlatKind::MemberExpression { property, .. } => {
                stack.push(*property);
            }
            FlatKind::Identifier { .. } => {
                if !node.decl_node.is_none() {
                    // The declaration's parent is the declarator or function
                    // that gives this name meaning.
                    let decl_parent = arb.node(node.decl_node).parent;
                    if !decl_parent.is_none() {
                        stack.push(decl_parent);
                    }
                }
            }
            _ => {}
        }

        // Free variables captured by a function in the set need their own
        // declarations discovered.
        if matches!(
            node.kind(),
            Kind::FunctionDeclaration | Kind::FunctionExpression | Kind::ArrowFunctionExpression
        ) {
            if let Some(body) = function_body(arb, id) {
                let scope = arb.node(body).scope;
                if !scope.is_none() {
                    for &through in &arb.scope(scope).through {
                        stack.push(through);
                    }
                }
            }
        }

        // Children keep the discovery walk going.
        for (_, child) in node.children() {
            stack.push(child);
        }
    }

    // Pure leaves contribute no standalone statement.
    collected.retain(|&id| {
        !matches!(
            arb.node(id).kind(),
            Kind::Literal | Kind::Identifier | Kind::MemberExpression
        )
    });
    collected.sort();
    collected
}

/// For a reference to a collected binding, the node that must ride along:
/// the assignment writing it, the member write or mutating call through it,
/// or the call augmenting it.
fn relevant_use(arb: &Arborist, reference: NodeId) -> Option<NodeId> {
    let node = arb.node(reference);
    let parent = node.parent;
    if parent.is_none() {
        return None;
    }
    let key = node.parent_key;
    match &arb.node(parent).kind {
        FlatKind::AssignmentExpression { .. } if key == "left" => Some(parent),
        FlatKind::MemberExpression { property, computed, .. } if key == "object" => {
            let grand = arb.node(parent).parent;
            if grand.is_none() {
                return None;
            }
            // `x.y = …`
            if arb.node(parent).parent_key == "left"
                && arb.node(grand).kind() == Kind::AssignmentExpression
            {
                return Some(grand);
            }
            // `x.push(…)` and friends
            if !*computed {
                if let Some(name) = arb.node(*property).ident_name() {
                    if MUTATING_PROPERTIES.contains(&name)
                        && arb.node(parent).parent_key == "callee"
                        && arb.node(grand).kind() == Kind::CallExpression
                    {
                        return Some(grand);
                    }
                }
            }
            None
        }
        FlatKind::CallExpression { .. } if key == "arguments" => Some(parent),
        _ => None,
    }
}

fn function_body(arb: &Arborist, id: NodeId) -> Option<NodeId> {
    match &arb.node(id).kind {
        FlatKind::FunctionDeclaration { body, .. }
        | FlatKind::FunctionExpression { body, .. }
        | FlatKind::ArrowFunctionExpression { body, .. } => Some(*body),
        _ => None,
    }
}

// =============================================================================
// Ordered-source fragment printer
// =============================================================================

/// Print a collected node set as a standalone fragment.
///
/// Nodes are emitted in ascending source position. Top-level IIFEs are
/// deferred to the end (in original relative order) unless `preserve_order`
/// is set, since they typically install prototype methods or permute arrays
/// that earlier pieces merely declare. Anonymous standalone function
/// expressions get a deterministic `func<nodeId>` name so the fragment can
/// reference them.
pub fn ordered_source(arb: &Arborist, nodes: &[NodeId], preserve_order: bool) -> String {
    let mut unique: Vec<NodeId> = Vec::new();
    let mut seen: FxHashSet<NodeId> = FxHashSet::default();
    for &id in nodes {
        if seen.insert(id) {
            unique.push(id);
        }
    }
    unique.sort_by_key(|&id| arb.node(id).span.start);

    let mut leading: Vec<NodeId> = Vec::new();
    let mut deferred: Vec<NodeId> = Vec::new();
    for id in unique {
        if !preserve_order && is_iife_piece(arb, id) {
            deferred.push(id);
        } else {
            leading.push(id);
        }
    }

    let mut out = String::new();
    for id in leading.into_iter().chain(deferred) {
        emit_piece(arb, id, &mut out);
    }
    out
}

fn emit_piece(arb: &Arborist, id: NodeId, out: &mut String) {
    let node = arb.node(id);
    match &node.kind {
        FlatKind::FunctionExpression { id: name, .. } if name.is_none() => {
            // Name the anonymous function expression so the fragment can
            // stand alone and call it.
            let src = arb.src(id);
            if let Some(rest) = src.strip_prefix("function") {
                out.push_str(&format!("function func{}{rest}", id.0));
            } else {
                out.push_str(src);
            }
        }
        FlatKind::CallExpression { .. } => {
            out.push_str(arb.src(id));
            // A bare call fragment needs a terminator when it came from an
            // expression statement.
            let parent = node.parent;
            if !parent.is_none() && arb.node(parent).kind() == Kind::ExpressionStatement {
                out.push(';');
            }
        }
        FlatKind::VariableDeclarator { .. } => {
            // The declarator's source reads `name = init`; re-typed as a
            // plain assignment it recreates the binding in the fragment.
            out.push_str("var ");
            out.push_str(arb.src(id));
            out.push(';');
        }
        FlatKind::AssignmentExpression { .. } => {
            out.push_str(arb.src(id));
            out.push(';');
        }
        _ => {
            out.push_str(arb.src(id));
        }
    }
    out.push('\n');
}

/// An IIFE, possibly wrapped in a punctuation unary (`!fn()`, `~fn()`) or an
/// expression statement.
fn is_iife_piece(arb: &Arborist, id: NodeId) -> bool {
    match &arb.node(id).kind {
        FlatKind::ExpressionStatement { expression } => is_iife_piece(arb, *expression),
        FlatKind::UnaryExpression { argument, .. } => is_iife_piece(arb, *argument),
        FlatKind::CallExpression { callee, .. } => matches!(
            arb.node(*callee).kind(),
            Kind::FunctionExpression | Kind::ArrowFunctionExpression
        ),
        _ => false,
    }
}

#[cfg(test)]
#[path = "tests/context.rs"]
mod tests;
