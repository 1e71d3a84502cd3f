//! Scope construction and reference resolution.
//!
//! Runs over the flat forest after flattening, in three linear passes (ids
//! are pre-order, so parents are always visited before children):
//!
//! 1. scope assignment — functions, blocks, `for` heads, catch clauses and
//!    switch bodies introduce scopes; every node records the scope it lives
//!    in;
//! 2. declaration hoisting — `function` and `var` bind in the nearest
//!    function-or-program scope, `let`/`const` and catch params in their
//!    immediate scope;
//! 3. reference resolution — every reference-position Identifier resolves up
//!    the scope chain, recording the declaration → references back-links and
//!    each crossed scope's `through` set.

use crate::node::{FlatKind, FlatNode, NodeId, Scope, ScopeId, ScopeKind};
use rustc_hash::FxHashMap;
use unweave_syntax::ast::{DeclKind, Kind};

pub(crate) fn bind(nodes: &mut [FlatNode], scopes: &mut Vec<Scope>) {
    assign_scopes(nodes, scopes);
    declare_bindings(nodes, scopes);
    resolve_references(nodes, scopes);
}

fn new_scope(scopes: &mut Vec<Scope>, parent: ScopeId, kind: ScopeKind) -> ScopeId {
    let id = ScopeId(scopes.len() as u32);
    scopes.push(Scope::new(id, parent, kind));
    id
}

fn assign_scopes(nodes: &mut [FlatNode], scopes: &mut Vec<Scope>) {
    if nodes.is_empty() {
        return;
    }
    // Scope introduced by each introducer node, created lazily on first
    // child visit.
    let mut inner: FxHashMap<NodeId, ScopeId> = FxHashMap::default();

    let root_scope = new_scope(scopes, ScopeId::NONE, ScopeKind::Program);
    nodes[0].scope = root_scope;
    inner.insert(NodeId(0), root_scope);

    for i in 1..nodes.len() {
        let parent = nodes[i].parent;
        if parent.is_none() {
            // Detached replacement subtree; scoping does not apply.
            continue;
        }
        let parent_key = nodes[i].parent_key;
        let parent_scope = nodes[parent.index()].scope;
        let parent_kind = nodes[parent.index()].kind();

        let scope = match parent_kind {
            // A function declaration's name lives in the outer scope; the
            // rest of the function in its own.
            Kind::FunctionDeclaration if parent_key == "id" => parent_scope,
            Kind::FunctionDeclaration | Kind::FunctionExpression | Kind::ArrowFunctionExpression => {
                *inner
                    .entry(parent)
                    .or_insert_with(|| new_scope(scopes, parent_scope, ScopeKind::Function))
            }
            Kind::BlockStatement
            | Kind::ForStatement
            | Kind::ForInStatement
            | Kind::ForOfStatement
            | Kind::CatchClause
            | Kind::SwitchStatement => *inner
                .entry(parent)
                .or_insert_with(|| new_scope(scopes, parent_scope, ScopeKind::Block)),
            _ => parent_scope,
        };
        nodes[i].scope = scope;
    }
}

/// Walk up to the nearest function-or-program scope (the `var` hoist target).
fn hoist_target(scopes: &[Scope], mut scope: ScopeId) -> ScopeId {
    loop {
        let s = &scopes[scope.index()];
        if matches!(s.kind, ScopeKind::Function | ScopeKind::Program) {
            return scope;
        }
        scope = s.parent;
    }
}

fn declare_bindings(nodes: &mut [FlatNode], scopes: &mut Vec<Scope>) {
    for i in 0..nodes.len() {
        match &nodes[i].kind {
            FlatKind::FunctionDeclaration {
                id: name,
                params,
                ..
            } => {
                let name = *name;
                let params = params.clone();
                let target = hoist_target(scopes, nodes[name.index()].scope);
                bind_name(nodes, scopes, name, target);
                for p in params {
                    let s = nodes[p.index()].scope;
                    bind_name(nodes, scopes, p, s);
                }
            }
            FlatKind::FunctionExpression { id: name, params, .. } => {
                let name = *name;
                let params = params.clone();
                if !name.is_none() {
                    let s = nodes[name.index()].scope;
                    bind_name(nodes, scopes, name, s);
                }
                for p in params {
                    let s = nodes[p.index()].scope;
                    bind_name(nodes, scopes, p, s);
                }
            }
            FlatKind::ArrowFunctionExpression { params, .. } => {
                for p in params.clone() {
                    let s = nodes[p.index()].scope;
                    bind_name(nodes, scopes, p, s);
                }
            }
            FlatKind::VariableDeclarator { id: name, .. } => {
                let name = *name;
                let decl_kind = match &nodes[nodes[i].parent.index()].kind {
                    FlatKind::VariableDeclaration { kind, .. } => *kind,
                    _ => DeclKind::Var,
                };
                let scope = match decl_kind {
                    DeclKind::Var => hoist_target(scopes, nodes[name.index()].scope),
                    DeclKind::Let | DeclKind::Const => nodes[name.index()].scope,
                };
                bind_name(nodes, scopes, name, scope);
            }
            FlatKind::CatchClause { param, .. } => {
                let param = *param;
                if !param.is_none() {
                    let s = nodes[param.index()].scope;
                    bind_name(nodes, scopes, param, s);
                }
            }
            _ => {}
        }
    }
}

fn bind_name(nodes: &mut [FlatNode], scopes: &mut [Scope], ident: NodeId, scope: ScopeId) {
    if scope.is_none() {
        return;
    }
    if let Some(name) = nodes[ident.index()].ident_name() {
        let name = name.to_string();
        scopes[scope.index()].bindings.insert(name, ident);
    }
}

fn resolve_references(nodes: &mut [FlatNode], scopes: &mut [Scope]) {
    for i in 0..nodes.len() {
        let id = NodeId(i as u32);
        if nodes[i].kind() != Kind::Identifier {
            continue;
        }
        if !is_reference_position(nodes, id) {
            continue;
        }
        let Some(name) = nodes[i].ident_name().map(str::to_owned) else {
            continue;
        };
        let start = nodes[i].scope;
        if start.is_none() {
            continue;
        }

        // Resolve up the chain.
        let mut found: Option<(NodeId, ScopeId)> = None;
        let mut scope = start;
        while !scope.is_none() {
            if let Some(&decl) = scopes[scope.index()].bindings.get(&name) {
                found = Some((decl, scope));
                break;
            }
            scope = scopes[scope.index()].parent;
        }

        match found {
            Some((decl, decl_scope)) => {
                if decl != id {
                    nodes[id.index()].decl_node = decl;
                    nodes[decl.index()].references.push(id);
                }
                // Every scope between the reference and the declaration
                // captures this name from outside.
                let mut s = start;
                while s != decl_scope {
                    scopes[s.index()].through.push(id);
                    s = scopes[s.index()].parent;
                }
            }
            None => {
                // Free/global name: captured by every enclosing scope.
                let mut s = start;
                while !s.is_none() {
                    scopes[s.index()].through.push(id);
                    s = scopes[s.index()].parent;
                }
            }
        }
    }
}

/// Whether an Identifier node reads or writes a binding, as opposed to
/// naming a property, declaration, parameter, or label.
pub(crate) fn is_reference_position(nodes: &[FlatNode], id: NodeId) -> bool {
    let node = &nodes[id.index()];
    let parent = node.parent;
    if parent.is_none() {
        return false;
    }
    let parent_node = &nodes[parent.index()];
    let key = node.parent_key;
    match &parent_node.kind {
        FlatKind::MemberExpression { computed, .. } if key == "property" => *computed,
        FlatKind::Property { computed, shorthand, .. } if key == "key" => {
            // A shorthand key doubles as its own value node; the paired
            // value identifier is the reference.
            *computed && !*shorthand
        }
        FlatKind::VariableDeclarator { .. } if key == "id" => false,
        FlatKind::FunctionDeclaration { .. } | FlatKind::FunctionExpression { .. }
            if key == "id" =>
        {
            false
        }
        FlatKind::FunctionDeclaration { .. }
        | FlatKind::FunctionExpression { .. }
        | FlatKind::ArrowFunctionExpression { .. }
            if key == "params" =>
        {
            false
        }
        FlatKind::CatchClause { .. } if key == "param" => false,
        FlatKind::LabeledStatement { .. } if key == "label" => false,
        FlatKind::BreakStatement { .. } | FlatKind::ContinueStatement { .. } if key == "label" => {
            false
        }
        _ => true,
    }
}
