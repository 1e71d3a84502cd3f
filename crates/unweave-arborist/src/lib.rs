//! The tree substrate the rewrite passes operate on.
//!
//! An `Arborist` owns the current source text, a flat pre-order node arena
//! with scope/reference metadata, a type index, and the set of staged marks.
//! Rewrites are staged with `mark_node`/`mark_removed` and committed with
//! `apply_changes`, which splices the printed replacements over their byte
//! ranges and reparses — so every derived invariant is rebuilt from scratch
//! rather than patched.

pub mod binder;
pub mod build;
pub mod node;
pub mod printer;

pub use node::{FlatKind, FlatNode, NodeId, Scope, ScopeId, ScopeKind};

use build::Flattener;
use printer::Printer;
use rustc_hash::FxHashMap;
use tracing::debug;
use unweave_common::{Fingerprint, ParseError, RewriteError, Span};
use unweave_syntax::ast::{self, Kind};

/// A staged replacement for one node.
#[derive(Clone, Debug)]
enum Mark {
    /// Replace the node with an appended subtree (root id into the arena).
    Replace(NodeId),
    /// Remove the enclosing statement.
    Remove,
}

pub struct Arborist {
    text: String,
    nodes: Vec<FlatNode>,
    scopes: Vec<Scope>,
    type_map: FxHashMap<Kind, Vec<NodeId>>,
    marks: FxHashMap<NodeId, Mark>,
    /// Arena length before any replacement subtrees were appended; rollback
    /// truncates back to this.
    pristine_len: usize,
}

impl Arborist {
    /// Parse and build: pre-order ids, parent/scope/reference links, type
    /// index.
    pub fn new(text: &str) -> Result<Arborist, ParseError> {
        let program = unweave_syntax::parse(text)?;
        Ok(Arborist::from_parsed(text.to_string(), program))
    }

    fn from_parsed(text: String, program: ast::Program) -> Arborist {
        let mut nodes = Vec::new();
        Flattener { nodes: &mut nodes }.flatten(program.root, NodeId::NONE, "");
        let mut scopes = Vec::new();
        binder::bind(&mut nodes, &mut scopes);

        let mut type_map: FxHashMap<Kind, Vec<NodeId>> = FxHashMap::default();
        for (i, node) in nodes.iter().enumerate() {
            type_map.entry(node.kind()).or_default().push(NodeId(i as u32));
        }

        let pristine_len = nodes.len();
        Arborist {
            text,
            nodes,
            scopes,
            type_map,
            marks: FxHashMap::default(),
            pristine_len,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.text)
    }

    pub fn node(&self, id: NodeId) -> &FlatNode {
        &self.nodes[id.index()]
    }

    pub fn nodes_len(&self) -> usize {
        self.nodes.len()
    }

    /// Verbatim source slice of a node.
    pub fn src(&self, id: NodeId) -> &str {
        self.nodes[id.index()].span.slice(&self.text)
    }

    /// All current nodes of a kind, in ascending (pre-order) id order.
    pub fn nodes_of_kind(&self, kind: Kind) -> &[NodeId] {
        self.type_map.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    /// True when `ancestor`'s subtree contains `id` (pre-order contiguity).
    pub fn is_descendant(&self, id: NodeId, ancestor: NodeId) -> bool {
        ancestor.0 < id.0 && id.0 < self.nodes[ancestor.index()].subtree_end
    }

    /// Nearest enclosing statement, the node itself included.
    pub fn enclosing_statement(&self, mut id: NodeId) -> Option<NodeId> {
        loop {
            let node = &self.nodes[id.index()];
            if node.is_statement() {
                return Some(id);
            }
            if node.parent.is_none() {
                return None;
            }
            id = node.parent;
        }
    }

    /// Rebuild a recursive AST node from a flat subtree (for passes that
    /// assemble replacements around existing nodes).
    pub fn to_ast(&self, id: NodeId) -> ast::Node {
        build::to_ast(&self.nodes, id)
    }

    /// Print one node (statement or expression) in isolation.
    pub fn print_node(&self, id: NodeId) -> String {
        let mut printer = Printer::new(&self.nodes);
        printer.print_any(id);
        printer.finish()
    }

    /// Full pretty-print of the current (uncommitted) tree.
    pub fn print(&self) -> String {
        let mut printer = Printer::new(&self.nodes);
        printer.print_program(self.root());
        printer.finish()
    }

    // =========================================================================
    // Marks
    // =========================================================================

    /// Stage a replacement. A later mark on the same node overwrites an
    /// earlier one.
    pub fn mark_node(&mut self, target: NodeId, replacement: ast::Node) {
        let root = Flattener {
            nodes: &mut self.nodes,
        }
        .flatten(replacement, NodeId::NONE, "");
        self.marks.insert(target, Mark::Replace(root));
    }

    /// Stage removal of the statement enclosing `target`.
    pub fn mark_removed(&mut self, target: NodeId) {
        self.marks.insert(target, Mark::Remove);
    }

    pub fn has_marks(&self) -> bool {
        !self.marks.is_empty()
    }

    /// Whether this node (or an ancestor) is staged for removal.
    pub fn is_marked_for_deletion(&self, id: NodeId) -> bool {
        self.marks.iter().any(|(&target, mark)| {
            matches!(mark, Mark::Remove)
                && self
                    .enclosing_statement(target)
                    .is_some_and(|stmt| stmt == id || self.is_descendant(id, stmt))
        })
    }

    /// Whether this node is itself marked, or sits inside a marked subtree.
    pub fn is_marked(&self, id: NodeId) -> bool {
        self.marks
            .keys()
            .any(|&target| target == id || self.is_descendant(id, target))
    }

    /// Source of the current tree with pending marks spliced in (without
    /// committing).
    pub fn script(&self) -> String {
        if self.marks.is_empty() {
            return self.text.clone();
        }
        self.splice()
    }

    /// Commit marks: splice, reparse, rebuild all metadata. Returns whether
    /// the source changed. On reparse failure the previous substrate stays
    /// valid and marks are discarded.
    pub fn apply_changes(&mut self) -> Result<bool, RewriteError> {
        if self.marks.is_empty() {
            return Ok(false);
        }
        let source = self.splice();
        let changed = source != self.text;
        match unweave_syntax::parse(&source) {
            Ok(program) => {
                *self = Arborist::from_parsed(source, program);
                Ok(changed)
            }
            Err(err) => {
                debug!(
                    spliced_len = source.len(),
                    error = %err,
                    "rewritten source failed to reparse; dropping staged marks"
                );
                self.marks.clear();
                self.nodes.truncate(self.pristine_len);
                Err(RewriteError::ParseAfterRewrite(err))
            }
        }
    }

    // =========================================================================
    // Splicing
    // =========================================================================

    fn splice(&self) -> String {
        // Resolve each mark to a (span, replacement text) edit.
        let mut edits: Vec<(Span, String)> = Vec::with_capacity(self.marks.len());
        for (&target, mark) in &self.marks {
            match mark {
                Mark::Replace(root) => {
                    let span = self.nodes[target.index()].span;
                    if span.is_dummy() {
                        continue;
                    }
                    let mut text = self.print_node(*root);
                    if self.replacement_needs_parens(target, *root) {
                        text = format!("({text})");
                    }
                    edits.push((span, text));
                }
                Mark::Remove => {
                    if let Some(stmt) = self.enclosing_statement(target) {
                        let span = self.nodes[stmt.index()].span;
                        if !span.is_dummy() {
                            edits.push((span, String::new()));
                        }
                    }
                }
            }
        }

        // Outermost-first: sort by start ascending, longest span first at
        // ties; drop edits nested inside an already-kept one.
        edits.sort_by(|a, b| a.0.start.cmp(&b.0.start).then(b.0.end.cmp(&a.0.end)));
        let mut out = String::with_capacity(self.text.len());
        let mut pos: u32 = 0;
        for (span, replacement) in edits {
            if span.start < pos {
                continue; // shadowed by an enclosing edit
            }
            out.push_str(Span::new(pos, span.start).slice(&self.text));
            out.push_str(&replacement);
            pos = span.end;
        }
        out.push_str(Span::new(pos, self.text.len() as u32).slice(&self.text));
        out
    }

    /// Conservative parenthesization when a printed replacement lands in a
    /// syntactic slot that binds tighter than the replacement's own form.
    fn replacement_needs_parens(&self, target: NodeId, root: NodeId) -> bool {
        let repl = &self.nodes[root.index()];
        if repl.is_statement() || repl.kind() == Kind::Program {
            return false;
        }
        let fragile = matches!(
            repl.kind(),
            Kind::SequenceExpression
                | Kind::AssignmentExpression
                | Kind::ConditionalExpression
                | Kind::BinaryExpression
                | Kind::LogicalExpression
                | Kind::ArrowFunctionExpression
                | Kind::FunctionExpression
                | Kind::ObjectExpression
                | Kind::UnaryExpression
        );
        if !fragile {
            return false;
        }
        let parent = self.nodes[target.index()].parent;
        if parent.is_none() {
            return false;
        }
        let parent_key = self.nodes[target.index()].parent_key;
        match self.nodes[parent.index()].kind() {
            Kind::MemberExpression => parent_key == "object",
            Kind::CallExpression | Kind::NewExpression => parent_key == "callee",
            Kind::UnaryExpression
            | Kind::UpdateExpression
            | Kind::BinaryExpression
            | Kind::LogicalExpression => true,
            Kind::ConditionalExpression => parent_key == "test",
            Kind::ExpressionStatement => matches!(
                repl.kind(),
                Kind::FunctionExpression | Kind::ObjectExpression | Kind::SequenceExpression
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "tests/arborist.rs"]
mod tests;
