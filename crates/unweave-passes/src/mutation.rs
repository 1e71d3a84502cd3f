//! Reference-mutation analyzer.
//!
//! Decides whether any reference to a binding ever mutates it: assignment
//! target, update operand, delete operand, loop target, property assignment
//! through the binding, or a mutating method called on it. Passes that
//! inline bindings consult this before substituting.

use unweave_arborist::{Arborist, FlatKind, NodeId};
use unweave_syntax::ast::{Kind, UnaryOp};

/// Property names whose invocation (or assignment) modifies the receiver's
/// contents.
pub const MUTATING_PROPERTIES: &[&str] = &[
    "push",
    "pop",
    "shift",
    "unshift",
    "splice",
    "sort",
    "reverse",
    "fill",
    "copyWithin",
    "forEach",
    "insert",
    "add",
    "set",
    "delete",
];

/// Whether any reference to the declaring Identifier `decl` mutates the
/// binding or its contents.
pub fn is_mutated(arb: &Arborist, decl: NodeId) -> bool {
    arb.node(decl)
        .references
        .iter()
        .any(|&reference| reference_mutates(arb, reference))
}

/// Whether this particular reference site is a mutation.
pub fn reference_mutates(arb: &Arborist, reference: NodeId) -> bool {
    let node = arb.node(reference);
    let parent = node.parent;
    if parent.is_none() {
        return false;
    }
    let key = node.parent_key;
    match &arb.node(parent).kind {
        FlatKind::AssignmentExpression { .. } if key == "left" => true,
        FlatKind::UpdateExpression { .. } => true,
        FlatKind::UnaryExpression {
            op: UnaryOp::Delete,
            ..
        } => true,
        FlatKind::ForInStatement { .. } | FlatKind::ForOfStatement { .. } if key == "left" => true,
        FlatKind::MemberExpression { property, computed, .. } if key == "object" => {
            // `x.prop = …` (or a longer member chain ending in an
            // assignment target).
            if is_assignment_target(arb, parent) {
                return true;
            }
            // `delete x.prop`
            if member_under_delete(arb, parent) {
                return true;
            }
            // `x.push(…)` and friends.
            if !computed {
                if let Some(name) = arb.node(*property).ident_name() {
                    if MUTATING_PROPERTIES.contains(&name) && is_callee(arb, parent) {
                        return true;
                    }
                }
            }
            false
        }
        _ => false,
    }
}

/// Walk member chains upward: is this expression (or a member access rooted
/// at it) the left side of an assignment?
fn is_assignment_target(arb: &Arborist, mut id: NodeId) -> bool {
    loop {
        let node = arb.node(id);
        let parent = node.parent;
        if parent.is_none() {
            return false;
        }
        match arb.node(parent).kind() {
            Kind::AssignmentExpression if node.parent_key == "left" => return true,
            Kind::MemberExpression if node.parent_key == "object" => id = parent,
            _ => return false,
        }
    }
}

fn member_under_delete(arb: &Arborist, member: NodeId) -> bool {
    let parent = arb.node(member).parent;
    if parent.is_none() {
        return false;
    }
    matches!(
        &arb.node(parent).kind,
        FlatKind::UnaryExpression {
            op: UnaryOp::Delete,
            ..
        }
    )
}

fn is_callee(arb: &Arborist, id: NodeId) -> bool {
    let node = arb.node(id);
    let parent = node.parent;
    if parent.is_none() {
        return false;
    }
    node.parent_key == "callee" && arb.node(parent).kind() == Kind::CallExpression
}

#[cfg(test)]
mod tests {
    use super::*;
    use unweave_arborist::Arborist;

    fn first_decl(arb: &Arborist) -> NodeId {
        arb.nodes_of_kind(Kind::Identifier)[0]
    }

    #[test]
    fn test_untouched_binding_is_not_mutated() {
        let arb = Arborist::new("var a = [1]; a; a.length; b(a[0]);").unwrap();
        assert!(!is_mutated(&arb, first_decl(&arb)));
    }

    #[test]
    fn test_direct_assignment_is_mutation() {
        let arb = Arborist::new("var a = 1; a = 2;").unwrap();
        assert!(is_mutated(&arb, first_decl(&arb)));
    }

    #[test]
    fn test_update_expression_is_mutation() {
        let arb = Arborist::new("var a = 1; a++;").unwrap();
        assert!(is_mutated(&arb, first_decl(&arb)));
    }

    #[test]
    fn test_property_assignment_is_mutation() {
        let arb = Arborist::new("var a = {}; a.x = 1;").unwrap();
        assert!(is_mutated(&arb, first_decl(&arb)));
        let arb = Arborist::new("var a = {}; a.b.c = 1;").unwrap();
        assert!(is_mutated(&arb, first_decl(&arb)));
    }

    #[test]
    fn test_mutating_method_is_mutation() {
        let arb = Arborist::new("var a = []; a.push(1);").unwrap();
        assert!(is_mutated(&arb, first_decl(&arb)));
        let arb = Arborist::new("var a = []; a.sort();").unwrap();
        assert!(is_mutated(&arb, first_decl(&arb)));
    }

    #[test]
    fn test_non_mutating_method_is_not_mutation() {
        let arb = Arborist::new("var a = []; a.join(',');").unwrap();
        assert!(!is_mutated(&arb, first_decl(&arb)));
        let arb = Arborist::new("var a = []; a.slice(0);").unwrap();
        assert!(!is_mutated(&arb, first_decl(&arb)));
    }

    #[test]
    fn test_delete_is_mutation() {
        let arb = Arborist::new("var a = { x: 1 }; delete a.x;").unwrap();
        assert!(is_mutated(&arb, first_decl(&arb)));
    }

    #[test]
    fn test_loop_target_is_mutation() {
        let arb = Arborist::new("var a; for (a in obj) {}").unwrap();
        assert!(is_mutated(&arb, first_decl(&arb)));
    }
}
