use super::*;
use unweave_arborist::Arborist;

fn arb(src: &str) -> Arborist {
    Arborist::new(src).unwrap_or_else(|e| panic!("build failed: {e}"))
}

fn decl_parent_of(arb: &Arborist, name: &str) -> NodeId {
    for &id in arb.nodes_of_kind(Kind::Identifier) {
        if arb.node(id).ident_name() == Some(name) && !arb.node(id).references.is_empty() {
            return arb.node(id).parent;
        }
    }
    panic!("no declaration for {name}");
}

#[test]
fn test_function_context_is_the_function_itself() {
    let a = arb("function add(a, b) { return a + b; } add(1, 2);");
    let ctx = context_of(&a, decl_parent_of(&a, "add"));
    let kinds: Vec<Kind> = ctx.iter().map(|&id| a.node(id).kind()).collect();
    assert!(kinds.contains(&Kind::FunctionDeclaration));
}

#[test]
fn test_context_pulls_in_referenced_declarations() {
    let a = arb(
        "var table = ['x', 'y'];\nfunction pick(i) { return table[i]; }\npick(1);",
    );
    let ctx = context_of(&a, decl_parent_of(&a, "pick"));
    let fragment = ordered_source(&a, &ctx, false);
    assert!(
        fragment.contains("table"),
        "free variable's declaration must ride along: {fragment}"
    );
    assert!(fragment.contains("function pick"));
}

#[test]
fn test_context_collects_assignments_to_binding() {
    let a = arb("var key = 1;\nkey = 41 + 1;\nfunction get() { return key; }\nget();");
    let ctx = context_of(&a, decl_parent_of(&a, "get"));
    let fragment = ordered_source(&a, &ctx, false);
    assert!(
        fragment.contains("key = 41 + 1"),
        "direct assignment rides along: {fragment}"
    );
}

#[test]
fn test_context_collects_mutating_method_calls() {
    let a = arb(
        "var list = [];\nlist.push('a');\nfunction first() { return list[0]; }\nfirst();",
    );
    let ctx = context_of(&a, decl_parent_of(&a, "first"));
    let fragment = ordered_source(&a, &ctx, false);
    assert!(
        fragment.contains("list.push('a')"),
        "content-modifying call rides along: {fragment}"
    );
}

#[test]
fn test_context_collects_augmenting_calls() {
    let a = arb(
        "function decode(i) { return i; }\n\
         (function (f) { f.key = 1; })(decode);\n\
         decode(0);",
    );
    let ctx = context_of(&a, decl_parent_of(&a, "decode"));
    let fragment = ordered_source(&a, &ctx, false);
    assert!(
        fragment.contains("(decode)"),
        "augmenting IIFE rides along: {fragment}"
    );
}

#[test]
fn test_pure_leaves_are_filtered() {
    let a = arb("var n = 5;\nfunction f() { return n; }\nf();");
    let ctx = context_of(&a, decl_parent_of(&a, "f"));
    for &id in &ctx {
        assert!(
            !matches!(
                a.node(id).kind(),
                Kind::Literal | Kind::Identifier | Kind::MemberExpression
            ),
            "pure leaf {id} must be filtered"
        );
    }
}

#[test]
fn test_context_is_cached_by_content() {
    crate::cache::reset();
    let a = arb("function f() { return 1; } f();");
    let origin = decl_parent_of(&a, "f");
    let first = context_of(&a, origin);
    let second = context_of(&a, origin);
    assert_eq!(first, second);
}

#[test]
fn test_ordered_source_defers_iifes() {
    let a = arb(
        "var arr = [1, 2];\n(function () { arr.reverse(); })();\nfunction get(i) { return arr[i]; }",
    );
    let stmts = arb_top_statements(&a);
    let fragment = ordered_source(&a, &stmts, false);
    let iife_pos = fragment.find("reverse").expect("iife present");
    let fn_pos = fragment.find("function get").expect("decl present");
    assert!(
        fn_pos < iife_pos,
        "IIFE must be deferred to the end: {fragment}"
    );

    let preserved = ordered_source(&a, &stmts, true);
    let iife_pos = preserved.find("reverse").unwrap();
    let fn_pos = preserved.find("function get").unwrap();
    assert!(iife_pos < fn_pos, "preserve_order keeps source order");
}

#[test]
fn test_ordered_source_names_anonymous_functions() {
    let a = arb("var f = function () { return 7; };");
    let func = a.nodes_of_kind(Kind::FunctionExpression)[0];
    let fragment = ordered_source(&a, &[func], false);
    assert!(
        fragment.contains(&format!("function func{}", func.0)),
        "deterministic func<id> naming: {fragment}"
    );
}

#[test]
fn test_ordered_source_dedupes() {
    let a = arb("function f() { return 1; }");
    let func = a.nodes_of_kind(Kind::FunctionDeclaration)[0];
    let fragment = ordered_source(&a, &[func, func, func], false);
    assert_eq!(fragment.matches("function f").count(), 1);
}

fn arb_top_statements(a: &Arborist) -> Vec<NodeId> {
    let root = a.root();
    a.node(root).children().into_iter().map(|(_, id)| id).collect()
}
