use super::*;
use unweave_syntax::ast::Node;

fn arb(src: &str) -> Arborist {
    Arborist::new(src).unwrap_or_else(|e| panic!("build failed for `{src}`: {e}"))
}

#[test]
fn test_preorder_ids_are_dense_and_contiguous() {
    let arb = arb("var a = 1 + 2; function f(x) { return x; }");
    // Every node's descendants occupy (id, subtree_end).
    for i in 0..arb.nodes_len() {
        let id = NodeId(i as u32);
        let node = arb.node(id);
        assert!(node.subtree_end as usize > i);
        for (_, child) in node.children() {
            assert!(child.0 > id.0, "child ids follow the parent");
            assert!(
                child.0 < node.subtree_end,
                "children sit inside the parent's subtree range"
            );
            assert_eq!(arb.node(child).parent, id, "parent back-link");
        }
    }
}

#[test]
fn test_type_map_is_exact() {
    let arb = arb("var a = 1; var b = 2; a + b;");
    let decls = arb.nodes_of_kind(Kind::VariableDeclaration);
    assert_eq!(decls.len(), 2);
    let idents = arb.nodes_of_kind(Kind::Identifier);
    assert_eq!(idents.len(), 4, "a, b declarations plus a, b references");
    // Ascending id order.
    for pair in idents.windows(2) {
        assert!(pair[0] < pair[1]);
    }
    // Exactness: every indexed node has the kind it is indexed under.
    for (&kind, ids) in arb.type_map.iter() {
        for &id in ids {
            assert_eq!(arb.node(id).kind(), kind);
        }
    }
}

#[test]
fn test_src_slices() {
    let src = "var total = 1 + 2;";
    let arb = arb(src);
    let binary = arb.nodes_of_kind(Kind::BinaryExpression)[0];
    assert_eq!(arb.src(binary), "1 + 2");
    let decl = arb.nodes_of_kind(Kind::VariableDeclaration)[0];
    assert_eq!(arb.src(decl), src);
}

#[test]
fn test_references_and_decl_node() {
    let arb = arb("var a = 1; a; a + a;");
    let idents = arb.nodes_of_kind(Kind::Identifier);
    let decl = idents[0];
    assert_eq!(arb.node(decl).references.len(), 3, "three reads of `a`");
    for &reference in &arb.node(decl).references {
        assert_eq!(
            arb.node(reference).decl_node,
            decl,
            "reference resolves back to its declaration"
        );
    }
}

#[test]
fn test_function_scope_shadowing() {
    let arb = arb("var x = 1; function f(x) { return x; } x;");
    let idents = arb.nodes_of_kind(Kind::Identifier);
    // idents: outer x decl, f, param x, body x, trailing x.
    let outer_decl = idents[0];
    let param = idents[2];
    assert_eq!(
        arb.node(outer_decl).references.len(),
        1,
        "only the trailing x reads the outer binding"
    );
    assert_eq!(arb.node(param).references.len(), 1, "return x reads the param");
}

#[test]
fn test_member_property_is_not_a_reference() {
    let arb = arb("var a = 1; obj.a; obj[a];");
    let idents = arb.nodes_of_kind(Kind::Identifier);
    let decl = idents[0];
    // Only the computed access references the binding.
    assert_eq!(arb.node(decl).references.len(), 1);
}

#[test]
fn test_through_sets_capture_free_names() {
    let arb = arb("var a = 1; function f() { return a + b; }");
    let functions = arb.nodes_of_kind(Kind::FunctionDeclaration);
    let body = match &arb.node(functions[0]).kind {
        FlatKind::FunctionDeclaration { body, .. } => *body,
        _ => unreachable!(),
    };
    let fn_scope = arb.node(body).scope;
    let through = &arb.scope(fn_scope).through;
    let names: Vec<&str> = through
        .iter()
        .filter_map(|&id| arb.node(id).ident_name())
        .collect();
    assert!(names.contains(&"a"), "outer binding captured: {names:?}");
    assert!(names.contains(&"b"), "free global captured: {names:?}");
}

#[test]
fn test_let_is_block_scoped() {
    let arb = arb("let x = 1; { let x = 2; x; } x;");
    let idents = arb.nodes_of_kind(Kind::Identifier);
    let outer = idents[0];
    let inner = idents[1];
    assert_eq!(arb.node(outer).references.len(), 1, "trailing x");
    assert_eq!(arb.node(inner).references.len(), 1, "block-local x");
}

#[test]
fn test_mark_and_apply_changes() {
    let mut arb = arb("var a = 1 + 2;");
    let binary = arb.nodes_of_kind(Kind::BinaryExpression)[0];
    arb.mark_node(binary, Node::num_lit(3.0));
    assert!(arb.has_marks());
    assert_eq!(arb.script(), "var a = 3;");

    let changed = arb.apply_changes().expect("reparse");
    assert!(changed);
    assert!(!arb.has_marks());
    assert_eq!(arb.text(), "var a = 3;");
    assert!(arb.nodes_of_kind(Kind::BinaryExpression).is_empty());
    // Invariants hold on the rebuilt tree.
    let decl = arb.nodes_of_kind(Kind::VariableDeclarator)[0];
    assert_eq!(arb.src(decl), "a = 3");
}

#[test]
fn test_later_mark_overwrites_earlier() {
    let mut arb = arb("1 + 2;");
    let binary = arb.nodes_of_kind(Kind::BinaryExpression)[0];
    arb.mark_node(binary, Node::num_lit(99.0));
    arb.mark_node(binary, Node::num_lit(3.0));
    assert_eq!(arb.script(), "3;");
}

#[test]
fn test_outermost_mark_wins() {
    let mut arb = arb("var a = 1 + 2 * 3;");
    let add = arb.nodes_of_kind(Kind::BinaryExpression)[0];
    let mul = arb.nodes_of_kind(Kind::BinaryExpression)[1];
    arb.mark_node(mul, Node::num_lit(6.0));
    arb.mark_node(add, Node::num_lit(7.0));
    assert_eq!(arb.script(), "var a = 7;");
}

#[test]
fn test_mark_removed_takes_enclosing_statement() {
    let mut arb = arb("var a = 1;\nvar b = 2;");
    let second_decl = arb.nodes_of_kind(Kind::VariableDeclaration)[1];
    let init = match &arb.node(second_decl).kind {
        FlatKind::VariableDeclaration { declarations, .. } => declarations[0],
        _ => unreachable!(),
    };
    arb.mark_removed(init);
    arb.apply_changes().expect("reparse");
    assert_eq!(arb.text().trim(), "var a = 1;");
}

#[test]
fn test_parse_after_rewrite_keeps_previous_substrate() {
    let mut arb = arb("var a = 1;");
    let lit = arb.nodes_of_kind(Kind::Literal)[0];
    // An identifier with hostile text yields unparseable output.
    arb.mark_node(lit, Node::ident(") syntax bomb ("));
    let err = arb.apply_changes().unwrap_err();
    assert!(matches!(err, RewriteError::ParseAfterRewrite(_)));
    // Previous substrate intact, marks discarded.
    assert_eq!(arb.text(), "var a = 1;");
    assert!(!arb.has_marks());
    assert_eq!(arb.nodes_of_kind(Kind::Literal).len(), 1);
}

#[test]
fn test_print_normalises_formatting() {
    let arb = arb("function add(a,b){return a+b;}");
    assert_eq!(arb.print(), "function add(a, b) {\n  return a + b;\n}\n");
}

#[test]
fn test_print_reparses_cleanly() {
    let sources = [
        "var a = (1 + 2) * 3;",
        "if (a) { b(); } else if (c) d();",
        "var o = { a: 1, 'b c': 2, 3: [4, 5] };",
        "!function () { return 1; }();",
        "for (var i = 0; i < 10; i++) total += i;",
        "a ? b : c ? d : e;",
        "x = y = z;",
        "new Foo(bar)(1)[2].three;",
        "do x--; while (x);",
        "try { f(); } catch (e) { g(e); } finally { h(); }",
        "switch (v) {\ncase 1: a(); break;\ndefault: b();\n}",
        "label: for (;;) break label;",
        "var big = 10n; var re = /a[/]b/gi;",
    ];
    for src in sources {
        let first = arb(src).print();
        let second = arb(&first).print();
        assert_eq!(first, second, "print is stable for `{src}`");
    }
}

#[test]
fn test_number_member_access_prints_with_parens() {
    let arb = arb("var x = (5).toString();");
    let printed = arb.print();
    assert!(
        printed.contains("(5).toString"),
        "number receivers stay parenthesized: {printed}"
    );
}

#[test]
fn test_is_descendant() {
    let arb = arb("var a = 1 + 2;");
    let root = arb.root();
    let binary = arb.nodes_of_kind(Kind::BinaryExpression)[0];
    let lit = arb.nodes_of_kind(Kind::Literal)[0];
    assert!(arb.is_descendant(lit, binary));
    assert!(arb.is_descendant(binary, root));
    assert!(!arb.is_descendant(binary, lit));
}

#[test]
fn test_enclosing_statement() {
    let arb = arb("var a = 1 + 2;");
    let lit = arb.nodes_of_kind(Kind::Literal)[0];
    let stmt = arb.enclosing_statement(lit).unwrap();
    assert_eq!(arb.node(stmt).kind(), Kind::VariableDeclaration);
}
