use super::*;
use crate::ast::Kind;

fn parse_ok(src: &str) -> Program {
    parse(src).unwrap_or_else(|e| panic!("parse failed for `{src}`: {e}"))
}

fn first_stmt(program: &Program) -> &Node {
    match &program.root.kind {
        NodeKind::Program { body } => body.first().expect("empty program"),
        _ => unreachable!(),
    }
}

fn first_expr(program: &Program) -> &Node {
    match &first_stmt(program).kind {
        NodeKind::ExpressionStatement { expression } => expression,
        other => panic!("expected expression statement, got {other:?}"),
    }
}

#[test]
fn test_precedence() {
    let program = parse_ok("1 + 2 * 3;");
    let NodeKind::BinaryExpression { op, right, .. } = &first_expr(&program).kind else {
        panic!("expected binary expression");
    };
    assert_eq!(*op, BinaryOp::Add);
    assert_eq!(right.kind(), Kind::BinaryExpression, "* binds tighter than +");
}

#[test]
fn test_exponent_right_assoc() {
    let program = parse_ok("2 ** 3 ** 2;");
    let NodeKind::BinaryExpression { op, right, .. } = &first_expr(&program).kind else {
        panic!("expected binary expression");
    };
    assert_eq!(*op, BinaryOp::Exp);
    assert_eq!(right.kind(), Kind::BinaryExpression);
}

#[test]
fn test_logical_vs_binary() {
    let program = parse_ok("a || b && c;");
    let NodeKind::LogicalExpression { op, .. } = &first_expr(&program).kind else {
        panic!("expected logical expression");
    };
    assert_eq!(*op, LogicalOp::Or);
}

#[test]
fn test_member_call_chain() {
    let program = parse_ok("a.b['c'](1, 2);");
    let NodeKind::CallExpression { callee, arguments } = &first_expr(&program).kind else {
        panic!("expected call");
    };
    assert_eq!(arguments.len(), 2);
    let NodeKind::MemberExpression { computed, object, .. } = &callee.kind else {
        panic!("expected member callee");
    };
    assert!(*computed);
    assert_eq!(object.kind(), Kind::MemberExpression);
}

#[test]
fn test_keyword_property_name() {
    let program = parse_ok("a.delete;");
    let NodeKind::MemberExpression { property, .. } = &first_expr(&program).kind else {
        panic!("expected member expression");
    };
    assert_eq!(property.ident_name(), Some("delete"));
}

#[test]
fn test_conditional() {
    let program = parse_ok("a ? b : c;");
    assert_eq!(first_expr(&program).kind(), Kind::ConditionalExpression);
}

#[test]
fn test_sequence() {
    let program = parse_ok("a, b, c;");
    let NodeKind::SequenceExpression { expressions } = &first_expr(&program).kind else {
        panic!("expected sequence");
    };
    assert_eq!(expressions.len(), 3);
}

#[test]
fn test_var_declaration() {
    let program = parse_ok("var a = 1, b;");
    let NodeKind::VariableDeclaration { kind, declarations } = &first_stmt(&program).kind else {
        panic!("expected variable declaration");
    };
    assert_eq!(*kind, DeclKind::Var);
    assert_eq!(declarations.len(), 2);
    let NodeKind::VariableDeclarator { init, .. } = &declarations[1].kind else {
        panic!();
    };
    assert!(init.is_none());
}

#[test]
fn test_function_declaration() {
    let program = parse_ok("function add(a, b) { return a + b; }");
    let NodeKind::FunctionDeclaration { id, params, .. } = &first_stmt(&program).kind else {
        panic!("expected function declaration");
    };
    assert_eq!(id.ident_name(), Some("add"));
    assert_eq!(params.len(), 2);
}

#[test]
fn test_function_expression_and_iife() {
    let program = parse_ok("(function () { return 1; })();");
    let NodeKind::CallExpression { callee, .. } = &first_expr(&program).kind else {
        panic!("expected call");
    };
    assert_eq!(callee.kind(), Kind::FunctionExpression);
}

#[test]
fn test_bang_iife() {
    let program = parse_ok("!function () { return 1; }();");
    let NodeKind::UnaryExpression { op, argument } = &first_expr(&program).kind else {
        panic!("expected unary");
    };
    assert_eq!(*op, UnaryOp::Not);
    assert_eq!(argument.kind(), Kind::CallExpression);
}

#[test]
fn test_arrow_functions() {
    let program = parse_ok("var f = (a, b) => a + b;");
    let NodeKind::VariableDeclaration { declarations, .. } = &first_stmt(&program).kind else {
        panic!();
    };
    let NodeKind::VariableDeclarator { init, .. } = &declarations[0].kind else {
        panic!();
    };
    let NodeKind::ArrowFunctionExpression { params, expression, .. } =
        &init.as_ref().unwrap().kind
    else {
        panic!("expected arrow function");
    };
    assert_eq!(params.len(), 2);
    assert!(*expression);

    parse_ok("var g = () => { return 1; };");
    parse_ok("var h = x => x * 2;");
}

#[test]
fn test_for_variants() {
    assert_eq!(
        first_stmt(&parse_ok("for (var i = 0; i < 10; i++) {}")).kind(),
        Kind::ForStatement
    );
    assert_eq!(
        first_stmt(&parse_ok("for (var k in obj) {}")).kind(),
        Kind::ForInStatement
    );
    assert_eq!(
        first_stmt(&parse_ok("for (var v of list) {}")).kind(),
        Kind::ForOfStatement
    );
    assert_eq!(first_stmt(&parse_ok("for (;;) break;")).kind(), Kind::ForStatement);
}

#[test]
fn test_in_operator_inside_for_parens() {
    // `in` as a binary operator is still fine outside a bare for-head.
    let program = parse_ok("for (var i = ('a' in obj) ? 0 : 1; i < 2; i++) {}");
    assert_eq!(first_stmt(&program).kind(), Kind::ForStatement);
}

#[test]
fn test_object_literal_forms() {
    let program = parse_ok("var o = { a: 1, 'b': 2, 3: 'c', d, e() { return 1; } };");
    let NodeKind::VariableDeclaration { declarations, .. } = &first_stmt(&program).kind else {
        panic!();
    };
    let NodeKind::VariableDeclarator { init, .. } = &declarations[0].kind else {
        panic!();
    };
    let NodeKind::ObjectExpression { properties } = &init.as_ref().unwrap().kind else {
        panic!("expected object literal");
    };
    assert_eq!(properties.len(), 5);
    let NodeKind::Property { shorthand, .. } = &properties[3].kind else {
        panic!();
    };
    assert!(shorthand);
}

#[test]
fn test_getter_and_get_as_key() {
    let program = parse_ok("var o = { get x() { return 1; }, get: 2 };");
    let NodeKind::VariableDeclaration { declarations, .. } = &first_stmt(&program).kind else {
        panic!();
    };
    let NodeKind::VariableDeclarator { init, .. } = &declarations[0].kind else {
        panic!();
    };
    let NodeKind::ObjectExpression { properties } = &init.as_ref().unwrap().kind else {
        panic!();
    };
    let NodeKind::Property { kind, .. } = &properties[0].kind else { panic!() };
    assert_eq!(*kind, PropertyKind::Get);
    let NodeKind::Property { kind, key, .. } = &properties[1].kind else { panic!() };
    assert_eq!(*kind, PropertyKind::Init);
    assert_eq!(key.ident_name(), Some("get"));
}

#[test]
fn test_array_with_elisions() {
    let program = parse_ok("[1, , 3];");
    let NodeKind::ArrayExpression { elements } = &first_expr(&program).kind else {
        panic!();
    };
    assert_eq!(elements.len(), 3);
    assert!(elements[1].is_none());
}

#[test]
fn test_new_expression() {
    let program = parse_ok("new Foo.Bar(1);");
    let NodeKind::NewExpression { callee, arguments } = &first_expr(&program).kind else {
        panic!("expected new expression");
    };
    assert_eq!(callee.kind(), Kind::MemberExpression);
    assert_eq!(arguments.len(), 1);

    let program = parse_ok("new Date;");
    let NodeKind::NewExpression { arguments, .. } = &first_expr(&program).kind else {
        panic!();
    };
    assert!(arguments.is_empty());
}

#[test]
fn test_asi() {
    // No semicolons, separated by newlines.
    let program = parse_ok("var a = 1\nvar b = 2\na + b");
    let NodeKind::Program { body } = &program.root.kind else { unreachable!() };
    assert_eq!(body.len(), 3);
}

#[test]
fn test_labeled_statement() {
    let program = parse_ok("outer: for (;;) { break outer; }");
    assert_eq!(first_stmt(&program).kind(), Kind::LabeledStatement);
}

#[test]
fn test_try_catch_finally() {
    let program = parse_ok("try { a(); } catch (e) { b(); } finally { c(); }");
    let NodeKind::TryStatement { handler, finalizer, .. } = &first_stmt(&program).kind else {
        panic!();
    };
    assert!(handler.is_some());
    assert!(finalizer.is_some());
}

#[test]
fn test_switch() {
    let program = parse_ok("switch (x) { case 1: a(); break; default: b(); }");
    let NodeKind::SwitchStatement { cases, .. } = &first_stmt(&program).kind else {
        panic!();
    };
    assert_eq!(cases.len(), 2);
}

#[test]
fn test_update_expressions() {
    let program = parse_ok("i++; --j;");
    let NodeKind::Program { body } = &program.root.kind else { unreachable!() };
    let NodeKind::ExpressionStatement { expression } = &body[0].kind else { panic!() };
    let NodeKind::UpdateExpression { prefix, .. } = &expression.kind else { panic!() };
    assert!(!prefix);
    let NodeKind::ExpressionStatement { expression } = &body[1].kind else { panic!() };
    let NodeKind::UpdateExpression { prefix, .. } = &expression.kind else { panic!() };
    assert!(prefix);
}

#[test]
fn test_jsfuck_alphabet_parses() {
    for src in ["+[];", "![];", "+!+[];", "[]+[];", "++[[]][0];"] {
        parse_ok(src);
    }
}

#[test]
fn test_parse_errors() {
    assert!(parse("var = 1;").is_err());
    assert!(parse("function () {}").is_err(), "declaration needs a name");
    assert!(parse("{").is_err());
    assert!(parse("a +").is_err());
}

#[test]
fn test_spans_cover_source() {
    let src = "var a = 1;";
    let program = parse_ok(src);
    let stmt = first_stmt(&program);
    assert_eq!(stmt.span.slice(src), "var a = 1;");
}
