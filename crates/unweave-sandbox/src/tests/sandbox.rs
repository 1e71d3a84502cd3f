use super::*;
use std::time::Duration;
use unweave_syntax::ast::{NodeKind, UnaryOp};

fn eval(src: &str) -> Option<Node> {
    let mut sandbox = Sandbox::new();
    eval_in_vm(src, &mut sandbox)
}

fn eval_expect(src: &str) -> Node {
    eval(src).unwrap_or_else(|| panic!("expected a literal result for `{src}`"))
}

#[test]
fn test_arithmetic_and_coercion() {
    assert_eq!(eval_expect("5 * 3;"), Node::num_lit(15.0));
    assert_eq!(eval_expect("'2' + 2;"), Node::str_lit("22"));
    assert_eq!(eval_expect("'10' - 1;"), Node::num_lit(9.0));
    assert_eq!(eval_expect("'o' + 'k';"), Node::str_lit("ok"));
    assert_eq!(eval_expect("'o' - 'k';"), Node::ident("NaN"));
    assert_eq!(eval_expect("3 - -1;"), Node::num_lit(4.0));
}

#[test]
fn test_negative_results_take_unary_form() {
    assert_eq!(
        eval_expect("2 - 5;"),
        Node::unary(UnaryOp::Minus, Node::num_lit(3.0))
    );
}

#[test]
fn test_jsfuck_alphabet() {
    assert_eq!(eval_expect("+[];"), Node::num_lit(0.0));
    assert_eq!(eval_expect("![];"), Node::bool_lit(false));
    assert_eq!(eval_expect("+!+[];"), Node::num_lit(1.0));
    assert_eq!(eval_expect("[]+[];"), Node::str_lit(""));
    assert_eq!(eval_expect("!{};"), Node::bool_lit(false));
}

#[test]
fn test_string_and_member_ops() {
    assert_eq!(eval_expect("'123'[0];"), Node::str_lit("1"));
    assert_eq!(eval_expect("'hello'.length;"), Node::num_lit(5.0));
    assert_eq!(eval_expect("'abc'.toUpperCase();"), Node::str_lit("ABC"));
    assert_eq!(
        eval_expect("'a-b-c'.split('-')[1];"),
        Node::str_lit("b")
    );
    assert_eq!(
        eval_expect("String.fromCharCode(104, 105);"),
        Node::str_lit("hi")
    );
}

#[test]
fn test_atob_btoa() {
    assert_eq!(eval_expect("atob('c29sdmVkIQ==');"), Node::str_lit("solved!"));
    assert_eq!(eval_expect("btoa('solved!');"), Node::str_lit("c29sdmVkIQ=="));
}

#[test]
fn test_function_call_and_closure() {
    assert_eq!(
        eval_expect("function add(a, b) { return a + b; } add(1, 2);"),
        Node::num_lit(3.0)
    );
    assert_eq!(
        eval_expect(
            "function counter() { var n = 0; return function () { return ++n; }; }\n\
             var next = counter();\nnext();\nnext();"
        ),
        Node::num_lit(2.0)
    );
}

#[test]
fn test_loops_and_arrays() {
    assert_eq!(
        eval_expect(
            "var total = 0;\nfor (var i = 1; i <= 4; i++) total += i;\ntotal;"
        ),
        Node::num_lit(10.0)
    );
    assert_eq!(
        eval_expect("[3, 1, 2].sort().join('');"),
        Node::str_lit("123")
    );
    assert_eq!(
        eval_expect("[1, 2, 3].map(function (x) { return x * 2; })[2];"),
        Node::num_lit(6.0)
    );
}

#[test]
fn test_injected_prototype_method() {
    assert_eq!(
        eval_expect(
            "String.prototype.secret = function () { return 'secret ' + this; };\n\
             'hello'.secret();"
        ),
        Node::str_lit("secret hello")
    );
}

#[test]
fn test_aliasing_is_modelled() {
    assert_eq!(
        eval_expect("var a = [1]; var b = a; b.push(2); a.length;"),
        Node::num_lit(2.0)
    );
}

#[test]
fn test_disallowed_globals_fail_closed() {
    assert!(eval("document.querySelector('div');").is_none());
    assert!(eval("fetch('https://example.com');").is_none());
    assert!(eval("Date.now();").is_none());
    assert!(eval("Math.random();").is_none());
    assert!(eval("console.log(1);").is_none());
}

#[test]
fn test_functions_are_not_literalisable() {
    assert!(eval("(function () { return 1; });").is_none());
    assert!(eval("[function () {}];").is_none());
}

#[test]
fn test_cyclic_structures_fail_closed() {
    assert!(eval("var a = []; a[0] = a; a;").is_none());
    assert!(eval("var o = {}; o.self = o; o;").is_none());
}

#[test]
fn test_thrown_values_fail_closed() {
    assert!(eval("throw 'nope';").is_none());
    assert!(eval("null.x;").is_none());
    assert!(eval("missingFunction();").is_none());
}

#[test]
fn test_try_catch_recovers() {
    assert_eq!(
        eval_expect("var r; try { null.x; } catch (e) { r = 'caught'; } r;"),
        Node::str_lit("caught")
    );
}

#[test]
fn test_fuel_budget_stops_infinite_loops() {
    let mut sandbox = Sandbox::with_budget(Budget {
        wall: Duration::from_millis(200),
        fuel: 100_000,
    });
    assert!(eval_in_vm("while (true) {}", &mut sandbox).is_none());
    // The sandbox stays usable after a budget abort.
    assert_eq!(eval_in_vm("1 + 1;", &mut sandbox), Some(Node::num_lit(2.0)));
}

#[test]
fn test_shared_sandbox_stays_warm() {
    let mut sandbox = Sandbox::new();
    assert!(eval_in_vm("function dbl(x) { return x * 2; } dbl(2);", &mut sandbox).is_some());
    assert_eq!(eval_in_vm("dbl(21);", &mut sandbox), Some(Node::num_lit(42.0)));
}

#[test]
fn test_literalisation_rules() {
    // undefined / null / booleans
    assert_eq!(eval_expect("undefined;"), Node::ident("undefined"));
    assert_eq!(
        eval_expect("null;"),
        Node::synth(NodeKind::Literal {
            value: unweave_syntax::ast::Lit::Null
        })
    );
    // -0 keeps its sign
    assert_eq!(
        eval_expect("-0;"),
        Node::unary(UnaryOp::Minus, Node::num_lit(0.0))
    );
    // infinities
    assert_eq!(eval_expect("1 / 0;"), Node::ident("Infinity"));
    assert_eq!(
        eval_expect("-1 / 0;"),
        Node::unary(UnaryOp::Minus, Node::ident("Infinity"))
    );
    // arrays and objects of literals
    assert_eq!(
        eval_expect("[1, 'a'];"),
        Node::synth(NodeKind::ArrayExpression {
            elements: vec![Some(Node::num_lit(1.0)), Some(Node::str_lit("a"))],
        })
    );
    // bigint
    assert_eq!(
        eval_expect("2n ** 10n;"),
        Node::synth(NodeKind::BigIntLiteral {
            text: "1024".to_string()
        })
    );
    // symbols literalise as a Symbol() call
    assert_eq!(
        eval_expect("Symbol('tag');"),
        Node::call(Node::ident("Symbol"), vec![Node::str_lit("tag")])
    );
}

#[test]
fn test_number_round_trip() {
    // Finite primitives survive print-and-reevaluate.
    for src in ["0.1 + 0.2;", "1e21;", "123456789;", "0.5;"] {
        let first = eval_expect(src);
        let NodeKind::Literal { .. } = &first.kind else {
            panic!("expected a literal for {src}");
        };
    }
}

#[test]
fn test_parse_int_and_radix() {
    assert_eq!(eval_expect("parseInt('42px');"), Node::num_lit(42.0));
    assert_eq!(eval_expect("parseInt('ff', 16);"), Node::num_lit(255.0));
    assert_eq!(eval_expect("parseInt('0x10');"), Node::num_lit(16.0));
    assert_eq!(eval_expect("(255).toString(16);"), Node::str_lit("ff"));
    assert_eq!(eval_expect("(35).toString(36);"), Node::str_lit("z"));
}

#[test]
fn test_json_builtins() {
    assert_eq!(
        eval_expect("JSON.parse('[1,2]')[1];"),
        Node::num_lit(2.0)
    );
    assert_eq!(
        eval_expect("JSON.stringify({ a: 1 });"),
        Node::str_lit("{\"a\":1}")
    );
}

#[test]
fn test_regex_execution_fails_closed() {
    assert!(eval("'aaa'.replace(/a/g, 'b');").is_none());
    assert!(eval("/x/.test('x');").is_none());
}
