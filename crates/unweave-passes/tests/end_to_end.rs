//! End-to-end pipeline scenarios: obfuscated input in, readable source out.

use unweave_passes::{deobfuscate, Config};

fn run(source: &str) -> String {
    deobfuscate(source, &Config::default()).expect("pipeline should succeed")
}

fn run_clean(source: &str) -> String {
    deobfuscate(
        source,
        &Config {
            clean: true,
            ..Config::default()
        },
    )
    .expect("pipeline should succeed")
}

#[test]
fn test_not_operator_folding() {
    let out = run("!true || !false || !0 || !1 || !a || !'a' || ![] || !{} || !-1 || !!true || !!!true");
    assert_eq!(
        out.trim_end(),
        "false || true || true || false || !a || false || false || false || false || true || false;"
    );
}

#[test]
fn test_builtin_folding() {
    assert_eq!(run("atob('c29sdmVkIQ==');").trim_end(), "'solved!';");
}

#[test]
fn test_binary_folding_with_coercion() {
    let out = run("5 * 3; '2' + 2; '10' - 1; 'o' + 'k'; 'o' - 'k'; 3 - -1;");
    assert_eq!(out.trim_end(), "15;\n'22';\n9;\n'ok';\nNaN;\n4;");
}

#[test]
fn test_member_literal_folding() {
    let out = run("'123'[0]; 'hello'.length;");
    assert_eq!(out.trim_end(), "'1';\n5;");
}

#[test]
fn test_local_call_inlining() {
    let out = run("function add(a,b){return a+b;} add(1,2);");
    assert_eq!(
        out.trim_end(),
        "function add(a, b) {\n  return a + b;\n}\n3;"
    );
}

#[test]
fn test_prototype_injection_folding() {
    let out = run(
        "String.prototype.secret = function(){return 'secret ' + this;}; 'hello'.secret();",
    );
    assert_eq!(
        out.trim_end(),
        "String.prototype.secret = function () {\n  return 'secret ' + this;\n};\n'secret hello';"
    );
}

#[test]
fn test_local_object_method_inlining() {
    let out = run(
        "var calc = { add: function (a, b) { return a + b; } };\ncalc.add(2, 3);",
    );
    assert!(
        out.contains("5;"),
        "object-literal method call resolves: {out}"
    );
}

#[test]
fn test_inline_object_method_call() {
    let out = run("({ mul: function (a, b) { return a * b; } }).mul(3, 4);");
    assert!(
        out.contains("12;"),
        "inline literal receiver resolves: {out}"
    );
}

#[test]
fn test_bigint_literal_ternary_folding() {
    let out = run("0n ? a() : b(); 5n ? c() : d();");
    assert_eq!(out.trim_end(), "b();\nc();", "0n is falsy, 5n is truthy");
}

#[test]
fn test_function_to_array() {
    let out = run("function box() { return ['a', 'b']; } box()[1];");
    assert!(
        out.contains("'b';"),
        "array call resolves through to the element: {out}"
    );
}

#[test]
fn test_function_to_array_with_opaque_elements() {
    // The sandbox cannot evaluate free names, but the array shape itself is
    // still safe to inline.
    let out = run("function box() { return [foo, bar]; } box()[0];");
    assert!(
        out.contains("[foo, bar][0];"),
        "call collapses to the array literal: {out}"
    );
}

#[test]
fn test_string_array_decoder_pipeline() {
    // The classic obfuscator shape: a string table behind a decoder.
    let out = run(
        "function words() { return ['log', 'hello world']; }\n\
         function pick(i) { return words()[i]; }\n\
         var msg = pick(1);",
    );
    assert!(
        out.contains("'hello world'"),
        "decoder call sites must resolve: {out}"
    );
}

#[test]
fn test_augmented_decoder_with_permuting_iife() {
    let out = run(
        "function table() { return ['b', 'a']; }\n\
         var cache = table();\n\
         (function (arr) { arr.reverse(); })(cache);\n\
         function decode(i) { return cache[i]; }\n\
         decode(0);",
    );
    assert!(
        out.contains("'a';"),
        "the deferred IIFE's permutation must be visible to the decoder: {out}"
    );
}

#[test]
fn test_reassigned_decoder_uses_final_binding() {
    // resolveLocalCalls refuses mutated bindings; the augmented-function
    // pass picks them up with the reassignment in context.
    let out = run(
        "function decode(i) { return i; }\n\
         decode = function (i) { return i + 1; };\n\
         decode(1);",
    );
    assert!(out.contains("2;"), "call sees the rewritten binding: {out}");
}

#[test]
fn test_eval_on_non_literal() {
    let out = run("var code = '1 + ' + '2'; eval(code);");
    assert!(out.contains("3;"), "eval payload folds to code: {out}");
}

#[test]
fn test_fixed_assigned_value_inlining() {
    let out = run("var k = 3; var r = k * 2;");
    assert!(out.contains("6"), "literal binding feeds the fold: {out}");
}

#[test]
fn test_sequence_splitting() {
    let out = run("a(), b();");
    assert_eq!(out.trim_end(), "a();\nb();");
}

#[test]
fn test_computed_access_normalisation() {
    let out = run("win['open']();");
    assert_eq!(out.trim_end(), "win.open();");
}

#[test]
fn test_empty_statement_removal() {
    let out = run(";;var a = f();;");
    assert_eq!(out.trim_end(), "var a = f();");
}

// -----------------------------------------------------------------------------
// Negative scenarios: semantically opaque inputs come back unchanged
// (modulo reprinting).
// -----------------------------------------------------------------------------

#[test]
fn test_free_names_are_not_folded() {
    let out = run("!variable || !obj.prop || !func();");
    assert_eq!(out.trim_end(), "!variable || !obj.prop || !func();");
}

#[test]
fn test_host_calls_are_untouched() {
    let out = run("document.querySelector('div');");
    assert_eq!(out.trim_end(), "document.querySelector('div');");
}

#[test]
fn test_shadowed_builtin_is_refused() {
    let out = run("function atob(){return 1;} atob('test');");
    assert_eq!(
        out.trim_end(),
        "function atob() {\n  return 1;\n}\natob('test');"
    );
}

#[test]
fn test_dynamic_index_is_untouched() {
    let out = run("'test'[getValue()];");
    assert_eq!(out.trim_end(), "'test'[getValue()];");
}

#[test]
fn test_impure_operand_is_untouched() {
    let out = run("foo() + 5;");
    assert_eq!(out.trim_end(), "foo() + 5;");
}

#[test]
fn test_update_on_alphabet_is_untouched() {
    let out = run("++[[]][0];");
    assert_eq!(out.trim_end(), "++[[]][0];");
}

#[test]
fn test_out_of_bounds_string_index_is_untouched() {
    let out = run("'abc'[10];");
    assert_eq!(out.trim_end(), "'abc'[10];");
}

// -----------------------------------------------------------------------------
// Orchestrator behavior
// -----------------------------------------------------------------------------

#[test]
fn test_zero_iterations_reprints_only() {
    let out = deobfuscate(
        "1 + 2;",
        &Config {
            max_iterations: 0,
            clean: false,
        },
    )
    .unwrap();
    assert_eq!(out.trim_end(), "1 + 2;", "no iterations, no folding");
}

#[test]
fn test_iteration_cap_bounds_work() {
    // One iteration folds the inner binary; convergence needs more.
    let out = deobfuscate(
        "1 + 2;",
        &Config {
            max_iterations: 1,
            clean: false,
        },
    )
    .unwrap();
    assert_eq!(out.trim_end(), "3;");
}

#[test]
fn test_parse_error_is_fatal() {
    assert!(deobfuscate("var = ;", &Config::default()).is_err());
}

#[test]
fn test_cleanup_removes_dead_declarations() {
    let out = run_clean("var k = 3; var r = k * 2; use(r);");
    assert!(
        !out.contains("var k"),
        "inlined binding is dead after cleanup: {out}"
    );
    assert!(out.contains("use(6);"), "fold still lands: {out}");
}

#[test]
fn test_multi_pass_cascade() {
    // atob result feeds a member access that feeds a binary fold.
    let out = run("atob('YWJj')[0] + '!';");
    assert_eq!(out.trim_end(), "'a!';");
}
