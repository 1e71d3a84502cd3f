//! Unsafe passes: semantic rewrites that consult the sandbox or reference
//! analysis. Every candidate fails closed — a bad-value verdict, an
//! unresolvable name, or a guard refusal just skips that candidate.

pub mod normalize_redundant_not_operator;
pub mod resolve_augmented_function_wrapped_array_replacements;
pub mod resolve_builtin_calls;
pub mod resolve_definite_binary_expressions;
pub mod resolve_definite_member_expressions;
pub mod resolve_deterministic_conditional_expressions;
pub mod resolve_eval_calls_on_non_literals;
pub mod resolve_function_to_array;
pub mod resolve_injected_prototype_method_calls;
pub mod resolve_local_calls;
pub mod resolve_minimal_alphabet;

use crate::cache::{self, EvalOutcome};
use crate::Pass;
use unweave_arborist::{Arborist, FlatKind, NodeId};
use unweave_common::Fingerprint;
use unweave_sandbox::{eval_in_vm, Sandbox};
use unweave_syntax::ast::{Kind, Lit, Node, NodeKind, UnaryOp};

/// The unsafe pass list, in execution order.
pub fn passes() -> Vec<Box<dyn Pass>> {
    vec![
        Box::new(resolve_definite_binary_expressions::ResolveDefiniteBinaryExpressions),
        Box::new(resolve_definite_member_expressions::ResolveDefiniteMemberExpressions),
        Box::new(
            resolve_deterministic_conditional_expressions::ResolveDeterministicConditionalExpressions,
        ),
        Box::new(normalize_redundant_not_operator::NormalizeRedundantNotOperator),
        Box::new(resolve_minimal_alphabet::ResolveMinimalAlphabet),
        Box::new(resolve_builtin_calls::ResolveBuiltinCalls),
        Box::new(resolve_local_calls::ResolveLocalCalls),
        Box::new(resolve_function_to_array::ResolveFunctionToArray),
        Box::new(resolve_injected_prototype_method_calls::ResolveInjectedPrototypeMethodCalls),
        Box::new(resolve_eval_calls_on_non_literals::ResolveEvalCallsOnNonLiterals),
        Box::new(
            resolve_augmented_function_wrapped_array_replacements::ResolveAugmentedFunctionWrappedArrayReplacements,
        ),
    ]
}

/// Sandbox-evaluate a fragment, memoised by fragment content within the
/// current fingerprint generation.
pub(crate) fn eval_cached(
    arb: &Arborist,
    fragment: &str,
    sandbox: &mut Sandbox,
) -> Option<Node> {
    let generation = arb.fingerprint();
    let key = Fingerprint::of(fragment);
    if let Some(outcome) = cache::with_bucket(generation, |bucket| bucket.evals.get(&key).cloned())
    {
        return match outcome {
            EvalOutcome::Literal(node) => Some(node),
            EvalOutcome::Bad => None,
        };
    }
    let result = eval_in_vm(fragment, sandbox);
    cache::with_bucket(generation, |bucket| {
        bucket.evals.insert(
            key,
            match &result {
                Some(node) => EvalOutcome::Literal(node.clone()),
                None => EvalOutcome::Bad,
            },
        );
    });
    result
}

/// `undefined` is never a safe literal substitute (out-of-bounds reads,
/// side-effect-only calls).
pub(crate) fn is_undefined_ident(node: &Node) -> bool {
    matches!(&node.kind, NodeKind::Identifier { name } if name == "undefined")
}

/// Subtree consisting purely of literal-valued syntax: literals, sign/logic
/// unaries over them, and binary combinations thereof.
pub(crate) fn is_literal_valued(arb: &Arborist, id: NodeId) -> bool {
    match &arb.node(id).kind {
        FlatKind::Literal { .. } | FlatKind::BigIntLiteral { .. } => true,
        FlatKind::UnaryExpression {
            op: UnaryOp::Minus | UnaryOp::Plus | UnaryOp::Not | UnaryOp::BitNot,
            argument,
        } => is_literal_valued(arb, *argument),
        FlatKind::BinaryExpression { left, right, .. } => {
            is_literal_valued(arb, *left) && is_literal_valued(arb, *right)
        }
        _ => false,
    }
}

/// Literal arguments (allowing a sign) — the only argument shapes the
/// call-folding passes accept.
pub(crate) fn is_literal_argument(arb: &Arborist, id: NodeId) -> bool {
    match &arb.node(id).kind {
        FlatKind::Literal { .. } | FlatKind::BigIntLiteral { .. } => true,
        FlatKind::UnaryExpression {
            op: UnaryOp::Minus | UnaryOp::Plus,
            argument,
        } => matches!(
            arb.node(*argument).kind(),
            Kind::Literal | Kind::BigIntLiteral
        ),
        _ => false,
    }
}

pub(crate) fn all_literal_arguments(arb: &Arborist, arguments: &[NodeId]) -> bool {
    arguments
        .iter()
        .all(|&arg| !arg.is_none() && is_literal_argument(arb, arg))
}

pub(crate) fn literal_truthy(value: &Lit) -> bool {
    match value {
        Lit::Str(s) => !s.is_empty(),
        Lit::Num(n) => *n != 0.0 && !n.is_nan(),
        Lit::Bool(b) => *b,
        Lit::Null => false,
    }
}

/// BigInt truthiness from the literal's digit text: only zero is falsy,
/// whatever the radix prefix.
pub(crate) fn bigint_truthy(text: &str) -> bool {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    digits.chars().any(|c| c != '0')
}

/// Source of an expression node as a standalone statement fragment. Object
/// and function heads would parse as blocks/declarations, so they get
/// parenthesized.
pub(crate) fn statement_src(arb: &Arborist, id: NodeId) -> String {
    let src = arb.src(id);
    if src.starts_with('{') || src.starts_with("function") {
        format!("({src});")
    } else {
        format!("{src};")
    }
}
