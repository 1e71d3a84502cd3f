//! Resolve `eval(expr)` where `expr` reduces to a string literal: the eval
//! call is replaced by the code the string contains.

use super::eval_cached;
use crate::context::{context_of, ordered_source};
use crate::{Filter, Pass};
use unweave_arborist::{Arborist, FlatKind, NodeId};
use unweave_sandbox::Sandbox;
use unweave_syntax::ast::{Kind, Lit, NodeKind};

pub struct ResolveEvalCallsOnNonLiterals;

impl Pass for ResolveEvalCallsOnNonLiterals {
    fn name(&self) -> &'static str {
        "resolveEvalCallsOnNonLiterals"
    }

    fn match_candidates(&self, arb: &Arborist, filter: Filter) -> Vec<NodeId> {
        arb.nodes_of_kind(Kind::CallExpression)
            .iter()
            .copied()
            .filter(|&id| {
                let FlatKind::CallExpression { callee, arguments } = &arb.node(id).kind else {
                    return false;
                };
                arb.node(*callee).ident_name() == Some("eval")
                    && arb.node(*callee).decl_node.is_none()
                    && arguments.len() == 1
                    && arb.node(arguments[0]).kind() != Kind::Literal
            })
            .filter(|&id| filter(arb, id))
            .collect()
    }

    fn transform(&self, arb: &mut Arborist, node: NodeId, sandbox: &mut Sandbox) {
        let FlatKind::CallExpression { arguments, .. } = &arb.node(node).kind else {
            return;
        };
        let argument = arguments[0];

        // Reduce the argument (with its context) to a literal.
        let context = context_of(arb, argument);
        let mut fragment = ordered_source(arb, &context, false);
        fragment.push_str(arb.src(argument));
        fragment.push(';');
        let Some(reduced) = eval_cached(arb, &fragment, sandbox) else {
            return;
        };
        let NodeKind::Literal {
            value: Lit::Str(code),
        } = &reduced.kind
        else {
            return;
        };

        // The string must itself be parseable; what eval would have run
        // becomes plain code.
        let Ok(program) = unweave_syntax::parse(code) else {
            return;
        };
        let NodeKind::Program { body } = &program.root.kind else {
            return;
        };

        match body.as_slice() {
            // A single expression substitutes for the eval call in place.
            [only] => {
                if let NodeKind::ExpressionStatement { expression } = &only.kind {
                    arb.mark_node(node, (**expression).clone());
                    return;
                }
                self.replace_whole_statement(arb, node, program.root.clone());
            }
            _ => self.replace_whole_statement(arb, node, program.root.clone()),
        }
    }
}

impl ResolveEvalCallsOnNonLiterals {
    /// Multi-statement payloads can only replace a bare `eval(…);`
    /// statement; anywhere else the rewrite is refused.
    fn replace_whole_statement(
        &self,
        arb: &mut Arborist,
        call: NodeId,
        program: unweave_syntax::ast::Node,
    ) {
        let parent = arb.node(call).parent;
        if parent.is_none() {
            return;
        }
        if arb.node(parent).kind() != Kind::ExpressionStatement {
            return;
        }
        arb.mark_node(parent, program);
    }
}
