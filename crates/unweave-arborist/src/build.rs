//! Flattening between the recursive AST and the flat forest.
//!
//! `flatten` assigns node ids in pre-order while consuming the parsed tree:
//! a node's slot is reserved before its children are flattened, so every
//! subtree occupies a contiguous id range. `to_ast` is the inverse, used when
//! a pass wants to rebuild a replacement around existing subtrees.

use crate::node::{FlatKind, FlatNode, NodeId, ScopeId};
use unweave_syntax::ast::{Node, NodeKind};

pub(crate) struct Flattener<'a> {
    pub nodes: &'a mut Vec<FlatNode>,
}

impl<'a> Flattener<'a> {
    pub fn flatten(&mut self, node: Node, parent: NodeId, parent_key: &'static str) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(FlatNode {
            kind: FlatKind::EmptyStatement, // placeholder until children exist
            span: node.span,
            parent,
            parent_key,
            subtree_end: 0,
            scope: ScopeId::NONE,
            decl_node: NodeId::NONE,
            references: Vec::new(),
        });

        let kind = match node.kind {
            NodeKind::Program { body } => FlatKind::Program {
                body: self.flatten_list(body, id, "body"),
            },
            NodeKind::Literal { value } => FlatKind::Literal { value },
            NodeKind::RegExpLiteral { pattern, flags } => {
                FlatKind::RegExpLiteral { pattern, flags }
            }
            NodeKind::BigIntLiteral { text } => FlatKind::BigIntLiteral { text },
            NodeKind::Identifier { name } => FlatKind::Identifier { name },
            NodeKind::ThisExpression => FlatKind::ThisExpression,
            NodeKind::ArrayExpression { elements } => FlatKind::ArrayExpression {
                elements: elements
                    .into_iter()
                    .map(|el| match el {
                        Some(el) => self.flatten(el, id, "elements"),
                        None => NodeId::NONE,
                    })
                    .collect(),
            },
            NodeKind::ObjectExpression { properties } => FlatKind::ObjectExpression {
                properties: self.flatten_list(properties, id, "properties"),
            },
            NodeKind::Property {
                key,
                value,
                computed,
                shorthand,
                kind,
            } => FlatKind::Property {
                key: self.flatten(*key, id, "key"),
                value: self.flatten(*value, id, "value"),
                computed,
                shorthand,
                kind,
            },
            NodeKind::UnaryExpression { op, argument } => FlatKind::UnaryExpression {
                op,
                argument: self.flatten(*argument, id, "argument"),
            },
            NodeKind::UpdateExpression {
                op,
                prefix,
                argument,
            } => FlatKind::UpdateExpression {
                op,
                prefix,
                argument: self.flatten(*argument, id, "argument"),
            },
            NodeKind::BinaryExpression { op, left, right } => FlatKind::BinaryExpression {
                op,
                left: self.flatten(*left, id, "left"),
                right: self.flatten(*right, id, "right"),
            },
            NodeKind::LogicalExpression { op, left, right } => FlatKind::LogicalExpression {
                op,
                left: self.flatten(*left, id, "left"),
                right: self.flatten(*right, id, "right"),
            },
            NodeKind::AssignmentExpression { op, left, right } => {
                FlatKind::AssignmentExpression {
                    op,
                    left: self.flatten(*left, id, "left"),
                    right: self.flatten(*right, id, "right"),
                }
            }
            NodeKind::ConditionalExpression {
                test,
                consequent,
                alternate,
            } => FlatKind::ConditionalExpression {
                test: self.flatten(*test, id, "test"),
                consequent: self.flatten(*consequent, id, "consequent"),
                alternate: self.flatten(*alternate, id, "alternate"),
            },
            NodeKind::CallExpression { callee, arguments } => FlatKind::CallExpression {
                callee: self.flatten(*callee, id, "callee"),
                arguments: self.flatten_list(arguments, id, "arguments"),
            },
            NodeKind::NewExpression { callee, arguments } => FlatKind::NewExpression {
                callee: self.flatten(*callee, id, "callee"),
                arguments: self.flatten_list(arguments, id, "arguments"),
            },
            NodeKind::MemberExpression {
                object,
                property,
                computed,
            } => FlatKind::MemberExpression {
                object: self.flatten(*object, id, "object"),
                property: self.flatten(*property, id, "property"),
                computed,
            },
            NodeKind::SequenceExpression { expressions } => FlatKind::SequenceExpression {
                expressions: self.flatten_list(expressions, id, "expressions"),
            },
            NodeKind::FunctionExpression { id: fn_id, params, body } => {
                FlatKind::FunctionExpression {
                    id: self.flatten_opt(fn_id, id, "id"),
                    params: self.flatten_list(params, id, "params"),
                    body: self.flatten(*body, id, "body"),
                }
            }
            NodeKind::ArrowFunctionExpression {
                params,
                body,
                expression,
            } => FlatKind::ArrowFunctionExpression {
                params: self.flatten_list(params, id, "params"),
                body: self.flatten(*body, id, "body"),
                expression,
            },
            NodeKind::ExpressionStatement { expression } => FlatKind::ExpressionStatement {
                expression: self.flatten(*expression, id, "expression"),
            },
            NodeKind::BlockStatement { body } => FlatKind::BlockStatement {
                body: self.flatten_list(body, id, "body"),
            },
            NodeKind::EmptyStatement => FlatKind::EmptyStatement,
            NodeKind::VariableDeclaration { kind, declarations } => {
                FlatKind::VariableDeclaration {
                    kind,
                    declarations: self.flatten_list(declarations, id, "declarations"),
                }
            }
            NodeKind::VariableDeclarator { id: decl_id, init } => FlatKind::VariableDeclarator {
                id: self.flatten(*decl_id, id, "id"),
                init: self.flatten_opt(init, id, "init"),
            },
            NodeKind::FunctionDeclaration { id: fn_id, params, body } => {
                FlatKind::FunctionDeclaration {
                    id: self.flatten(*fn_id, id, "id"),
                    params: self.flatten_list(params, id, "params"),
                    body: self.flatten(*body, id, "body"),
                }
            }
            NodeKind::ReturnStatement { argument } => FlatKind::ReturnStatement {
                argument: self.flatten_opt(argument, id, "argument"),
            },
            NodeKind::IfStatement {
                test,
                consequent,
                alternate,
            } => FlatKind::IfStatement {
                test: self.flatten(*test, id, "test"),
                consequent: self.flatten(*consequent, id, "consequent"),
                alternate: self.flatten_opt(alternate, id, "alternate"),
            },
            NodeKind::ForStatement {
                init,
                test,
                update,
                body,
            } => FlatKind::ForStatement {
                init: self.flatten_opt(init, id, "init"),
                test: self.flatten_opt(test, id, "test"),
                update: self.flatten_opt(update, id, "update"),
                body: self.flatten(*body, id, "body"),
            },
            NodeKind::ForInStatement { left, right, body } => FlatKind::ForInStatement {
                left: self.flatten(*left, id, "left"),
                right: self.flatten(*right, id, "right"),
                body: self.flatten(*body, id, "body"),
            },
            NodeKind::ForOfStatement { left, right, body } => FlatKind::ForOfStatement {
                left: self.flatten(*left, id, "left"),
                right: self.flatten(*right, id, "right"),
                body: self.flatten(*body, id, "body"),
            },
            NodeKind::WhileStatement { test, body } => FlatKind::WhileStatement {
                test: self.flatten(*test, id, "test"),
                body: self.flatten(*body, id, "body"),
            },
            NodeKind::DoWhileStatement { body, test } => FlatKind::DoWhileStatement {
                body: self.flatten(*body, id, "body"),
                test: self.flatten(*test, id, "test"),
            },
            NodeKind::BreakStatement { label } => FlatKind::BreakStatement {
                label: self.flatten_opt(label, id, "label"),
            },
            NodeKind::ContinueStatement { label } => FlatKind::ContinueStatement {
                label: self.flatten_opt(label, id, "label"),
            },
            NodeKind::LabeledStatement { label, body } => FlatKind::LabeledStatement {
                label: self.flatten(*label, id, "label"),
                body: self.flatten(*body, id, "body"),
            },
            NodeKind::ThrowStatement { argument } => FlatKind::ThrowStatement {
                argument: self.flatten(*argument, id, "argument"),
            },
            NodeKind::TryStatement {
                block,
                handler,
                finalizer,
            } => FlatKind::TryStatement {
                block: self.flatten(*block, id, "block"),
                handler: self.flatten_opt(handler, id, "handler"),
                finalizer: self.flatten_opt(finalizer, id, "finalizer"),
            },
            NodeKind::CatchClause { param, body } => FlatKind::CatchClause {
                param: self.flatten_opt(param, id, "param"),
                body: self.flatten(*body, id, "body"),
            },
            NodeKind::SwitchStatement {
                discriminant,
                cases,
            } => FlatKind::SwitchStatement {
                discriminant: self.flatten(*discriminant, id, "discriminant"),
                cases: self.flatten_list(cases, id, "cases"),
            },
            NodeKind::SwitchCase { test, consequent } => FlatKind::SwitchCase {
                test: self.flatten_opt(test, id, "test"),
                consequent: self.flatten_list(consequent, id, "consequent"),
            },
        };

        self.nodes[id.index()].kind = kind;
        self.nodes[id.index()].subtree_end = self.nodes.len() as u32;
        id
    }

    fn flatten_list(
        &mut self,
        list: Vec<Node>,
        parent: NodeId,
        key: &'static str,
    ) -> Vec<NodeId> {
        list.into_iter()
            .map(|child| self.flatten(child, parent, key))
            .collect()
    }

    fn flatten_opt(
        &mut self,
        node: Option<Box<Node>>,
        parent: NodeId,
        key: &'static str,
    ) -> NodeId {
        match node {
            Some(node) => self.flatten(*node, parent, key),
            None => NodeId::NONE,
        }
    }
}

/// Rebuild a recursive AST node from a flat subtree.
pub(crate) fn to_ast(nodes: &[FlatNode], id: NodeId) -> Node {
    let node = &nodes[id.index()];
    let get = |child: NodeId| Box::new(to_ast(nodes, child));
    let get_opt = |child: NodeId| {
        if child.is_none() {
            None
        } else {
            Some(Box::new(to_ast(nodes, child)))
        }
    };
    let get_list =
        |children: &[NodeId]| children.iter().map(|&c| to_ast(nodes, c)).collect::<Vec<_>>();

    let kind = match &node.kind {
        FlatKind::Program { body } => NodeKind::Program {
            body: get_list(body),
        },
        FlatKind::Literal { value } => NodeKind::Literal {
            value: value.clone(),
        },
        FlatKind::RegExpLiteral { pattern, flags } => NodeKind::RegExpLiteral {
            pattern: pattern.clone(),
            flags: flags.clone(),
        },
        FlatKind::BigIntLiteral { text } => NodeKind::BigIntLiteral { text: text.clone() },
        FlatKind::Identifier { name } => NodeKind::Identifier { name: name.clone() },
        FlatKind::ThisExpression => NodeKind::ThisExpression,
        FlatKind::ArrayExpression { elements } => NodeKind::ArrayExpression {
            elements: elements
                .iter()
                .map(|&el| {
                    if el.is_none() {
                        None
                    } else {
                        Some(to_ast(nodes, el))
                    }
                })
                .collect(),
        },
        FlatKind::ObjectExpression { properties } => NodeKind::ObjectExpression {
            properties: get_list(properties),
        },
        FlatKind::Property {
            key,
            value,
            computed,
            shorthand,
            kind,
        } => NodeKind::Property {
            key: get(*key),
            value: get(*value),
            computed: *computed,
            shorthand: *shorthand,
            kind: *kind,
        },
        FlatKind::UnaryExpression { op, argument } => NodeKind::UnaryExpression {
            op: *op,
            argument: get(*argument),
        },
        FlatKind::UpdateExpression {
            op,
            prefix,
            argument,
        } => NodeKind::UpdateExpression {
            op: *op,
            prefix: *prefix,
            argument: get(*argument),
        },
        FlatKind::BinaryExpression { op, left, right } => NodeKind::BinaryExpression {
            op: *op,
            left: get(*left),
            right: get(*right),
        },
        FlatKind::LogicalExpression { op, left, right } => NodeKind::LogicalExpression {
            op: *op,
            left: get(*left),
            right: get(*right),
        },
        FlatKind::AssignmentExpression { op, left, right } => NodeKind::AssignmentExpression {
            op: *op,
            left: get(*left),
            right: get(*right),
        },
        FlatKind::ConditionalExpression {
            test,
            consequent,
            alternate,
        } => NodeKind::ConditionalExpression {
            test: get(*test),
            consequent: get(*consequent),
            alternate: get(*alternate),
        },
        FlatKind::CallExpression { callee, arguments } => NodeKind::CallExpression {
            callee: get(*callee),
            arguments: get_list(arguments),
        },
        FlatKind::NewExpression { callee, arguments } => NodeKind::NewExpression {
            callee: get(*callee),
            arguments: get_list(arguments),
        },
        FlatKind::MemberExpression {
            object,
            property,
            computed,
        } => NodeKind::MemberExpression {
            object: get(*object),
            property: get(*property),
            computed: *computed,
        },
        FlatKind::SequenceExpression { expressions } => NodeKind::SequenceExpression {
            expressions: get_list(expressions),
        },
        FlatKind::FunctionExpression { id, params, body } => NodeKind::FunctionExpression {
            id: get_opt(*id),
            params: get_list(params),
            body: get(*body),
        },
        FlatKind::ArrowFunctionExpression {
            params,
            body,
            expression,
        } => NodeKind::ArrowFunctionExpression {
            params: get_list(params),
            body: get(*body),
            expression: *expression,
        },
        FlatKind::ExpressionStatement { expression } => NodeKind::ExpressionStatement {
            expression: get(*expression),
        },
        FlatKind::BlockStatement { body } => NodeKind::BlockStatement {
            body: get_list(body),
        },
        FlatKind::EmptyStatement => NodeKind::EmptyStatement,
        FlatKind::VariableDeclaration { kind, declarations } => NodeKind::VariableDeclaration {
            kind: *kind,
            declarations: get_list(declarations),
        },
        FlatKind::VariableDeclarator { id, init } => NodeKind::VariableDeclarator {
            id: get(*id),
            init: get_opt(*init),
        },
        FlatKind::FunctionDeclaration { id, params, body } => NodeKind::FunctionDeclaration {
            id: get(*id),
            params: get_list(params),
            body: get(*body),
        },
        FlatKind::ReturnStatement { argument } => NodeKind::ReturnStatement {
            argument: get_opt(*argument),
        },
        FlatKind::IfStatement {
            test,
            consequent,
            alternate,
        } => NodeKind::IfStatement {
            test: get(*test),
            consequent: get(*consequent),
            alternate: get_opt(*alternate),
        },
        FlatKind::ForStatement {
            init,
            test,
            update,
            body,
        } => NodeKind::ForStatement {
            init: get_opt(*init),
            test: get_opt(*test),
            update: get_opt(*update),
            body: get(*body),
        },
        FlatKind::ForInStatement { left, right, body } => NodeKind::ForInStatement {
            left: get(*left),
            right: get(*right),
            body: get(*body),
        },
        FlatKind::ForOfStatement { left, right, body } => NodeKind::ForOfStatement {
            left: get(*left),
            right: get(*right),
            body: get(*body),
        },
        FlatKind::WhileStatement { test, body } => NodeKind::WhileStatement {
            test: get(*test),
            body: get(*body),
        },
        FlatKind::DoWhileStatement { body, test } => NodeKind::DoWhileStatement {
            body: get(*body),
            test: get(*test),
        },
        FlatKind::BreakStatement { label } => NodeKind::BreakStatement {
            label: get_opt(*label),
        },
        FlatKind::ContinueStatement { label } => NodeKind::ContinueStatement {
            label: get_opt(*label),
        },
        FlatKind::LabeledStatement { label, body } => NodeKind::LabeledStatement {
            label: get(*label),
            body: get(*body),
        },
        FlatKind::ThrowStatement { argument } => NodeKind::ThrowStatement {
            argument: get(*argument),
        },
        FlatKind::TryStatement {
            block,
            handler,
            finalizer,
        } => NodeKind::TryStatement {
            block: get(*block),
            handler: get_opt(*handler),
            finalizer: get_opt(*finalizer),
        },
        FlatKind::SwitchStatement {
            discriminant,
            cases,
        } => NodeKind::SwitchStatement {
            discriminant: get(*discriminant),
            cases: get_list(cases),
        },
        FlatKind::SwitchCase { test, consequent } => NodeKind::SwitchCase {
            test: get_opt(*test),
            consequent: get_list(consequent),
        },
        FlatKind::CatchClause { param, body } => NodeKind::CatchClause {
            param: get_opt(*param),
            body: get(*body),
        },
    };
    Node::new(node.span, kind)
}
