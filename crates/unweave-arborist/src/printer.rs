//! Pretty-printer over the flat forest.
//!
//! Two-space indent, single-quoted strings, minimal parentheses by operator
//! precedence. Printing an untouched tree yields a normalised rendition of
//! the input; the engine's output is always a full reprint of the final tree.

use crate::node::{FlatKind, FlatNode, NodeId};
use unweave_syntax::ast::{BinaryOp, Kind, Lit, PropertyKind, UnaryOp};

pub(crate) struct Printer<'a> {
    nodes: &'a [FlatNode],
    out: String,
    indent: usize,
}

// Precedence levels, tightest last. Mirrors the parser's climbing table.
const PREC_SEQUENCE: u8 = 1;
const PREC_ASSIGN: u8 = 3;
const PREC_OR: u8 = 4;
const PREC_AND: u8 = 5;
const PREC_BIT_OR: u8 = 6;
const PREC_BIT_XOR: u8 = 7;
const PREC_BIT_AND: u8 = 8;
const PREC_EQUALITY: u8 = 9;
const PREC_RELATIONAL: u8 = 10;
const PREC_SHIFT: u8 = 11;
const PREC_ADDITIVE: u8 = 12;
const PREC_MULTIPLICATIVE: u8 = 13;
const PREC_EXP: u8 = 14;
const PREC_UNARY: u8 = 15;
const PREC_POSTFIX: u8 = 16;
const PREC_CALL: u8 = 17;
const PREC_MEMBER: u8 = 18;
const PREC_PRIMARY: u8 = 19;

fn binary_prec(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::BitOr => PREC_BIT_OR,
        BinaryOp::BitXor => PREC_BIT_XOR,
        BinaryOp::BitAnd => PREC_BIT_AND,
        BinaryOp::EqEq | BinaryOp::NotEq | BinaryOp::StrictEq | BinaryOp::StrictNotEq => {
            PREC_EQUALITY
        }
        BinaryOp::Lt
        | BinaryOp::Gt
        | BinaryOp::LtEq
        | BinaryOp::GtEq
        | BinaryOp::In
        | BinaryOp::Instanceof => PREC_RELATIONAL,
        BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => PREC_SHIFT,
        BinaryOp::Add | BinaryOp::Sub => PREC_ADDITIVE,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => PREC_MULTIPLICATIVE,
        BinaryOp::Exp => PREC_EXP,
    }
}

impl<'a> Printer<'a> {
    pub fn new(nodes: &'a [FlatNode]) -> Printer<'a> {
        Printer {
            nodes,
            out: String::new(),
            indent: 0,
        }
    }

    pub fn finish(self) -> String {
        self.out
    }

    /// Print a whole program: one statement per top-level line.
    pub fn print_program(&mut self, root: NodeId) {
        let FlatKind::Program { body } = self.nodes[root.index()].kind.clone() else {
            return;
        };
        for stmt in body {
            self.print_stmt(stmt);
        }
    }

    /// Print any node: statements as statements, everything else as a bare
    /// expression.
    pub fn print_any(&mut self, id: NodeId) {
        let node = &self.nodes[id.index()];
        if node.is_statement() || node.kind() == Kind::Program {
            if node.kind() == Kind::Program {
                self.print_program(id);
            } else {
                self.print_stmt(id);
            }
        } else {
            self.print_expr(id, 0);
        }
    }

    fn push(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn newline(&mut self) {
        self.out.push('\n');
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }

    fn line_open(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn print_stmt(&mut self, id: NodeId) {
        self.line_open();
        self.print_stmt_bare(id);
        self.out.push('\n');
    }

    /// Print a statement without the leading indent or trailing newline.
    fn print_stmt_bare(&mut self, id: NodeId) {
        let kind = self.nodes[id.index()].kind.clone();
        match kind {
            FlatKind::ExpressionStatement { expression } => {
                let needs_parens = self.starts_ambiguously(expression);
                if needs_parens {
                    self.push("(");
                }
                self.print_expr(expression, PREC_SEQUENCE);
                if needs_parens {
                    self.push(")");
                }
                self.push(";");
            }
            FlatKind::BlockStatement { .. } => self.print_block(id),
            FlatKind::EmptyStatement => self.push(";"),
            FlatKind::VariableDeclaration { .. } => {
                self.print_var_decl(id);
                self.push(";");
            }
            FlatKind::FunctionDeclaration { id: name, params, body } => {
                self.push("function ");
                self.print_expr(name, PREC_PRIMARY);
                self.print_params(&params);
                self.push(" ");
                self.print_block(body);
            }
            FlatKind::ReturnStatement { argument } => {
                if argument.is_none() {
                    self.push("return;");
                } else {
                    self.push("return ");
                    self.print_expr(argument, PREC_SEQUENCE);
                    self.push(";");
                }
            }
            FlatKind::IfStatement {
                test,
                consequent,
                alternate,
            } => {
                self.push("if (");
                self.print_expr(test, PREC_SEQUENCE);
                self.push(")");
                self.print_body(consequent);
                if !alternate.is_none() {
                    if self.nodes[consequent.index()].kind() == Kind::BlockStatement {
                        self.push(" else");
                    } else {
                        self.newline();
                        self.push("else");
                    }
                    if self.nodes[alternate.index()].kind() == Kind::IfStatement {
                        self.push(" ");
                        self.print_stmt_bare(alternate);
                    } else {
                        self.print_body(alternate);
                    }
                }
            }
            FlatKind::ForStatement {
                init,
                test,
                update,
                body,
            } => {
                self.push("for (");
                if !init.is_none() {
                    if self.nodes[init.index()].kind() == Kind::VariableDeclaration {
                        self.print_var_decl(init);
                    } else {
                        self.print_expr(init, PREC_SEQUENCE);
                    }
                }
                self.push("; ");
                if !test.is_none() {
                    self.print_expr(test, PREC_SEQUENCE);
                }
                self.push("; ");
                if !update.is_none() {
                    self.print_expr(update, PREC_SEQUENCE);
                }
                self.push(")");
                self.print_body(body);
            }
            FlatKind::ForInStatement { left, right, body } => {
                self.push("for (");
                self.print_for_head_left(left);
                self.push(" in ");
                self.print_expr(right, PREC_SEQUENCE);
                self.push(")");
                self.print_body(body);
            }
            FlatKind::ForOfStatement { left, right, body } => {
                self.push("for (");
                self.print_for_head_left(left);
                self.push(" of ");
                self.print_expr(right, PREC_ASSIGN);
                self.push(")");
                self.print_body(body);
            }
            FlatKind::WhileStatement { test, body } => {
                self.push("while (");
                self.print_expr(test, PREC_SEQUENCE);
                self.push(")");
                self.print_body(body);
            }
            FlatKind::DoWhileStatement { body, test } => {
                self.push("do");
                if self.nodes[body.index()].kind() == Kind::BlockStatement {
                    self.push(" ");
                    self.print_block(body);
                    self.push(" ");
                } else {
                    self.indent += 1;
                    self.newline();
                    self.print_stmt_bare(body);
                    self.indent -= 1;
                    self.newline();
                }
                self.push("while (");
                self.print_expr(test, PREC_SEQUENCE);
                self.push(");");
            }
            FlatKind::BreakStatement { label } => {
                if label.is_none() {
                    self.push("break;");
                } else {
                    self.push("break ");
                    self.print_expr(label, PREC_PRIMARY);
                    self.push(";");
                }
            }
            FlatKind::ContinueStatement { label } => {
                if label.is_none() {
                    self.push("continue;");
                } else {
                    self.push("continue ");
                    self.print_expr(label, PREC_PRIMARY);
                    self.push(";");
                }
            }
            FlatKind::LabeledStatement { label, body } => {
                self.print_expr(label, PREC_PRIMARY);
                self.push(":");
                self.newline();
                self.print_stmt_bare(body);
            }
            FlatKind::ThrowStatement { argument } => {
                self.push("throw ");
                self.print_expr(argument, PREC_SEQUENCE);
                self.push(";");
            }
            FlatKind::TryStatement {
                block,
                handler,
                finalizer,
            } => {
                self.push("try ");
                self.print_block(block);
                if !handler.is_none() {
                    let FlatKind::CatchClause { param, body } =
                        self.nodes[handler.index()].kind.clone()
                    else {
                        unreachable!("try handler is always a catch clause");
                    };
                    self.push(" catch ");
                    if !param.is_none() {
                        self.push("(");
                        self.print_expr(param, PREC_PRIMARY);
                        self.push(") ");
                    }
                    self.print_block(body);
                }
                if !finalizer.is_none() {
                    self.push(" finally ");
                    self.print_block(finalizer);
                }
            }
            FlatKind::SwitchStatement {
                discriminant,
                cases,
            } => {
                self.push("switch (");
                self.print_expr(discriminant, PREC_SEQUENCE);
                self.push(") {");
                self.indent += 1;
                for case in cases {
                    let FlatKind::SwitchCase { test, consequent } =
                        self.nodes[case.index()].kind.clone()
                    else {
                        continue;
                    };
                    self.newline();
                    if test.is_none() {
                        self.push("default:");
                    } else {
                        self.push("case ");
                        self.print_expr(test, PREC_SEQUENCE);
                        self.push(":");
                    }
                    self.indent += 1;
                    for stmt in consequent {
                        self.newline();
                        self.print_stmt_bare(stmt);
                    }
                    self.indent -= 1;
                }
                self.indent -= 1;
                self.newline();
                self.push("}");
            }
            _ => {
                // Bare expression in statement position (spliced fragments).
                self.print_expr(id, PREC_SEQUENCE);
                self.push(";");
            }
        }
    }

    fn print_block(&mut self, id: NodeId) {
        let FlatKind::BlockStatement { body } = self.nodes[id.index()].kind.clone() else {
            // Function bodies are always blocks; tolerate anything else.
            self.print_stmt_bare(id);
            return;
        };
        if body.is_empty() {
            self.push("{}");
            return;
        }
        self.push("{");
        self.indent += 1;
        for stmt in body {
            self.newline();
            self.print_stmt_bare(stmt);
        }
        self.indent -= 1;
        self.newline();
        self.push("}");
    }

    /// Loop/conditional body: blocks on the same line, single statements on
    /// the next line, indented.
    fn print_body(&mut self, id: NodeId) {
        if self.nodes[id.index()].kind() == Kind::BlockStatement {
            self.push(" ");
            self.print_block(id);
        } else {
            self.indent += 1;
            self.newline();
            self.print_stmt_bare(id);
            self.indent -= 1;
        }
    }

    fn print_var_decl(&mut self, id: NodeId) {
        let FlatKind::VariableDeclaration { kind, declarations } =
            self.nodes[id.index()].kind.clone()
        else {
            return;
        };
        self.push(kind.as_str());
        self.push(" ");
        for (i, decl) in declarations.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            let FlatKind::VariableDeclarator { id: name, init } =
                self.nodes[decl.index()].kind.clone()
            else {
                continue;
            };
            self.print_expr(name, PREC_PRIMARY);
            if !init.is_none() {
                self.push(" = ");
                self.print_expr(init, PREC_ASSIGN);
            }
        }
    }

    fn print_for_head_left(&mut self, id: NodeId) {
        if self.nodes[id.index()].kind() == Kind::VariableDeclaration {
            self.print_var_decl(id);
        } else {
            self.print_expr(id, PREC_CALL);
        }
    }

    fn print_params(&mut self, params: &[NodeId]) {
        self.push("(");
        for (i, &p) in params.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.print_expr(p, PREC_PRIMARY);
        }
        self.push(")");
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn print_expr(&mut self, id: NodeId, min_prec: u8) {
        let kind = self.nodes[id.index()].kind.clone();
        let prec = self.expr_prec(&kind);
        let parens = prec < min_prec;
        if parens {
            self.push("(");
        }
        match kind {
            FlatKind::Literal { value } => self.print_literal(&value),
            FlatKind::RegExpLiteral { pattern, flags } => {
                self.push("/");
                self.push(&pattern);
                self.push("/");
                self.push(&flags);
            }
            FlatKind::BigIntLiteral { text } => {
                self.push(&text);
                self.push("n");
            }
            FlatKind::Identifier { name } => self.push(&name),
            FlatKind::ThisExpression => self.push("this"),
            FlatKind::ArrayExpression { elements } => {
                self.push("[");
                for (i, &el) in elements.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    if !el.is_none() {
                        self.print_expr(el, PREC_ASSIGN);
                    }
                }
                self.push("]");
            }
            FlatKind::ObjectExpression { properties } => {
                if properties.is_empty() {
                    self.push("{}");
                } else {
                    self.push("{");
                    self.indent += 1;
                    for (i, &prop) in properties.iter().enumerate() {
                        if i > 0 {
                            self.push(",");
                        }
                        self.newline();
                        self.print_property(prop);
                    }
                    self.indent -= 1;
                    self.newline();
                    self.push("}");
                }
            }
            FlatKind::Property { .. } => self.print_property(id),
            FlatKind::UnaryExpression { op, argument } => {
                self.push(op.as_str());
                if op.is_keyword() {
                    self.push(" ");
                } else {
                    // `- -x` and `+ +x` must not fuse into `--x` / `++x`.
                    let arg_node = &self.nodes[argument.index()];
                    let same_sign = match (&op, &arg_node.kind) {
                        (UnaryOp::Minus, FlatKind::UnaryExpression { op, .. }) => {
                            *op == UnaryOp::Minus
                        }
                        (UnaryOp::Plus, FlatKind::UnaryExpression { op, .. }) => {
                            *op == UnaryOp::Plus
                        }
                        (
                            UnaryOp::Minus,
                            FlatKind::UpdateExpression {
                                op: update, prefix, ..
                            },
                        ) => *prefix && update.as_str() == "--",
                        (
                            UnaryOp::Plus,
                            FlatKind::UpdateExpression {
                                op: update, prefix, ..
                            },
                        ) => *prefix && update.as_str() == "++",
                        _ => false,
                    };
                    if same_sign {
                        self.push(" ");
                    }
                }
                self.print_expr(argument, PREC_UNARY);
            }
            FlatKind::UpdateExpression {
                op,
                prefix,
                argument,
            } => {
                if prefix {
                    self.push(op.as_str());
                    self.print_expr(argument, PREC_UNARY);
                } else {
                    self.print_expr(argument, PREC_POSTFIX);
                    self.push(op.as_str());
                }
            }
            FlatKind::BinaryExpression { op, left, right } => {
                let p = binary_prec(op);
                self.print_expr(left, if op == BinaryOp::Exp { p + 1 } else { p });
                self.push(" ");
                self.push(op.as_str());
                self.push(" ");
                self.print_expr(right, if op == BinaryOp::Exp { p } else { p + 1 });
            }
            FlatKind::LogicalExpression { op, left, right } => {
                let p = match op.as_str() {
                    "&&" => PREC_AND,
                    _ => PREC_OR,
                };
                self.print_expr(left, p);
                self.push(" ");
                self.push(op.as_str());
                self.push(" ");
                self.print_expr(right, p + 1);
            }
            FlatKind::AssignmentExpression { op, left, right } => {
                self.print_expr(left, PREC_CALL);
                self.push(" ");
                self.push(op.as_str());
                self.push(" ");
                self.print_expr(right, PREC_ASSIGN);
            }
            FlatKind::ConditionalExpression {
                test,
                consequent,
                alternate,
            } => {
                self.print_expr(test, PREC_OR);
                self.push(" ? ");
                self.print_expr(consequent, PREC_ASSIGN);
                self.push(" : ");
                self.print_expr(alternate, PREC_ASSIGN);
            }
            FlatKind::CallExpression { callee, arguments } => {
                let callee_kind = self.nodes[callee.index()].kind();
                if matches!(
                    callee_kind,
                    Kind::FunctionExpression | Kind::ArrowFunctionExpression
                ) {
                    self.push("(");
                    self.print_expr(callee, 0);
                    self.push(")");
                } else {
                    self.print_expr(callee, PREC_CALL);
                }
                self.print_arguments(&arguments);
            }
            FlatKind::NewExpression { callee, arguments } => {
                self.push("new ");
                self.print_expr(callee, PREC_MEMBER);
                self.print_arguments(&arguments);
            }
            FlatKind::MemberExpression {
                object,
                property,
                computed,
            } => {
                let object_kind = self.nodes[object.index()].kind();
                if matches!(
                    object_kind,
                    Kind::FunctionExpression | Kind::ArrowFunctionExpression
                ) {
                    self.push("(");
                    self.print_expr(object, 0);
                    self.push(")");
                } else if object_kind == Kind::Literal {
                    // `5.toString()` is a syntax error; numbers need parens.
                    let is_num = matches!(
                        self.nodes[object.index()].literal(),
                        Some(Lit::Num(_))
                    );
                    if is_num {
                        self.push("(");
                        self.print_expr(object, 0);
                        self.push(")");
                    } else {
                        self.print_expr(object, PREC_CALL);
                    }
                } else {
                    self.print_expr(object, PREC_CALL);
                }
                if computed {
                    self.push("[");
                    self.print_expr(property, PREC_SEQUENCE);
                    self.push("]");
                } else {
                    self.push(".");
                    self.print_expr(property, PREC_PRIMARY);
                }
            }
            FlatKind::SequenceExpression { expressions } => {
                for (i, &e) in expressions.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.print_expr(e, PREC_ASSIGN);
                }
            }
            FlatKind::FunctionExpression { id: name, params, body } => {
                self.push("function ");
                if !name.is_none() {
                    self.print_expr(name, PREC_PRIMARY);
                }
                self.print_params(&params);
                self.push(" ");
                self.print_block(body);
            }
            FlatKind::ArrowFunctionExpression {
                params,
                body,
                expression,
            } => {
                self.print_params(&params);
                self.push(" => ");
                if expression {
                    // Object-literal bodies would read as blocks.
                    if self.starts_ambiguously(body) {
                        self.push("(");
                        self.print_expr(body, PREC_ASSIGN);
                        self.push(")");
                    } else {
                        self.print_expr(body, PREC_ASSIGN);
                    }
                } else {
                    self.print_block(body);
                }
            }
            _ => {
                // Statement kind in expression position: print bare.
                self.print_stmt_bare(id);
            }
        }
        if parens {
            self.push(")");
        }
    }

    fn print_arguments(&mut self, arguments: &[NodeId]) {
        self.push("(");
        for (i, &arg) in arguments.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.print_expr(arg, PREC_ASSIGN);
        }
        self.push(")");
    }

    fn print_property(&mut self, id: NodeId) {
        let FlatKind::Property {
            key,
            value,
            computed,
            shorthand,
            kind,
        } = self.nodes[id.index()].kind.clone()
        else {
            return;
        };
        match kind {
            PropertyKind::Get | PropertyKind::Set => {
                self.push(if kind == PropertyKind::Get { "get " } else { "set " });
                self.print_property_key(key, computed);
                let FlatKind::FunctionExpression { params, body, .. } =
                    self.nodes[value.index()].kind.clone()
                else {
                    return;
                };
                self.print_params(&params);
                self.push(" ");
                self.print_block(body);
            }
            PropertyKind::Init => {
                if shorthand {
                    self.print_expr(value, PREC_PRIMARY);
                } else {
                    self.print_property_key(key, computed);
                    self.push(": ");
                    self.print_expr(value, PREC_ASSIGN);
                }
            }
        }
    }

    fn print_property_key(&mut self, key: NodeId, computed: bool) {
        if computed {
            self.push("[");
            self.print_expr(key, PREC_ASSIGN);
            self.push("]");
        } else {
            self.print_expr(key, PREC_PRIMARY);
        }
    }

    fn print_literal(&mut self, value: &Lit) {
        match value {
            Lit::Str(s) => {
                let quoted = js_quote(s);
                self.push(&quoted);
            }
            Lit::Num(n) => {
                let formatted = js_number(*n);
                self.push(&formatted);
            }
            Lit::Bool(b) => self.push(if *b { "true" } else { "false" }),
            Lit::Null => self.push("null"),
        }
    }

    fn expr_prec(&self, kind: &FlatKind) -> u8 {
        match kind {
            FlatKind::SequenceExpression { .. } => PREC_SEQUENCE,
            FlatKind::AssignmentExpression { .. }
            | FlatKind::ConditionalExpression { .. }
            | FlatKind::ArrowFunctionExpression { .. } => PREC_ASSIGN,
            FlatKind::LogicalExpression { op, .. } => match op.as_str() {
                "&&" => PREC_AND,
                _ => PREC_OR,
            },
            FlatKind::BinaryExpression { op, .. } => binary_prec(*op),
            FlatKind::UnaryExpression { .. } => PREC_UNARY,
            FlatKind::UpdateExpression { prefix, .. } => {
                if *prefix {
                    PREC_UNARY
                } else {
                    PREC_POSTFIX
                }
            }
            FlatKind::CallExpression { .. } => PREC_CALL,
            FlatKind::NewExpression { .. } | FlatKind::MemberExpression { .. } => PREC_MEMBER,
            _ => PREC_PRIMARY,
        }
    }

    /// Would this expression, printed at the start of a statement (or arrow
    /// body), be misread as a block or declaration?
    fn starts_ambiguously(&self, id: NodeId) -> bool {
        match &self.nodes[id.index()].kind {
            FlatKind::FunctionExpression { .. } | FlatKind::ObjectExpression { .. } => true,
            FlatKind::BinaryExpression { left, .. }
            | FlatKind::LogicalExpression { left, .. }
            | FlatKind::AssignmentExpression { left, .. } => self.starts_ambiguously(*left),
            FlatKind::ConditionalExpression { test, .. } => self.starts_ambiguously(*test),
            FlatKind::MemberExpression { object, .. } => self.starts_ambiguously(*object),
            FlatKind::CallExpression { callee, .. } => {
                // A function-expression callee is already parenthesized by
                // the call printer.
                !matches!(
                    self.nodes[callee.index()].kind(),
                    Kind::FunctionExpression | Kind::ArrowFunctionExpression
                ) && self.starts_ambiguously(*callee)
            }
            FlatKind::UpdateExpression {
                prefix, argument, ..
            } if !prefix => self.starts_ambiguously(*argument),
            FlatKind::SequenceExpression { expressions } => expressions
                .first()
                .is_some_and(|&e| self.starts_ambiguously(e)),
            _ => false,
        }
    }
}

/// JS-style number formatting: integral values print without a fraction,
/// everything else uses shortest-roundtrip formatting.
pub(crate) fn js_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == n.trunc() && n.abs() < 9e15 {
        return format!("{}", n as i64);
    }
    format!("{n}")
}

/// Single-quoted JS string literal.
pub(crate) fn js_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}
