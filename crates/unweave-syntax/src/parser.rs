//! Recursive-descent parser.
//!
//! One token of lookahead, precedence climbing for binary operators, and the
//! usual hand-written-parser tricks: arrow parameters recovered from a
//! parenthesized expression, `for` heads parsed in no-`in` mode, automatic
//! semicolon insertion at `}` / EOF / line terminators.

use crate::ast::{
    AssignOp, BinaryOp, DeclKind, Lit, LogicalOp, Node, NodeKind, Program, PropertyKind, UnaryOp,
    UpdateOp,
};
use crate::scanner::{Kw, Punct, Scanner, Tok, Token};
use unweave_common::{ParseError, Span};

/// Parse a source text into a Program.
pub fn parse(text: &str) -> Result<Program, ParseError> {
    let mut parser = Parser::new(text)?;
    parser.parse_program()
}

struct Parser<'a> {
    scanner: Scanner<'a>,
    tok: Token,
    prev_end: u32,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Result<Parser<'a>, ParseError> {
        let mut scanner = Scanner::new(text);
        let tok = scanner.next_token()?;
        Ok(Parser {
            scanner,
            tok,
            prev_end: 0,
        })
    }

    // =========================================================================
    // Token plumbing
    // =========================================================================

    fn advance(&mut self) -> Result<(), ParseError> {
        self.prev_end = self.tok.span.end;
        self.tok = self.scanner.next_token()?;
        Ok(())
    }

    fn start(&self) -> u32 {
        self.tok.span.start
    }

    fn finish(&self, start: u32) -> Span {
        Span::new(start, self.prev_end)
    }

    fn is_punct(&self, p: Punct) -> bool {
        self.tok.tok == Tok::Punct(p)
    }

    fn is_kw(&self, kw: Kw) -> bool {
        self.tok.tok == Tok::Keyword(kw)
    }

    fn eat_punct(&mut self, p: Punct) -> Result<bool, ParseError> {
        if self.is_punct(p) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect_punct(&mut self, p: Punct, what: &str) -> Result<(), ParseError> {
        if self.eat_punct(p)? {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn eat_kw(&mut self, kw: Kw) -> Result<bool, ParseError> {
        if self.is_kw(kw) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn unexpected(&self, what: &str) -> ParseError {
        ParseError::new(
            self.tok.span.start,
            format!("expected {what}, found {:?}", self.tok.tok),
        )
    }

    /// Contextual keyword check (`of`).
    fn is_ident(&self, name: &str) -> bool {
        matches!(&self.tok.tok, Tok::Ident(id) if id == name)
    }

    /// Automatic semicolon insertion.
    fn consume_semicolon(&mut self) -> Result<(), ParseError> {
        if self.eat_punct(Punct::Semi)? {
            return Ok(());
        }
        if self.is_punct(Punct::RBrace) || self.tok.tok == Tok::Eof || self.tok.newline_before {
            return Ok(());
        }
        Err(self.unexpected("`;`"))
    }

    // =========================================================================
    // Program & statements
    // =========================================================================

    fn parse_program(&mut self) -> Result<Program, ParseError> {
        let start = self.start();
        let mut body = Vec::new();
        while self.tok.tok != Tok::Eof {
            body.push(self.parse_statement()?);
        }
        let root = Node::new(self.finish(start), NodeKind::Program { body });
        Ok(Program { root })
    }

    fn parse_statement(&mut self) -> Result<Node, ParseError> {
        let start = self.start();
        match &self.tok.tok {
            Tok::Punct(Punct::LBrace) => self.parse_block(),
            Tok::Punct(Punct::Semi) => {
                self.advance()?;
                Ok(Node::new(self.finish(start), NodeKind::EmptyStatement))
            }
            Tok::Keyword(Kw::Var) => self.parse_variable_statement(DeclKind::Var),
            Tok::Keyword(Kw::Const) => self.parse_variable_statement(DeclKind::Const),
            Tok::Keyword(Kw::Let) => self.parse_variable_statement(DeclKind::Let),
            Tok::Keyword(Kw::Function) => self.parse_function_declaration(),
            Tok::Keyword(Kw::Return) => {
                self.advance()?;
                let argument = if self.is_punct(Punct::Semi)
                    || self.is_punct(Punct::RBrace)
                    || self.tok.tok == Tok::Eof
                    || self.tok.newline_before
                {
                    None
                } else {
                    Some(Box::new(self.parse_expression()?))
                };
                self.consume_semicolon()?;
                Ok(Node::new(
                    self.finish(start),
                    NodeKind::ReturnStatement { argument },
                ))
            }
            Tok::Keyword(Kw::If) => {
                self.advance()?;
                self.expect_punct(Punct::LParen, "`(`")?;
                let test = Box::new(self.parse_expression()?);
                self.expect_punct(Punct::RParen, "`)`")?;
                let consequent = Box::new(self.parse_statement()?);
                let alternate = if self.eat_kw(Kw::Else)? {
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Ok(Node::new(
                    self.finish(start),
                    NodeKind::IfStatement {
                        test,
                        consequent,
                        alternate,
                    },
                ))
            }
            Tok::Keyword(Kw::For) => self.parse_for_statement(),
            Tok::Keyword(Kw::While) => {
                self.advance()?;
                self.expect_punct(Punct::LParen, "`(`")?;
                let test = Box::new(self.parse_expression()?);
                self.expect_punct(Punct::RParen, "`)`")?;
                let body = Box::new(self.parse_statement()?);
                Ok(Node::new(
                    self.finish(start),
                    NodeKind::WhileStatement { test, body },
                ))
            }
            Tok::Keyword(Kw::Do) => {
                self.advance()?;
                let body = Box::new(self.parse_statement()?);
                if !self.eat_kw(Kw::While)? {
                    return Err(self.unexpected("`while`"));
                }
                self.expect_punct(Punct::LParen, "`(`")?;
                let test = Box::new(self.parse_expression()?);
                self.expect_punct(Punct::RParen, "`)`")?;
                self.eat_punct(Punct::Semi)?;
                Ok(Node::new(
                    self.finish(start),
                    NodeKind::DoWhileStatement { body, test },
                ))
            }
            Tok::Keyword(Kw::Break) => {
                self.advance()?;
                let label = self.parse_optional_label()?;
                self.consume_semicolon()?;
                Ok(Node::new(
                    self.finish(start),
                    NodeKind::BreakStatement { label },
                ))
            }
            Tok::Keyword(Kw::Continue) => {
                self.advance()?;
                let label = self.parse_optional_label()?;
                self.consume_semicolon()?;
                Ok(Node::new(
                    self.finish(start),
                    NodeKind::ContinueStatement { label },
                ))
            }
            Tok::Keyword(Kw::Throw) => {
                self.advance()?;
                if self.tok.newline_before {
                    return Err(ParseError::new(
                        self.tok.span.start,
                        "newline not allowed after `throw`",
                    ));
                }
                let argument = Box::new(self.parse_expression()?);
                self.consume_semicolon()?;
                Ok(Node::new(
                    self.finish(start),
                    NodeKind::ThrowStatement { argument },
                ))
            }
            Tok::Keyword(Kw::Try) => self.parse_try_statement(),
            Tok::Keyword(Kw::Switch) => self.parse_switch_statement(),
            Tok::Ident(_) => {
                // Could be a labeled statement: `name: stmt`.
                let expr = self.parse_expression()?;
                if let NodeKind::Identifier { .. } = &expr.kind {
                    if self.is_punct(Punct::Colon) {
                        self.advance()?;
                        let body = Box::new(self.parse_statement()?);
                        return Ok(Node::new(
                            self.finish(start),
                            NodeKind::LabeledStatement {
                                label: Box::new(expr),
                                body,
                            },
                        ));
                    }
                }
                self.consume_semicolon()?;
                Ok(Node::new(
                    self.finish(start),
                    NodeKind::ExpressionStatement {
                        expression: Box::new(expr),
                    },
                ))
            }
            _ => {
                let expr = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Node::new(
                    self.finish(start),
                    NodeKind::ExpressionStatement {
                        expression: Box::new(expr),
                    },
                ))
            }
        }
    }

    fn parse_optional_label(&mut self) -> Result<Option<Box<Node>>, ParseError> {
        if self.tok.newline_before {
            return Ok(None);
        }
        if let Tok::Ident(name) = &self.tok.tok {
            let name = name.clone();
            let span = self.tok.span;
            self.advance()?;
            Ok(Some(Box::new(Node::new(
                span,
                NodeKind::Identifier { name },
            ))))
        } else {
            Ok(None)
        }
    }

    fn parse_block(&mut self) -> Result<Node, ParseError> {
        let start = self.start();
        self.expect_punct(Punct::LBrace, "`{`")?;
        let mut body = Vec::new();
        while !self.is_punct(Punct::RBrace) {
            if self.tok.tok == Tok::Eof {
                return Err(self.unexpected("`}`"));
            }
            body.push(self.parse_statement()?);
        }
        self.advance()?;
        Ok(Node::new(self.finish(start), NodeKind::BlockStatement { body }))
    }

    fn parse_variable_statement(&mut self, kind: DeclKind) -> Result<Node, ParseError> {
        let start = self.start();
        let decl = self.parse_variable_declaration(kind, true)?;
        self.consume_semicolon()?;
        Ok(Node::new(self.finish(start), decl.kind))
    }

    /// Parse `var/let/const` declarator list. `allow_in` is false inside a
    /// `for (` head.
    fn parse_variable_declaration(
        &mut self,
        kind: DeclKind,
        allow_in: bool,
    ) -> Result<Node, ParseError> {
        let start = self.start();
        self.advance()?; // var/let/const keyword
        let mut declarations = Vec::new();
        loop {
            let decl_start = self.start();
            let id = Box::new(self.parse_binding_identifier()?);
            let init = if self.eat_punct(Punct::Assign)? {
                Some(Box::new(self.parse_assignment_expr(allow_in)?))
            } else {
                None
            };
            declarations.push(Node::new(
                self.finish(decl_start),
                NodeKind::VariableDeclarator { id, init },
            ));
            if !self.eat_punct(Punct::Comma)? {
                break;
            }
        }
        Ok(Node::new(
            self.finish(start),
            NodeKind::VariableDeclaration { kind, declarations },
        ))
    }

    fn parse_binding_identifier(&mut self) -> Result<Node, ParseError> {
        if let Tok::Ident(name) = &self.tok.tok {
            let name = name.clone();
            let span = self.tok.span;
            self.advance()?;
            Ok(Node::new(span, NodeKind::Identifier { name }))
        } else {
            Err(self.unexpected("binding identifier"))
        }
    }

    fn parse_function_declaration(&mut self) -> Result<Node, ParseError> {
        let start = self.start();
        self.advance()?; // function
        let id = Box::new(self.parse_binding_identifier()?);
        let params = self.parse_params()?;
        let body = Box::new(self.parse_block()?);
        Ok(Node::new(
            self.finish(start),
            NodeKind::FunctionDeclaration { id, params, body },
        ))
    }

    fn parse_params(&mut self) -> Result<Vec<Node>, ParseError> {
        self.expect_punct(Punct::LParen, "`(`")?;
        let mut params = Vec::new();
        while !self.is_punct(Punct::RParen) {
            params.push(self.parse_binding_identifier()?);
            if !self.eat_punct(Punct::Comma)? {
                break;
            }
        }
        self.expect_punct(Punct::RParen, "`)`")?;
        Ok(params)
    }

    fn parse_for_statement(&mut self) -> Result<Node, ParseError> {
        let start = self.start();
        self.advance()?; // for
        self.expect_punct(Punct::LParen, "`(`")?;

        // Empty init.
        if self.eat_punct(Punct::Semi)? {
            return self.parse_for_tail(start, None);
        }

        let init = if self.is_kw(Kw::Var) || self.is_kw(Kw::Let) || self.is_kw(Kw::Const) {
            let kind = match &self.tok.tok {
                Tok::Keyword(Kw::Var) => DeclKind::Var,
                Tok::Keyword(Kw::Let) => DeclKind::Let,
                _ => DeclKind::Const,
            };
            self.parse_variable_declaration(kind, false)?
        } else {
            self.parse_expr_no_in()?
        };

        if self.eat_kw(Kw::In)? {
            let right = Box::new(self.parse_expression()?);
            self.expect_punct(Punct::RParen, "`)`")?;
            let body = Box::new(self.parse_statement()?);
            return Ok(Node::new(
                self.finish(start),
                NodeKind::ForInStatement {
                    left: Box::new(init),
                    right,
                    body,
                },
            ));
        }
        if self.is_ident("of") {
            self.advance()?;
            let right = Box::new(self.parse_assignment_expr(true)?);
            self.expect_punct(Punct::RParen, "`)`")?;
            let body = Box::new(self.parse_statement()?);
            return Ok(Node::new(
                self.finish(start),
                NodeKind::ForOfStatement {
                    left: Box::new(init),
                    right,
                    body,
                },
            ));
        }

        self.expect_punct(Punct::Semi, "`;`")?;
        self.parse_for_tail(start, Some(Box::new(init)))
    }

    fn parse_for_tail(&mut self, start: u32, init: Option<Box<Node>>) -> Result<Node, ParseError> {
        let test = if self.is_punct(Punct::Semi) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.expect_punct(Punct::Semi, "`;`")?;
        let update = if self.is_punct(Punct::RParen) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.expect_punct(Punct::RParen, "`)`")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Node::new(
            self.finish(start),
            NodeKind::ForStatement {
                init,
                test,
                update,
                body,
            },
        ))
    }

    fn parse_try_statement(&mut self) -> Result<Node, ParseError> {
        let start = self.start();
        self.advance()?; // try
        let block = Box::new(self.parse_block()?);
        let handler = if self.eat_kw(Kw::Catch)? {
            let h_start = self.prev_end - 5;
            let param = if self.eat_punct(Punct::LParen)? {
                let p = self.parse_binding_identifier()?;
                self.expect_punct(Punct::RParen, "`)`")?;
                Some(Box::new(p))
            } else {
                None
            };
            let body = Box::new(self.parse_block()?);
            Some(Box::new(Node::new(
                self.finish(h_start),
                NodeKind::CatchClause { param, body },
            )))
        } else {
            None
        };
        let finalizer = if self.eat_kw(Kw::Finally)? {
            Some(Box::new(self.parse_block()?))
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.unexpected("`catch` or `finally`"));
        }
        Ok(Node::new(
            self.finish(start),
            NodeKind::TryStatement {
                block,
                handler,
                finalizer,
            },
        ))
    }

    fn parse_switch_statement(&mut self) -> Result<Node, ParseError> {
        let start = self.start();
        self.advance()?; // switch
        self.expect_punct(Punct::LParen, "`(`")?;
        let discriminant = Box::new(self.parse_expression()?);
        self.expect_punct(Punct::RParen, "`)`")?;
        self.expect_punct(Punct::LBrace, "`{`")?;
        let mut cases = Vec::new();
        while !self.is_punct(Punct::RBrace) {
            let case_start = self.start();
            let test = if self.eat_kw(Kw::Case)? {
                Some(Box::new(self.parse_expression()?))
            } else if self.eat_kw(Kw::Default)? {
                None
            } else {
                return Err(self.unexpected("`case` or `default`"));
            };
            self.expect_punct(Punct::Colon, "`:`")?;
            let mut consequent = Vec::new();
            while !self.is_punct(Punct::RBrace)
                && !self.is_kw(Kw::Case)
                && !self.is_kw(Kw::Default)
            {
                consequent.push(self.parse_statement()?);
            }
            cases.push(Node::new(
                self.finish(case_start),
                NodeKind::SwitchCase { test, consequent },
            ));
        }
        self.advance()?; // }
        Ok(Node::new(
            self.finish(start),
            NodeKind::SwitchStatement {
                discriminant,
                cases,
            },
        ))
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn parse_expression(&mut self) -> Result<Node, ParseError> {
        self.parse_expr(true)
    }

    fn parse_expr_no_in(&mut self) -> Result<Node, ParseError> {
        self.parse_expr(false)
    }

    /// Comma-sequence level.
    fn parse_expr(&mut self, allow_in: bool) -> Result<Node, ParseError> {
        let start = self.start();
        let first = self.parse_assignment_expr(allow_in)?;
        if !self.is_punct(Punct::Comma) {
            return Ok(first);
        }
        let mut expressions = vec![first];
        while self.eat_punct(Punct::Comma)? {
            expressions.push(self.parse_assignment_expr(allow_in)?);
        }
        Ok(Node::new(
            self.finish(start),
            NodeKind::SequenceExpression { expressions },
        ))
    }

    fn parse_assignment_expr(&mut self, allow_in: bool) -> Result<Node, ParseError> {
        let start = self.start();
        let left = self.parse_conditional(allow_in)?;

        // Arrow function: `x => …` or `(a, b) => …` (recovered from the
        // already-parsed head).
        if self.is_punct(Punct::Arrow) && !self.tok.newline_before {
            if let Some(params) = arrow_params_from_expr(&left) {
                self.advance()?;
                let (body, expression) = if self.is_punct(Punct::LBrace) {
                    (self.parse_block()?, false)
                } else {
                    (self.parse_assignment_expr(allow_in)?, true)
                };
                return Ok(Node::new(
                    self.finish(start),
                    NodeKind::ArrowFunctionExpression {
                        params,
                        body: Box::new(body),
                        expression,
                    },
                ));
            }
        }

        let op = match &self.tok.tok {
            Tok::Punct(Punct::Assign) => Some(AssignOp::Assign),
            Tok::Punct(Punct::PlusAssign) => Some(AssignOp::Add),
            Tok::Punct(Punct::MinusAssign) => Some(AssignOp::Sub),
            Tok::Punct(Punct::StarAssign) => Some(AssignOp::Mul),
            Tok::Punct(Punct::SlashAssign) => Some(AssignOp::Div),
            Tok::Punct(Punct::PercentAssign) => Some(AssignOp::Rem),
            Tok::Punct(Punct::ShlAssign) => Some(AssignOp::Shl),
            Tok::Punct(Punct::ShrAssign) => Some(AssignOp::Shr),
            Tok::Punct(Punct::UShrAssign) => Some(AssignOp::UShr),
            Tok::Punct(Punct::AmpAssign) => Some(AssignOp::BitAnd),
            Tok::Punct(Punct::PipeAssign) => Some(AssignOp::BitOr),
            Tok::Punct(Punct::CaretAssign) => Some(AssignOp::BitXor),
            _ => None,
        };

        if let Some(op) = op {
            if !is_assignment_target(&left) {
                return Err(ParseError::new(
                    left.span.start,
                    "invalid assignment target",
                ));
            }
            self.advance()?;
            let right = Box::new(self.parse_assignment_expr(allow_in)?);
            return Ok(Node::new(
                self.finish(start),
                NodeKind::AssignmentExpression {
                    op,
                    left: Box::new(left),
                    right,
                },
            ));
        }

        Ok(left)
    }

    fn parse_conditional(&mut self, allow_in: bool) -> Result<Node, ParseError> {
        let start = self.start();
        let test = self.parse_binary(0, allow_in)?;
        if !self.eat_punct(Punct::Question)? {
            return Ok(test);
        }
        let consequent = Box::new(self.parse_assignment_expr(true)?);
        self.expect_punct(Punct::Colon, "`:`")?;
        let alternate = Box::new(self.parse_assignment_expr(allow_in)?);
        Ok(Node::new(
            self.finish(start),
            NodeKind::ConditionalExpression {
                test: Box::new(test),
                consequent,
                alternate,
            },
        ))
    }

    /// Precedence climbing over binary and logical operators.
    fn parse_binary(&mut self, min_prec: u8, allow_in: bool) -> Result<Node, ParseError> {
        let start = self.start();
        let mut left = self.parse_unary(allow_in)?;

        loop {
            let Some((prec, bin_op, logical_op)) = self.peek_binary_op(allow_in) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.advance()?;
            // `**` is right-associative; everything else left.
            let next_min = if bin_op == Some(BinaryOp::Exp) {
                prec
            } else {
                prec + 1
            };
            let right = self.parse_binary(next_min, allow_in)?;
            let span = self.finish(start);
            left = match (bin_op, logical_op) {
                (_, Some(op)) => Node::new(
                    span,
                    NodeKind::LogicalExpression {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                ),
                (Some(op), None) => Node::new(
                    span,
                    NodeKind::BinaryExpression {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                ),
                (None, None) => unreachable!("operator table always sets one side"),
            };
        }
        Ok(left)
    }

    fn peek_binary_op(&self, allow_in: bool) -> Option<(u8, Option<BinaryOp>, Option<LogicalOp>)> {
        let (prec, bin, logical) = match &self.tok.tok {
            Tok::Punct(Punct::PipePipe) => (1, None, Some(LogicalOp::Or)),
            Tok::Punct(Punct::AmpAmp) => (2, None, Some(LogicalOp::And)),
            Tok::Punct(Punct::Pipe) => (3, Some(BinaryOp::BitOr), None),
            Tok::Punct(Punct::Caret) => (4, Some(BinaryOp::BitXor), None),
            Tok::Punct(Punct::Amp) => (5, Some(BinaryOp::BitAnd), None),
            Tok::Punct(Punct::EqEq) => (6, Some(BinaryOp::EqEq), None),
            Tok::Punct(Punct::NotEq) => (6, Some(BinaryOp::NotEq), None),
            Tok::Punct(Punct::StrictEq) => (6, Some(BinaryOp::StrictEq), None),
            Tok::Punct(Punct::StrictNotEq) => (6, Some(BinaryOp::StrictNotEq), None),
            Tok::Punct(Punct::Lt) => (7, Some(BinaryOp::Lt), None),
            Tok::Punct(Punct::Gt) => (7, Some(BinaryOp::Gt), None),
            Tok::Punct(Punct::LtEq) => (7, Some(BinaryOp::LtEq), None),
            Tok::Punct(Punct::GtEq) => (7, Some(BinaryOp::GtEq), None),
            Tok::Keyword(Kw::Instanceof) => (7, Some(BinaryOp::Instanceof), None),
            Tok::Keyword(Kw::In) if allow_in => (7, Some(BinaryOp::In), None),
            Tok::Punct(Punct::Shl) => (8, Some(BinaryOp::Shl), None),
            Tok::Punct(Punct::Shr) => (8, Some(BinaryOp::Shr), None),
            Tok::Punct(Punct::UShr) => (8, Some(BinaryOp::UShr), None),
            Tok::Punct(Punct::Plus) => (9, Some(BinaryOp::Add), None),
            Tok::Punct(Punct::Minus) => (9, Some(BinaryOp::Sub), None),
            Tok::Punct(Punct::Star) => (10, Some(BinaryOp::Mul), None),
            Tok::Punct(Punct::Slash) => (10, Some(BinaryOp::Div), None),
            Tok::Punct(Punct::Percent) => (10, Some(BinaryOp::Rem), None),
            Tok::Punct(Punct::StarStar) => (11, Some(BinaryOp::Exp), None),
            _ => return None,
        };
        Some((prec, bin, logical))
    }

    fn parse_unary(&mut self, allow_in: bool) -> Result<Node, ParseError> {
        let start = self.start();
        let op = match &self.tok.tok {
            Tok::Punct(Punct::Bang) => Some(UnaryOp::Not),
            Tok::Punct(Punct::Tilde) => Some(UnaryOp::BitNot),
            Tok::Punct(Punct::Plus) => Some(UnaryOp::Plus),
            Tok::Punct(Punct::Minus) => Some(UnaryOp::Minus),
            Tok::Keyword(Kw::Typeof) => Some(UnaryOp::Typeof),
            Tok::Keyword(Kw::Void) => Some(UnaryOp::Void),
            Tok::Keyword(Kw::Delete) => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.advance()?;
            let argument = Box::new(self.parse_unary(allow_in)?);
            return Ok(Node::new(
                self.finish(start),
                NodeKind::UnaryExpression { op, argument },
            ));
        }

        if self.is_punct(Punct::PlusPlus) || self.is_punct(Punct::MinusMinus) {
            let op = if self.is_punct(Punct::PlusPlus) {
                UpdateOp::Inc
            } else {
                UpdateOp::Dec
            };
            self.advance()?;
            let argument = Box::new(self.parse_unary(allow_in)?);
            return Ok(Node::new(
                self.finish(start),
                NodeKind::UpdateExpression {
                    op,
                    prefix: true,
                    argument,
                },
            ));
        }

        let mut expr = self.parse_call_member(allow_in)?;

        // Postfix update: no newline allowed before the operator.
        if (self.is_punct(Punct::PlusPlus) || self.is_punct(Punct::MinusMinus))
            && !self.tok.newline_before
        {
            let op = if self.is_punct(Punct::PlusPlus) {
                UpdateOp::Inc
            } else {
                UpdateOp::Dec
            };
            self.advance()?;
            expr = Node::new(
                self.finish(start),
                NodeKind::UpdateExpression {
                    op,
                    prefix: false,
                    argument: Box::new(expr),
                },
            );
        }
        Ok(expr)
    }

    fn parse_call_member(&mut self, allow_in: bool) -> Result<Node, ParseError> {
        let start = self.start();
        let mut expr = if self.is_kw(Kw::New) {
            self.parse_new(allow_in)?
        } else {
            self.parse_primary(allow_in)?
        };

        loop {
            if self.eat_punct(Punct::Dot)? {
                let property = self.parse_property_name_after_dot()?;
                expr = Node::new(
                    self.finish(start),
                    NodeKind::MemberExpression {
                        object: Box::new(expr),
                        property: Box::new(property),
                        computed: false,
                    },
                );
            } else if self.eat_punct(Punct::LBracket)? {
                let property = self.parse_expression()?;
                self.expect_punct(Punct::RBracket, "`]`")?;
                expr = Node::new(
                    self.finish(start),
                    NodeKind::MemberExpression {
                        object: Box::new(expr),
                        property: Box::new(property),
                        computed: true,
                    },
                );
            } else if self.is_punct(Punct::LParen) {
                let arguments = self.parse_arguments()?;
                expr = Node::new(
                    self.finish(start),
                    NodeKind::CallExpression {
                        callee: Box::new(expr),
                        arguments,
                    },
                );
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// After `.` any identifier-like word is a property name, keywords
    /// included (`a.delete`, `a.in`).
    fn parse_property_name_after_dot(&mut self) -> Result<Node, ParseError> {
        let span = self.tok.span;
        let name = match &self.tok.tok {
            Tok::Ident(name) => name.clone(),
            Tok::Keyword(kw) => keyword_text(*kw).to_string(),
            _ => return Err(self.unexpected("property name")),
        };
        self.advance()?;
        Ok(Node::new(span, NodeKind::Identifier { name }))
    }

    fn parse_new(&mut self, allow_in: bool) -> Result<Node, ParseError> {
        let start = self.start();
        self.advance()?; // new
        let callee = if self.is_kw(Kw::New) {
            self.parse_new(allow_in)?
        } else {
            let mut callee = self.parse_primary(allow_in)?;
            // Member chain binds tighter than the `new` call.
            loop {
                if self.eat_punct(Punct::Dot)? {
                    let property = self.parse_property_name_after_dot()?;
                    callee = Node::new(
                        self.finish(start),
                        NodeKind::MemberExpression {
                            object: Box::new(callee),
                            property: Box::new(property),
                            computed: false,
                        },
                    );
                } else if self.eat_punct(Punct::LBracket)? {
                    let property = self.parse_expression()?;
                    self.expect_punct(Punct::RBracket, "`]`")?;
                    callee = Node::new(
                        self.finish(start),
                        NodeKind::MemberExpression {
                            object: Box::new(callee),
                            property: Box::new(property),
                            computed: true,
                        },
                    );
                } else {
                    break;
                }
            }
            callee
        };
        let arguments = if self.is_punct(Punct::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Node::new(
            self.finish(start),
            NodeKind::NewExpression {
                callee: Box::new(callee),
                arguments,
            },
        ))
    }

    fn parse_arguments(&mut self) -> Result<Vec<Node>, ParseError> {
        self.expect_punct(Punct::LParen, "`(`")?;
        let mut arguments = Vec::new();
        while !self.is_punct(Punct::RParen) {
            arguments.push(self.parse_assignment_expr(true)?);
            if !self.eat_punct(Punct::Comma)? {
                break;
            }
        }
        self.expect_punct(Punct::RParen, "`)`")?;
        Ok(arguments)
    }

    fn parse_primary(&mut self, _allow_in: bool) -> Result<Node, ParseError> {
        let start = self.start();
        let span = self.tok.span;
        match self.tok.tok.clone() {
            Tok::Num(value) => {
                self.advance()?;
                Ok(Node::new(
                    span,
                    NodeKind::Literal {
                        value: Lit::Num(value),
                    },
                ))
            }
            Tok::Str(value) => {
                self.advance()?;
                Ok(Node::new(
                    span,
                    NodeKind::Literal {
                        value: Lit::Str(value),
                    },
                ))
            }
            Tok::BigInt(text) => {
                self.advance()?;
                Ok(Node::new(span, NodeKind::BigIntLiteral { text }))
            }
            Tok::Regex { pattern, flags } => {
                self.advance()?;
                Ok(Node::new(span, NodeKind::RegExpLiteral { pattern, flags }))
            }
            Tok::Ident(name) => {
                self.advance()?;
                Ok(Node::new(span, NodeKind::Identifier { name }))
            }
            Tok::Keyword(Kw::True) => {
                self.advance()?;
                Ok(Node::new(
                    span,
                    NodeKind::Literal {
                        value: Lit::Bool(true),
                    },
                ))
            }
            Tok::Keyword(Kw::False) => {
                self.advance()?;
                Ok(Node::new(
                    span,
                    NodeKind::Literal {
                        value: Lit::Bool(false),
                    },
                ))
            }
            Tok::Keyword(Kw::Null) => {
                self.advance()?;
                Ok(Node::new(span, NodeKind::Literal { value: Lit::Null }))
            }
            Tok::Keyword(Kw::This) => {
                self.advance()?;
                Ok(Node::new(span, NodeKind::ThisExpression))
            }
            Tok::Keyword(Kw::Function) => self.parse_function_expression(),
            Tok::Punct(Punct::LParen) => {
                self.advance()?;
                // `() => …` has no expression head to recover params from.
                if self.is_punct(Punct::RParen) {
                    self.advance()?;
                    if self.is_punct(Punct::Arrow) && !self.tok.newline_before {
                        self.advance()?;
                        let (body, expression) = if self.is_punct(Punct::LBrace) {
                            (self.parse_block()?, false)
                        } else {
                            (self.parse_assignment_expr(true)?, true)
                        };
                        return Ok(Node::new(
                            self.finish(start),
                            NodeKind::ArrowFunctionExpression {
                                params: Vec::new(),
                                body: Box::new(body),
                                expression,
                            },
                        ));
                    }
                    return Err(self.unexpected("`=>`"));
                }
                let expr = self.parse_expression()?;
                self.expect_punct(Punct::RParen, "`)`")?;
                Ok(expr)
            }
            Tok::Punct(Punct::LBracket) => self.parse_array_literal(),
            Tok::Punct(Punct::LBrace) => self.parse_object_literal(),
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_function_expression(&mut self) -> Result<Node, ParseError> {
        let start = self.start();
        self.advance()?; // function
        let id = if let Tok::Ident(_) = &self.tok.tok {
            Some(Box::new(self.parse_binding_identifier()?))
        } else {
            None
        };
        let params = self.parse_params()?;
        let body = Box::new(self.parse_block()?);
        Ok(Node::new(
            self.finish(start),
            NodeKind::FunctionExpression { id, params, body },
        ))
    }

    fn parse_array_literal(&mut self) -> Result<Node, ParseError> {
        let start = self.start();
        self.advance()?; // [
        let mut elements = Vec::new();
        loop {
            if self.is_punct(Punct::RBracket) {
                break;
            }
            if self.eat_punct(Punct::Comma)? {
                elements.push(None); // elision
                continue;
            }
            elements.push(Some(self.parse_assignment_expr(true)?));
            if !self.eat_punct(Punct::Comma)? {
                break;
            }
        }
        self.expect_punct(Punct::RBracket, "`]`")?;
        Ok(Node::new(
            self.finish(start),
            NodeKind::ArrayExpression { elements },
        ))
    }

    fn parse_object_literal(&mut self) -> Result<Node, ParseError> {
        let start = self.start();
        self.advance()?; // {
        let mut properties = Vec::new();
        while !self.is_punct(Punct::RBrace) {
            properties.push(self.parse_property()?);
            if !self.eat_punct(Punct::Comma)? {
                break;
            }
        }
        self.expect_punct(Punct::RBrace, "`}`")?;
        Ok(Node::new(
            self.finish(start),
            NodeKind::ObjectExpression { properties },
        ))
    }

    fn parse_property(&mut self) -> Result<Node, ParseError> {
        let start = self.start();

        // get/set accessors, unless `get`/`set` is itself the key.
        if let Tok::Ident(word) = &self.tok.tok {
            if word == "get" || word == "set" {
                let accessor_kind = if word == "get" {
                    PropertyKind::Get
                } else {
                    PropertyKind::Set
                };
                let word = word.clone();
                let word_span = self.tok.span;
                self.advance()?;
                if !self.is_punct(Punct::Colon)
                    && !self.is_punct(Punct::Comma)
                    && !self.is_punct(Punct::RBrace)
                    && !self.is_punct(Punct::LParen)
                {
                    let key = Box::new(self.parse_property_key()?);
                    let fn_start = self.start();
                    let params = self.parse_params()?;
                    let body = Box::new(self.parse_block()?);
                    let value = Node::new(
                        self.finish(fn_start),
                        NodeKind::FunctionExpression {
                            id: None,
                            params,
                            body,
                        },
                    );
                    return Ok(Node::new(
                        self.finish(start),
                        NodeKind::Property {
                            key,
                            value: Box::new(value),
                            computed: false,
                            shorthand: false,
                            kind: accessor_kind,
                        },
                    ));
                }
                // Not an accessor after all: `get`/`set` was the key itself,
                // already consumed.
                let key = Node::new(word_span, NodeKind::Identifier { name: word });
                return self.parse_property_with(start, key, false);
            }
        }

        let computed = self.is_punct(Punct::LBracket);
        let key = self.parse_property_key()?;
        self.parse_property_with(start, key, computed)
    }

    fn parse_property_with(
        &mut self,
        start: u32,
        key: Node,
        computed: bool,
    ) -> Result<Node, ParseError> {
        if self.eat_punct(Punct::Colon)? {
            let value = Box::new(self.parse_assignment_expr(true)?);
            return Ok(Node::new(
                self.finish(start),
                NodeKind::Property {
                    key: Box::new(key),
                    value,
                    computed,
                    shorthand: false,
                    kind: PropertyKind::Init,
                },
            ));
        }
        // Method shorthand: `foo() { … }`.
        if self.is_punct(Punct::LParen) {
            let fn_start = self.start();
            let params = self.parse_params()?;
            let body = Box::new(self.parse_block()?);
            let value = Node::new(
                self.finish(fn_start),
                NodeKind::FunctionExpression {
                    id: None,
                    params,
                    body,
                },
            );
            return Ok(Node::new(
                self.finish(start),
                NodeKind::Property {
                    key: Box::new(key),
                    value: Box::new(value),
                    computed,
                    shorthand: false,
                    kind: PropertyKind::Init,
                },
            ));
        }
        // Shorthand `{ a }`: the value is the same identifier.
        if let NodeKind::Identifier { name } = &key.kind {
            let value = Node::new(key.span, NodeKind::Identifier { name: name.clone() });
            return Ok(Node::new(
                self.finish(start),
                NodeKind::Property {
                    key: Box::new(key),
                    value: Box::new(value),
                    computed: false,
                    shorthand: true,
                    kind: PropertyKind::Init,
                },
            ));
        }
        Err(self.unexpected("`:`"))
    }

    fn parse_property_key(&mut self) -> Result<Node, ParseError> {
        let span = self.tok.span;
        match self.tok.tok.clone() {
            Tok::Ident(name) => {
                self.advance()?;
                Ok(Node::new(span, NodeKind::Identifier { name }))
            }
            Tok::Keyword(kw) => {
                self.advance()?;
                Ok(Node::new(
                    span,
                    NodeKind::Identifier {
                        name: keyword_text(kw).to_string(),
                    },
                ))
            }
            Tok::Str(value) => {
                self.advance()?;
                Ok(Node::new(
                    span,
                    NodeKind::Literal {
                        value: Lit::Str(value),
                    },
                ))
            }
            Tok::Num(value) => {
                self.advance()?;
                Ok(Node::new(
                    span,
                    NodeKind::Literal {
                        value: Lit::Num(value),
                    },
                ))
            }
            Tok::Punct(Punct::LBracket) => {
                self.advance()?;
                let key = self.parse_assignment_expr(true)?;
                self.expect_punct(Punct::RBracket, "`]`")?;
                Ok(key)
            }
            _ => Err(self.unexpected("property key")),
        }
    }
}

/// Recover arrow parameters from a parsed parenthesized head.
fn arrow_params_from_expr(expr: &Node) -> Option<Vec<Node>> {
    match &expr.kind {
        NodeKind::Identifier { .. } => Some(vec![expr.clone()]),
        NodeKind::SequenceExpression { expressions } => {
            let mut params = Vec::new();
            for e in expressions {
                if let NodeKind::Identifier { .. } = &e.kind {
                    params.push(e.clone());
                } else {
                    return None;
                }
            }
            Some(params)
        }
        _ => None,
    }
}

fn is_assignment_target(node: &Node) -> bool {
    matches!(
        node.kind,
        NodeKind::Identifier { .. } | NodeKind::MemberExpression { .. }
    )
}

fn keyword_text(kw: Kw) -> &'static str {
    match kw {
        Kw::Var => "var",
        Kw::Let => "let",
        Kw::Const => "const",
        Kw::Function => "function",
        Kw::Return => "return",
        Kw::If => "if",
        Kw::Else => "else",
        Kw::For => "for",
        Kw::In => "in",
        Kw::While => "while",
        Kw::Do => "do",
        Kw::Break => "break",
        Kw::Continue => "continue",
        Kw::New => "new",
        Kw::Delete => "delete",
        Kw::Typeof => "typeof",
        Kw::Void => "void",
        Kw::Instanceof => "instanceof",
        Kw::This => "this",
        Kw::Null => "null",
        Kw::True => "true",
        Kw::False => "false",
        Kw::Throw => "throw",
        Kw::Try => "try",
        Kw::Catch => "catch",
        Kw::Finally => "finally",
        Kw::Switch => "switch",
        Kw::Case => "case",
        Kw::Default => "default",
    }
}

#[cfg(test)]
#[path = "tests/parser.rs"]
mod tests;
