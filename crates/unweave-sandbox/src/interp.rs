//! Tree-walking interpreter over the syntax AST.
//!
//! Executes fragments with JS coercion semantics under a fuel and wall-clock
//! budget. Anything outside the supported pure subset throws inside the VM,
//! which the caller observes as a bad-value verdict: the engine fails closed
//! rather than folding wrong constants.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use unweave_syntax::ast::{
    AssignOp, BinaryOp, Lit, LogicalOp, Node, NodeKind, UnaryOp, UpdateOp,
};

use crate::builtins;
use crate::value::{number_to_string, Callable, FunctionData, RegexValue, Value};

pub type EnvRef = Rc<RefCell<Env>>;

pub struct Env {
    vars: FxHashMap<String, Value>,
    parent: Option<EnvRef>,
}

impl Env {
    pub fn root() -> EnvRef {
        Rc::new(RefCell::new(Env {
            vars: FxHashMap::default(),
            parent: None,
        }))
    }

    pub fn child(parent: &EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Env {
            vars: FxHashMap::default(),
            parent: Some(parent.clone()),
        }))
    }

    pub fn declare(env: &EnvRef, name: &str, value: Value) {
        env.borrow_mut().vars.insert(name.to_string(), value);
    }

    pub fn lookup(env: &EnvRef, name: &str) -> Option<Value> {
        let mut cur = env.clone();
        loop {
            if let Some(v) = cur.borrow().vars.get(name) {
                return Some(v.clone());
            }
            let parent = cur.borrow().parent.clone();
            match parent {
                Some(p) => cur = p,
                None => return None,
            }
        }
    }

    /// Assign to an existing binding; reports whether one was found.
    pub fn assign(env: &EnvRef, name: &str, value: Value) -> bool {
        let mut cur = env.clone();
        loop {
            if cur.borrow().vars.contains_key(name) {
                cur.borrow_mut().vars.insert(name.to_string(), value);
                return true;
            }
            let parent = cur.borrow().parent.clone();
            match parent {
                Some(p) => cur = p,
                None => return false,
            }
        }
    }
}

/// Abrupt completion.
#[derive(Debug)]
pub enum Signal {
    Return(Value),
    Break(Option<String>),
    Continue(Option<String>),
    Throw(Value),
    OutOfBudget,
}

pub type Eval = Result<Value, Signal>;

fn throw(msg: impl Into<String>) -> Signal {
    Signal::Throw(Value::str(msg.into()))
}

/// Execution budget for one `eval_in_vm` call.
#[derive(Clone, Copy, Debug)]
pub struct Budget {
    pub wall: Duration,
    pub fuel: u64,
}

impl Default for Budget {
    fn default() -> Budget {
        Budget {
            wall: Duration::from_secs(10),
            fuel: 50_000_000,
        }
    }
}

pub struct Interp {
    pub global: EnvRef,
    budget: Budget,
    deadline: Instant,
    fuel: u64,
    steps_since_clock: u32,
    /// Label attached to the loop about to start (set by LabeledStatement,
    /// taken by the loop driver).
    pending_label: Option<String>,
}

impl Interp {
    pub fn new(budget: Budget) -> Interp {
        let global = Env::root();
        builtins::install(&global);
        Env::declare(&global, "this", Value::Undefined);
        Interp {
            global,
            budget,
            deadline: Instant::now() + budget.wall,
            fuel: budget.fuel,
            steps_since_clock: 0,
            pending_label: None,
        }
    }

    /// Reset the budget counters for a fresh top-level call.
    pub fn begin_call(&mut self) {
        self.deadline = Instant::now() + self.budget.wall;
        self.fuel = self.budget.fuel;
        self.steps_since_clock = 0;
    }

    fn step(&mut self) -> Result<(), Signal> {
        if self.fuel == 0 {
            return Err(Signal::OutOfBudget);
        }
        self.fuel -= 1;
        self.steps_since_clock += 1;
        if self.steps_since_clock >= 4096 {
            self.steps_since_clock = 0;
            if Instant::now() >= self.deadline {
                return Err(Signal::OutOfBudget);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Programs & statements
    // =========================================================================

    /// Run a program in the global environment; the completion value is the
    /// last expression statement's value, REPL style.
    pub fn eval_program(&mut self, root: &Node) -> Eval {
        let NodeKind::Program { body } = &root.kind else {
            return Err(throw("not a program"));
        };
        let env = self.global.clone();
        self.exec_stmts(body, &env)
    }

    fn exec_stmts(&mut self, stmts: &[Node], env: &EnvRef) -> Eval {
        self.hoist(stmts, env)?;
        let mut completion = Value::Undefined;
        for stmt in stmts {
            if let Some(value) = self.exec_stmt(stmt, env)? {
                completion = value;
            }
        }
        Ok(completion)
    }

    /// Function-or-program entry hoisting: function declarations plus
    /// pre-declared `var` slots for the whole nested statement tree.
    fn hoist(&mut self, stmts: &[Node], env: &EnvRef) -> Result<(), Signal> {
        self.hoist_functions(stmts, env)?;
        let mut var_names = Vec::new();
        for stmt in stmts {
            collect_var_names(stmt, &mut var_names);
        }
        for name in var_names {
            if Env::lookup(env, &name).is_none() {
                Env::declare(env, &name, Value::Undefined);
            }
        }
        Ok(())
    }

    /// Blocks hoist only their function declarations; `var` slots already
    /// live on the enclosing function environment.
    fn hoist_functions(&mut self, stmts: &[Node], env: &EnvRef) -> Result<(), Signal> {
        for stmt in stmts {
            if let NodeKind::FunctionDeclaration { id, params, body } = &stmt.kind {
                let Some(name) = id.ident_name() else { continue };
                let func = self.make_function(
                    name.to_string(),
                    params,
                    (**body).clone(),
                    false,
                    false,
                    env,
                );
                Env::declare(env, name, func);
            }
        }
        Ok(())
    }

    fn make_function(
        &mut self,
        name: String,
        params: &[Node],
        body: Node,
        is_expr_body: bool,
        is_arrow: bool,
        env: &EnvRef,
    ) -> Value {
        let params = params
            .iter()
            .filter_map(|p| p.ident_name().map(str::to_owned))
            .collect();
        Value::Function(Rc::new(FunctionData {
            name,
            callable: Callable::User {
                params,
                body: Rc::new(body),
                is_expr_body,
                env: env.clone(),
                is_arrow,
            },
            props: RefCell::new(Vec::new()),
        }))
    }

    /// Returns the statement's completion value, when it has one.
    fn exec_stmt(&mut self, stmt: &Node, env: &EnvRef) -> Result<Option<Value>, Signal> {
        self.step()?;
        match &stmt.kind {
            NodeKind::ExpressionStatement { expression } => {
                Ok(Some(self.eval_expr(expression, env)?))
            }
            NodeKind::EmptyStatement | NodeKind::FunctionDeclaration { .. } => Ok(None),
            NodeKind::VariableDeclaration { declarations, .. } => {
                for decl in declarations {
                    let NodeKind::VariableDeclarator { id, init } = &decl.kind else {
                        continue;
                    };
                    let Some(name) = id.ident_name() else { continue };
                    let value = match init {
                        Some(init) => self.eval_expr(init, env)?,
                        None => Value::Undefined,
                    };
                    // `var` slots were pre-declared during hoisting; `let`
                    // and `const` land in the current env either way.
                    if !Env::assign(env, name, value.clone()) {
                        Env::declare(env, name, value);
                    }
                }
                Ok(None)
            }
            NodeKind::BlockStatement { body } => {
                let child = Env::child(env);
                self.hoist_functions(body, &child)?;
                let mut completion = None;
                for stmt in body {
                    if let Some(v) = self.exec_stmt(stmt, &child)? {
                        completion = Some(v);
                    }
                }
                Ok(completion)
            }
            NodeKind::ReturnStatement { argument } => {
                let value = match argument {
                    Some(arg) => self.eval_expr(arg, env)?,
                    None => Value::Undefined,
                };
                Err(Signal::Return(value))
            }
            NodeKind::IfStatement {
                test,
                consequent,
                alternate,
            } => {
                if self.eval_expr(test, env)?.is_truthy() {
                    self.exec_stmt(consequent, env)
                } else if let Some(alternate) = alternate {
                    self.exec_stmt(alternate, env)
                } else {
                    Ok(None)
                }
            }
            NodeKind::WhileStatement { test, body } => {
                self.run_loop(env, |interp, env| {
                    if !interp.eval_expr(test, env)?.is_truthy() {
                        return Ok(false);
                    }
                    interp.exec_stmt(body, env)?;
                    Ok(true)
                })
            }
            NodeKind::DoWhileStatement { body, test } => {
                let mut first = true;
                self.run_loop(env, |interp, env| {
                    if !first && !interp.eval_expr(test, env)?.is_truthy() {
                        return Ok(false);
                    }
                    first = false;
                    interp.exec_stmt(body, env)?;
                    Ok(true)
                })
            }
            NodeKind::ForStatement {
                init,
                test,
                update,
                body,
            } => {
                let loop_env = Env::child(env);
                if let Some(init) = init {
                    if init.is_statement() {
                        self.exec_stmt(init, &loop_env)?;
                    } else {
                        self.eval_expr(init, &loop_env)?;
                    }
                }
                let mut started = false;
                self.run_loop(&loop_env, |interp, env| {
                    if started {
                        if let Some(update) = update {
                            interp.eval_expr(update, env)?;
                        }
                    }
                    started = true;
                    if let Some(test) = test {
                        if !interp.eval_expr(test, env)?.is_truthy() {
                            return Ok(false);
                        }
                    }
                    interp.exec_stmt(body, env)?;
                    Ok(true)
                })
            }
            NodeKind::ForInStatement { left, right, body } => {
                let object = self.eval_expr(right, env)?;
                let keys: Vec<String> = match &object {
                    Value::Array(items) => {
                        (0..items.borrow().len()).map(|i| i.to_string()).collect()
                    }
                    Value::Object(obj) => {
                        obj.borrow().props.iter().map(|(k, _)| k.clone()).collect()
                    }
                    Value::Str(s) => (0..s.encode_utf16().count())
                        .map(|i| i.to_string())
                        .collect(),
                    _ => Vec::new(),
                };
                let loop_env = Env::child(env);
                let mut iter = keys.into_iter();
                self.run_loop(&loop_env, |interp, env| {
                    let Some(key) = iter.next() else {
                        return Ok(false);
                    };
                    interp.bind_for_target(left, Value::str(key), env)?;
                    interp.exec_stmt(body, env)?;
                    Ok(true)
                })
            }
            NodeKind::ForOfStatement { left, right, body } => {
                let iterable = self.eval_expr(right, env)?;
                let items: Vec<Value> = match &iterable {
                    Value::Array(items) => items.borrow().clone(),
                    Value::Str(s) => s.chars().map(|c| Value::str(c.to_string())).collect(),
                    _ => return Err(throw("value is not iterable")),
                };
                let loop_env = Env::child(env);
                let mut iter = items.into_iter();
                self.run_loop(&loop_env, |interp, env| {
                    let Some(item) = iter.next() else {
                        return Ok(false);
                    };
                    interp.bind_for_target(left, item, env)?;
                    interp.exec_stmt(body, env)?;
                    Ok(true)
                })
            }
            NodeKind::BreakStatement { label } => Err(Signal::Break(
                label.as_ref().and_then(|l| l.ident_name()).map(str::to_owned),
            )),
            NodeKind::ContinueStatement { label } => Err(Signal::Continue(
                label.as_ref().and_then(|l| l.ident_name()).map(str::to_owned),
            )),
            NodeKind::LabeledStatement { label, body } => {
                let name = label.ident_name().unwrap_or_default().to_string();
                match self.exec_labeled(body, env, &name) {
                    Err(Signal::Break(Some(l))) if l == name => Ok(None),
                    other => other,
                }
            }
            NodeKind::ThrowStatement { argument } => {
                let value = self.eval_expr(argument, env)?;
                Err(Signal::Throw(value))
            }
            NodeKind::TryStatement {
                block,
                handler,
                finalizer,
            } => {
                let mut result = self.exec_stmt(block, env);
                if let (Err(Signal::Throw(err)), Some(handler)) = (&result, handler) {
                    let NodeKind::CatchClause { param, body } = &handler.kind else {
                        return Err(throw("malformed catch clause"));
                    };
                    let catch_env = Env::child(env);
                    if let Some(param) = param {
                        if let Some(name) = param.ident_name() {
                            Env::declare(&catch_env, name, err.clone());
                        }
                    }
                    result = self.exec_stmt(body, &catch_env);
                }
                if let Some(finalizer) = finalizer {
                    // An abrupt finalizer wins over the try/catch outcome.
                    self.exec_stmt(finalizer, env)?;
                }
                result
            }
            NodeKind::SwitchStatement {
                discriminant,
                cases,
            } => {
                let value = self.eval_expr(discriminant, env)?;
                let switch_env = Env::child(env);
                let mut start = None;
                for (i, case) in cases.iter().enumerate() {
                    let NodeKind::SwitchCase { test: Some(test), .. } = &case.kind else {
                        continue;
                    };
                    let test_value = self.eval_expr(test, &switch_env)?;
                    if value.strict_eq(&test_value) {
                        start = Some(i);
                        break;
                    }
                }
                if start.is_none() {
                    start = cases
                        .iter()
                        .position(|c| matches!(&c.kind, NodeKind::SwitchCase { test: None, .. }));
                }
                if let Some(start) = start {
                    for case in &cases[start..] {
                        let NodeKind::SwitchCase { consequent, .. } = &case.kind else {
                            continue;
                        };
                        for stmt in consequent {
                            match self.exec_stmt(stmt, &switch_env) {
                                Err(Signal::Break(None)) => return Ok(None),
                                Err(other) => return Err(other),
                                Ok(_) => {}
                            }
                        }
                    }
                }
                Ok(None)
            }
            _ => Err(throw("unsupported statement in sandbox")),
        }
    }

    fn exec_labeled(
        &mut self,
        stmt: &Node,
        env: &EnvRef,
        label: &str,
    ) -> Result<Option<Value>, Signal> {
        // A labeled loop absorbs `continue label` from inside its body.
        let is_loop = matches!(
            stmt.kind,
            NodeKind::WhileStatement { .. }
                | NodeKind::DoWhileStatement { .. }
                | NodeKind::ForStatement { .. }
                | NodeKind::ForInStatement { .. }
                | NodeKind::ForOfStatement { .. }
        );
        if !is_loop {
            return self.exec_stmt(stmt, env);
        }
        self.pending_label = Some(label.to_string());
        let result = self.exec_stmt(stmt, env);
        self.pending_label = None;
        result
    }

    /// Shared loop driver: the closure runs one iteration and reports whether
    /// to keep going. Break/Continue signals are mapped to loop control.
    fn run_loop<F>(&mut self, env: &EnvRef, mut iteration: F) -> Result<Option<Value>, Signal>
    where
        F: FnMut(&mut Interp, &EnvRef) -> Result<bool, Signal>,
    {
        let label = self.pending_label.take();
        loop {
            self.step()?;
            match iteration(self, env) {
                Ok(true) => {}
                Ok(false) => return Ok(None),
                Err(Signal::Break(None)) => return Ok(None),
                Err(Signal::Break(Some(l))) if Some(&l) == label.as_ref() => return Ok(None),
                Err(Signal::Continue(None)) => {}
                Err(Signal::Continue(Some(l))) if Some(&l) == label.as_ref() => {}
                Err(other) => return Err(other),
            }
        }
    }

    fn bind_for_target(
        &mut self,
        left: &Node,
        value: Value,
        env: &EnvRef,
    ) -> Result<(), Signal> {
        match &left.kind {
            NodeKind::VariableDeclaration { declarations, .. } => {
                if let Some(NodeKind::VariableDeclarator { id, .. }) =
                    declarations.first().map(|d| &d.kind)
                {
                    if let Some(name) = id.ident_name() {
                        Env::declare(env, name, value);
                    }
                }
                Ok(())
            }
            NodeKind::Identifier { name } => {
                if !Env::assign(env, name, value.clone()) {
                    Env::declare(&self.global, name, value);
                }
                Ok(())
            }
            _ => Err(throw("unsupported loop target")),
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    pub fn eval_expr(&mut self, node: &Node, env: &EnvRef) -> Eval {
        self.step()?;
        match &node.kind {
            NodeKind::Literal { value } => Ok(match value {
                Lit::Str(s) => Value::str(s.clone()),
                Lit::Num(n) => Value::Num(*n),
                Lit::Bool(b) => Value::Bool(*b),
                Lit::Null => Value::Null,
            }),
            NodeKind::BigIntLiteral { text } => {
                let digits = text.trim();
                let parsed = if let Some(hex) = digits.strip_prefix("0x") {
                    i128::from_str_radix(hex, 16).ok()
                } else {
                    digits.parse::<i128>().ok()
                };
                match parsed {
                    Some(n) => Ok(Value::BigInt(n)),
                    None => Err(throw("bigint literal out of supported range")),
                }
            }
            NodeKind::RegExpLiteral { pattern, flags } => Ok(Value::Regex(Rc::new(RegexValue {
                pattern: pattern.clone(),
                flags: flags.clone(),
            }))),
            NodeKind::Identifier { name } => Env::lookup(env, name)
                .ok_or_else(|| throw(format!("{name} is not defined"))),
            NodeKind::ThisExpression => {
                Ok(Env::lookup(env, "this").unwrap_or(Value::Undefined))
            }
            NodeKind::ArrayExpression { elements } => {
                let mut items = Vec::with_capacity(elements.len());
                for el in elements {
                    match el {
                        Some(el) => items.push(self.eval_expr(el, env)?),
                        None => items.push(Value::Undefined),
                    }
                }
                Ok(Value::array(items))
            }
            NodeKind::ObjectExpression { properties } => {
                let mut props = Vec::with_capacity(properties.len());
                for prop in properties {
                    let NodeKind::Property {
                        key,
                        value,
                        computed,
                        kind,
                        ..
                    } = &prop.kind
                    else {
                        continue;
                    };
                    if *kind != unweave_syntax::ast::PropertyKind::Init {
                        return Err(throw("accessors are outside the sandbox subset"));
                    }
                    let key = self.eval_property_key(key, *computed, env)?;
                    let value = self.eval_expr(value, env)?;
                    props.push((key, value));
                }
                Ok(Value::object(props))
            }
            NodeKind::FunctionExpression { id, params, body } => {
                match id.as_ref().and_then(|i| i.ident_name()) {
                    Some(name) => {
                        // The name is visible inside the function itself.
                        let self_env = Env::child(env);
                        let func = self.make_function(
                            name.to_string(),
                            params,
                            (**body).clone(),
                            false,
                            false,
                            &self_env,
                        );
                        Env::declare(&self_env, name, func.clone());
                        Ok(func)
                    }
                    None => Ok(self.make_function(
                        String::new(),
                        params,
                        (**body).clone(),
                        false,
                        false,
                        env,
                    )),
                }
            }
            NodeKind::ArrowFunctionExpression {
                params,
                body,
                expression,
            } => Ok(self.make_function(
                String::new(),
                params,
                (**body).clone(),
                *expression,
                true,
                env,
            )),
            NodeKind::UnaryExpression { op, argument } => self.eval_unary(*op, argument, env),
            NodeKind::UpdateExpression {
                op,
                prefix,
                argument,
            } => self.eval_update(*op, *prefix, argument, env),
            NodeKind::BinaryExpression { op, left, right } => {
                let lhs = self.eval_expr(left, env)?;
                let rhs = self.eval_expr(right, env)?;
                self.binary_op(*op, lhs, rhs)
            }
            NodeKind::LogicalExpression { op, left, right } => {
                let lhs = self.eval_expr(left, env)?;
                match op {
                    LogicalOp::And => {
                        if lhs.is_truthy() {
                            self.eval_expr(right, env)
                        } else {
                            Ok(lhs)
                        }
                    }
                    LogicalOp::Or => {
                        if lhs.is_truthy() {
                            Ok(lhs)
                        } else {
                            self.eval_expr(right, env)
                        }
                    }
                }
            }
            NodeKind::ConditionalExpression {
                test,
                consequent,
                alternate,
            } => {
                if self.eval_expr(test, env)?.is_truthy() {
                    self.eval_expr(consequent, env)
                } else {
                    self.eval_expr(alternate, env)
                }
            }
            NodeKind::SequenceExpression { expressions } => {
                let mut last = Value::Undefined;
                for e in expressions {
                    last = self.eval_expr(e, env)?;
                }
                Ok(last)
            }
            NodeKind::AssignmentExpression { op, left, right } => {
                self.eval_assignment(*op, left, right, env)
            }
            NodeKind::MemberExpression {
                object,
                property,
                computed,
            } => {
                let obj = self.eval_expr(object, env)?;
                let key = self.eval_property_key(property, *computed, env)?;
                self.get_member(&obj, &key)
            }
            NodeKind::CallExpression { callee, arguments } => {
                let (func, this) = match &callee.kind {
                    NodeKind::MemberExpression {
                        object,
                        property,
                        computed,
                    } => {
                        let obj = self.eval_expr(object, env)?;
                        let key = self.eval_property_key(property, *computed, env)?;
                        let func = self.get_member(&obj, &key)?;
                        (func, obj)
                    }
                    _ => (self.eval_expr(callee, env)?, Value::Undefined),
                };
                let mut args = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    args.push(self.eval_expr(arg, env)?);
                }
                self.call_value(&func, this, &args)
            }
            NodeKind::NewExpression { callee, arguments } => {
                let func = self.eval_expr(callee, env)?;
                let mut args = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    args.push(self.eval_expr(arg, env)?);
                }
                self.construct(&func, &args)
            }
            _ => Err(throw("unsupported expression in sandbox")),
        }
    }

    fn eval_property_key(&mut self, key: &Node, computed: bool, env: &EnvRef) -> Result<String, Signal> {
        if computed {
            let value = self.eval_expr(key, env)?;
            if matches!(value, Value::Symbol(_)) {
                return Err(throw("symbol property keys are outside the sandbox subset"));
            }
            self.to_string_value(&value)
        } else {
            match &key.kind {
                NodeKind::Identifier { name } => Ok(name.clone()),
                NodeKind::Literal { value: Lit::Str(s) } => Ok(s.clone()),
                NodeKind::Literal { value: Lit::Num(n) } => Ok(number_to_string(*n)),
                _ => Err(throw("unsupported property key")),
            }
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, argument: &Node, env: &EnvRef) -> Eval {
        if op == UnaryOp::Typeof {
            // `typeof missing` must not throw.
            if let NodeKind::Identifier { name } = &argument.kind {
                if Env::lookup(env, name).is_none() {
                    return Ok(Value::str("undefined"));
                }
            }
        }
        if op == UnaryOp::Delete {
            if let NodeKind::MemberExpression {
                object,
                property,
                computed,
            } = &argument.kind
            {
                let obj = self.eval_expr(object, env)?;
                let key = self.eval_property_key(property, *computed, env)?;
                return match obj {
                    Value::Object(o) => Ok(Value::Bool(o.borrow_mut().delete(&key))),
                    Value::Array(items) => {
                        if let Ok(index) = key.parse::<usize>() {
                            let mut items = items.borrow_mut();
                            if index < items.len() {
                                items[index] = Value::Undefined;
                            }
                        }
                        Ok(Value::Bool(true))
                    }
                    _ => Ok(Value::Bool(true)),
                };
            }
            return Ok(Value::Bool(true));
        }

        let value = self.eval_expr(argument, env)?;
        match op {
            UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
            UnaryOp::Minus => {
                if let Value::BigInt(n) = value {
                    return n
                        .checked_neg()
                        .map(Value::BigInt)
                        .ok_or_else(|| throw("bigint overflow"));
                }
                Ok(Value::Num(-self.to_number(&value)?))
            }
            UnaryOp::Plus => Ok(Value::Num(self.to_number(&value)?)),
            UnaryOp::BitNot => {
                if let Value::BigInt(n) = value {
                    return Ok(Value::BigInt(!n));
                }
                Ok(Value::Num(!(self.to_int32(&value)?) as f64))
            }
            UnaryOp::Typeof => Ok(Value::str(value.type_of())),
            UnaryOp::Void => Ok(Value::Undefined),
            UnaryOp::Delete => unreachable!("handled above"),
        }
    }

    fn eval_update(&mut self, op: UpdateOp, prefix: bool, argument: &Node, env: &EnvRef) -> Eval {
        let old = self.eval_expr(argument, env)?;
        let old_num = self.to_number(&old)?;
        let new_num = match op {
            UpdateOp::Inc => old_num + 1.0,
            UpdateOp::Dec => old_num - 1.0,
        };
        let new = Value::Num(new_num);
        self.store(argument, new.clone(), env)?;
        Ok(if prefix { new } else { Value::Num(old_num) })
    }

    fn eval_assignment(
        &mut self,
        op: AssignOp,
        left: &Node,
        right: &Node,
        env: &EnvRef,
    ) -> Eval {
        let value = match op.binary_op() {
            None => self.eval_expr(right, env)?,
            Some(bin) => {
                let lhs = self.eval_expr(left, env)?;
                let rhs = self.eval_expr(right, env)?;
                self.binary_op(bin, lhs, rhs)?
            }
        };
        self.store(left, value.clone(), env)?;
        Ok(value)
    }

    fn store(&mut self, target: &Node, value: Value, env: &EnvRef) -> Result<(), Signal> {
        match &target.kind {
            NodeKind::Identifier { name } => {
                if !Env::assign(env, name, value.clone()) {
                    // Sloppy-mode global creation keeps fragments
                    // self-contained.
                    Env::declare(&self.global, name, value);
                }
                Ok(())
            }
            NodeKind::MemberExpression {
                object,
                property,
                computed,
            } => {
                let obj = self.eval_expr(object, env)?;
                let key = self.eval_property_key(property, *computed, env)?;
                self.set_member(&obj, &key, value)
            }
            _ => Err(throw("unsupported assignment target")),
        }
    }

    // =========================================================================
    // Member access
    // =========================================================================

    pub fn get_member(&mut self, object: &Value, key: &str) -> Eval {
        match object {
            Value::Undefined | Value::Null => Err(throw(format!(
                "cannot read property '{key}' of {}",
                object.type_of()
            ))),
            Value::Str(s) => {
                if key == "length" {
                    return Ok(Value::Num(s.encode_utf16().count() as f64));
                }
                if let Ok(index) = key.parse::<usize>() {
                    let units: Vec<u16> = s.encode_utf16().collect();
                    return Ok(match units.get(index) {
                        Some(&unit) => {
                            Value::str(String::from_utf16_lossy(&[unit]))
                        }
                        None => Value::Undefined,
                    });
                }
                if builtins::is_string_method(key) {
                    return Ok(Value::Function(FunctionData::native(
                        builtins::string_method_tag(key),
                    )));
                }
                // Methods injected on String.prototype.
                if let Some(v) = builtins::proto_lookup(&self.global, "String", key) {
                    return Ok(v);
                }
                Ok(Value::Undefined)
            }
            Value::Num(_) => {
                if builtins::is_number_method(key) {
                    return Ok(Value::Function(FunctionData::native(
                        builtins::number_method_tag(key),
                    )));
                }
                if let Some(v) = builtins::proto_lookup(&self.global, "Number", key) {
                    return Ok(v);
                }
                Ok(Value::Undefined)
            }
            Value::Bool(_) => Ok(Value::Undefined),
            Value::BigInt(_) => {
                if key == "toString" {
                    return Ok(Value::Function(FunctionData::native("bigint.toString")));
                }
                Ok(Value::Undefined)
            }
            Value::Array(items) => {
                if key == "length" {
                    return Ok(Value::Num(items.borrow().len() as f64));
                }
                if let Ok(index) = key.parse::<usize>() {
                    return Ok(items
                        .borrow()
                        .get(index)
                        .cloned()
                        .unwrap_or(Value::Undefined));
                }
                if builtins::is_array_method(key) {
                    return Ok(Value::Function(FunctionData::native(
                        builtins::array_method_tag(key),
                    )));
                }
                if let Some(v) = builtins::proto_lookup(&self.global, "Array", key) {
                    return Ok(v);
                }
                Ok(Value::Undefined)
            }
            Value::Object(obj) => {
                if let Some(v) = obj.borrow().get(key) {
                    return Ok(v);
                }
                match key {
                    "hasOwnProperty" => {
                        Ok(Value::Function(FunctionData::native("object.hasOwnProperty")))
                    }
                    "toString" => Ok(Value::Function(FunctionData::native("object.toString"))),
                    _ => {
                        if let Some(v) = builtins::proto_lookup(&self.global, "Object", key) {
                            return Ok(v);
                        }
                        Ok(Value::Undefined)
                    }
                }
            }
            Value::Function(func) => {
                if let Some(v) = func.get_prop(key) {
                    return Ok(v);
                }
                match key {
                    "call" => Ok(Value::Function(FunctionData::native("function.call"))),
                    "apply" => Ok(Value::Function(FunctionData::native("function.apply"))),
                    "name" => Ok(Value::str(func.name.clone())),
                    "length" => Ok(match &func.callable {
                        Callable::User { params, .. } => Value::Num(params.len() as f64),
                        Callable::Native(_) => Value::Num(0.0),
                    }),
                    _ => Ok(Value::Undefined),
                }
            }
            Value::Regex(r) => match key {
                "source" => Ok(Value::str(r.pattern.clone())),
                "flags" => Ok(Value::str(r.flags.clone())),
                _ => Ok(Value::Undefined),
            },
            Value::Symbol(s) => match key {
                "description" => Ok(match &s.description {
                    Some(d) => Value::str(d.clone()),
                    None => Value::Undefined,
                }),
                _ => Ok(Value::Undefined),
            },
        }
    }

    fn set_member(&mut self, object: &Value, key: &str, value: Value) -> Result<(), Signal> {
        match object {
            Value::Object(obj) => {
                obj.borrow_mut().set(key, value);
                Ok(())
            }
            Value::Array(items) => {
                if key == "length" {
                    let len = self.to_number(&value)? as usize;
                    items.borrow_mut().resize(len, Value::Undefined);
                    return Ok(());
                }
                if let Ok(index) = key.parse::<usize>() {
                    let mut items = items.borrow_mut();
                    if index >= items.len() {
                        items.resize(index + 1, Value::Undefined);
                    }
                    items[index] = value;
                    return Ok(());
                }
                // Non-index expando properties on arrays are not modelled.
                Err(throw("array expando properties are outside the sandbox subset"))
            }
            Value::Function(func) => {
                func.set_prop(key, value);
                Ok(())
            }
            // Property writes on primitives silently no-op in sloppy mode.
            Value::Str(_) | Value::Num(_) | Value::Bool(_) | Value::BigInt(_) => Ok(()),
            _ => Err(throw(format!(
                "cannot set property '{key}' of {}",
                object.type_of()
            ))),
        }
    }

    // =========================================================================
    // Calls
    // =========================================================================

    pub fn call_value(&mut self, func: &Value, this: Value, args: &[Value]) -> Eval {
        self.step()?;
        let Value::Function(data) = func else {
            return Err(throw(format!("{} is not a function", func.type_of())));
        };
        match &data.callable {
            Callable::Native(tag) => builtins::call_native(self, tag, this, args),
            Callable::User {
                params,
                body,
                is_expr_body,
                env,
                is_arrow,
            } => {
                let call_env = Env::child(env);
                if !is_arrow {
                    Env::declare(&call_env, "this", this);
                    Env::declare(&call_env, "arguments", Value::array(args.to_vec()));
                }
                for (i, param) in params.iter().enumerate() {
                    Env::declare(
                        &call_env,
                        param,
                        args.get(i).cloned().unwrap_or(Value::Undefined),
                    );
                }
                if *is_expr_body {
                    return self.eval_expr(body, &call_env);
                }
                let NodeKind::BlockStatement { body: stmts } = &body.kind else {
                    return Err(throw("malformed function body"));
                };
                self.hoist(stmts, &call_env)?;
                for stmt in stmts {
                    match self.exec_stmt(stmt, &call_env) {
                        Ok(_) => {}
                        Err(Signal::Return(value)) => return Ok(value),
                        Err(other) => return Err(other),
                    }
                }
                Ok(Value::Undefined)
            }
        }
    }

    fn construct(&mut self, func: &Value, args: &[Value]) -> Eval {
        let Value::Function(data) = func else {
            return Err(throw(format!("{} is not a constructor", func.type_of())));
        };
        match &data.callable {
            Callable::Native(tag) => match *tag {
                // `new Array`, `new String(…)` etc. behave like calls here.
                "Array" | "String" | "Number" | "Boolean" | "Object" | "RegExp" | "Error"
                | "TypeError" | "RangeError" => builtins::call_native(self, tag, Value::Undefined, args),
                _ => Err(throw("constructor is outside the sandbox subset")),
            },
            Callable::User { .. } => {
                let this = Value::object(Vec::new());
                // Instance methods via `prototype` are copied onto the new
                // object so later lookups resolve.
                if let Some(Value::Object(proto)) = data.get_prop("prototype") {
                    if let Value::Object(obj) = &this {
                        for (k, v) in proto.borrow().props.iter() {
                            obj.borrow_mut().set(k, v.clone());
                        }
                    }
                }
                let result = self.call_value(func, this.clone(), args)?;
                Ok(match result {
                    Value::Object(_) | Value::Array(_) | Value::Function(_) => result,
                    _ => this,
                })
            }
        }
    }

    // =========================================================================
    // Coercions & operators
    // =========================================================================

    pub fn to_number(&mut self, value: &Value) -> Result<f64, Signal> {
        Ok(match value {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Num(n) => *n,
            Value::Str(s) => string_to_number(s),
            Value::BigInt(_) => {
                return Err(throw("cannot convert a BigInt to a number"));
            }
            Value::Symbol(_) => {
                return Err(throw("cannot convert a Symbol to a number"));
            }
            Value::Array(_) | Value::Object(_) | Value::Regex(_) => {
                let prim = self.to_primitive(value)?;
                self.to_number(&prim)?
            }
            Value::Function(_) => f64::NAN,
        })
    }

    pub fn to_string_value(&mut self, value: &Value) -> Result<String, Signal> {
        self.to_string_bounded(value, 0)
    }

    fn to_string_bounded(&mut self, value: &Value, depth: usize) -> Result<String, Signal> {
        // Cyclic aggregates would otherwise recurse without end.
        if depth > 64 {
            return Err(throw("string conversion is too deeply nested"));
        }
        Ok(match value {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Num(n) => number_to_string(*n),
            Value::Str(s) => s.to_string(),
            Value::BigInt(n) => n.to_string(),
            Value::Array(items) => {
                let items = items.borrow().clone();
                let mut parts = Vec::with_capacity(items.len());
                for item in &items {
                    parts.push(match item {
                        Value::Undefined | Value::Null => String::new(),
                        other => self.to_string_bounded(other, depth + 1)?,
                    });
                }
                parts.join(",")
            }
            Value::Object(_) => "[object Object]".to_string(),
            Value::Regex(r) => format!("/{}/{}", r.pattern, r.flags),
            // Without original source text a function cannot stringify
            // faithfully; fail closed.
            Value::Function(_) => {
                return Err(throw("cannot convert a function to a string"));
            }
            Value::Symbol(_) => {
                return Err(throw("cannot convert a Symbol to a string"));
            }
        })
    }

    pub fn to_primitive(&mut self, value: &Value) -> Result<Value, Signal> {
        Ok(match value {
            Value::Array(_) | Value::Object(_) | Value::Regex(_) => {
                Value::str(self.to_string_value(value)?)
            }
            Value::Function(_) => {
                return Err(throw("cannot convert a function to a primitive"));
            }
            other => other.clone(),
        })
    }

    pub fn to_int32(&mut self, value: &Value) -> Result<i32, Signal> {
        let n = self.to_number(value)?;
        if !n.is_finite() {
            return Ok(0);
        }
        Ok(n as i64 as u64 as u32 as i32)
    }

    pub fn to_uint32(&mut self, value: &Value) -> Result<u32, Signal> {
        let n = self.to_number(value)?;
        if !n.is_finite() {
            return Ok(0);
        }
        Ok(n as i64 as u64 as u32)
    }

    pub fn binary_op(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Eval {
        match op {
            BinaryOp::Add => self.add_values(lhs, rhs),
            BinaryOp::Sub => self.numeric_op(lhs, rhs, |a, b| a - b, i128::checked_sub),
            BinaryOp::Mul => self.numeric_op(lhs, rhs, |a, b| a * b, i128::checked_mul),
            BinaryOp::Div => {
                if let (Value::BigInt(a), Value::BigInt(b)) = (&lhs, &rhs) {
                    if *b == 0 {
                        return Err(throw("division by zero"));
                    }
                    return Ok(Value::BigInt(a / b));
                }
                let a = self.to_number(&lhs)?;
                let b = self.to_number(&rhs)?;
                Ok(Value::Num(a / b))
            }
            BinaryOp::Rem => {
                if let (Value::BigInt(a), Value::BigInt(b)) = (&lhs, &rhs) {
                    if *b == 0 {
                        return Err(throw("division by zero"));
                    }
                    return Ok(Value::BigInt(a % b));
                }
                let a = self.to_number(&lhs)?;
                let b = self.to_number(&rhs)?;
                Ok(Value::Num(a % b))
            }
            BinaryOp::Exp => {
                if let (Value::BigInt(a), Value::BigInt(b)) = (&lhs, &rhs) {
                    let exp = u32::try_from(*b).map_err(|_| throw("bigint exponent"))?;
                    return a
                        .checked_pow(exp)
                        .map(Value::BigInt)
                        .ok_or_else(|| throw("bigint overflow"));
                }
                let a = self.to_number(&lhs)?;
                let b = self.to_number(&rhs)?;
                Ok(Value::Num(a.powf(b)))
            }
            BinaryOp::EqEq => Ok(Value::Bool(self.abstract_eq(&lhs, &rhs)?)),
            BinaryOp::NotEq => Ok(Value::Bool(!self.abstract_eq(&lhs, &rhs)?)),
            BinaryOp::StrictEq => Ok(Value::Bool(lhs.strict_eq(&rhs))),
            BinaryOp::StrictNotEq => Ok(Value::Bool(!lhs.strict_eq(&rhs))),
            BinaryOp::Lt => self.compare(lhs, rhs, |o| o == std::cmp::Ordering::Less),
            BinaryOp::Gt => self.compare(lhs, rhs, |o| o == std::cmp::Ordering::Greater),
            BinaryOp::LtEq => self.compare(lhs, rhs, |o| o != std::cmp::Ordering::Greater),
            BinaryOp::GtEq => self.compare(lhs, rhs, |o| o != std::cmp::Ordering::Less),
            BinaryOp::Shl => {
                let a = self.to_int32(&lhs)?;
                let b = self.to_uint32(&rhs)? & 31;
                Ok(Value::Num((a.wrapping_shl(b)) as f64))
            }
            BinaryOp::Shr => {
                let a = self.to_int32(&lhs)?;
                let b = self.to_uint32(&rhs)? & 31;
                Ok(Value::Num((a.wrapping_shr(b)) as f64))
            }
            BinaryOp::UShr => {
                let a = self.to_uint32(&lhs)?;
                let b = self.to_uint32(&rhs)? & 31;
                Ok(Value::Num((a.wrapping_shr(b)) as f64))
            }
            BinaryOp::BitAnd => {
                let a = self.to_int32(&lhs)?;
                let b = self.to_int32(&rhs)?;
                Ok(Value::Num((a & b) as f64))
            }
            BinaryOp::BitOr => {
                let a = self.to_int32(&lhs)?;
                let b = self.to_int32(&rhs)?;
                Ok(Value::Num((a | b) as f64))
            }
            BinaryOp::BitXor => {
                let a = self.to_int32(&lhs)?;
                let b = self.to_int32(&rhs)?;
                Ok(Value::Num((a ^ b) as f64))
            }
            BinaryOp::In => {
                let key = self.to_string_value(&lhs)?;
                match &rhs {
                    Value::Object(obj) => Ok(Value::Bool(obj.borrow().get(&key).is_some())),
                    Value::Array(items) => {
                        if key == "length" {
                            return Ok(Value::Bool(true));
                        }
                        Ok(Value::Bool(
                            key.parse::<usize>()
                                .is_ok_and(|i| i < items.borrow().len()),
                        ))
                    }
                    _ => Err(throw("'in' needs an object operand")),
                }
            }
            BinaryOp::Instanceof => Err(throw("instanceof is outside the sandbox subset")),
        }
    }

    fn add_values(&mut self, lhs: Value, rhs: Value) -> Eval {
        let a = self.to_primitive(&lhs)?;
        let b = self.to_primitive(&rhs)?;
        if matches!(a, Value::Str(_)) || matches!(b, Value::Str(_)) {
            let mut s = self.to_string_value(&a)?;
            s.push_str(&self.to_string_value(&b)?);
            return Ok(Value::str(s));
        }
        if let (Value::BigInt(x), Value::BigInt(y)) = (&a, &b) {
            return x
                .checked_add(*y)
                .map(Value::BigInt)
                .ok_or_else(|| throw("bigint overflow"));
        }
        let x = self.to_number(&a)?;
        let y = self.to_number(&b)?;
        Ok(Value::Num(x + y))
    }

    fn numeric_op(
        &mut self,
        lhs: Value,
        rhs: Value,
        float_op: fn(f64, f64) -> f64,
        bigint_op: fn(i128, i128) -> Option<i128>,
    ) -> Eval {
        if let (Value::BigInt(a), Value::BigInt(b)) = (&lhs, &rhs) {
            return bigint_op(*a, *b)
                .map(Value::BigInt)
                .ok_or_else(|| throw("bigint overflow"));
        }
        if matches!(lhs, Value::BigInt(_)) || matches!(rhs, Value::BigInt(_)) {
            return Err(throw("cannot mix BigInt and other types"));
        }
        let a = self.to_number(&lhs)?;
        let b = self.to_number(&rhs)?;
        Ok(Value::Num(float_op(a, b)))
    }

    fn compare(
        &mut self,
        lhs: Value,
        rhs: Value,
        accept: fn(std::cmp::Ordering) -> bool,
    ) -> Eval {
        let a = self.to_primitive(&lhs)?;
        let b = self.to_primitive(&rhs)?;
        if let (Value::Str(x), Value::Str(y)) = (&a, &b) {
            return Ok(Value::Bool(accept(x.cmp(y))));
        }
        let x = self.to_number(&a)?;
        let y = self.to_number(&b)?;
        match x.partial_cmp(&y) {
            Some(ordering) => Ok(Value::Bool(accept(ordering))),
            None => Ok(Value::Bool(false)), // NaN never compares
        }
    }

    fn abstract_eq(&mut self, lhs: &Value, rhs: &Value) -> Result<bool, Signal> {
        use Value::*;
        Ok(match (lhs, rhs) {
            (Undefined | Null, Undefined | Null) => true,
            (Num(_), Num(_))
            | (Str(_), Str(_))
            | (Bool(_), Bool(_))
            | (BigInt(_), BigInt(_)) => lhs.strict_eq(rhs),
            (Num(a), Str(s)) => *a == string_to_number(s),
            (Str(s), Num(b)) => string_to_number(s) == *b,
            (Bool(_), _) => {
                let n = self.to_number(lhs)?;
                self.abstract_eq(&Num(n), rhs)?
            }
            (_, Bool(_)) => {
                let n = self.to_number(rhs)?;
                self.abstract_eq(lhs, &Num(n))?
            }
            (BigInt(a), Num(b)) | (Num(b), BigInt(a)) => {
                b.is_finite() && *b == b.trunc() && *a == *b as i128
            }
            (Array(_) | Object(_) | Regex(_), Num(_) | Str(_) | BigInt(_)) => {
                let prim = self.to_primitive(lhs)?;
                self.abstract_eq(&prim, rhs)?
            }
            (Num(_) | Str(_) | BigInt(_), Array(_) | Object(_) | Regex(_)) => {
                let prim = self.to_primitive(rhs)?;
                self.abstract_eq(lhs, &prim)?
            }
            _ => lhs.strict_eq(rhs),
        })
    }
}

/// JS `ToNumber` on a string.
pub fn string_to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return match u64::from_str_radix(hex, 16) {
            Ok(v) => v as f64,
            Err(_) => f64::NAN,
        };
    }
    if t == "Infinity" || t == "+Infinity" {
        return f64::INFINITY;
    }
    if t == "-Infinity" {
        return f64::NEG_INFINITY;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

/// Collect `var` declarator names through nested statements, stopping at
/// function boundaries.
fn collect_var_names(stmt: &Node, out: &mut Vec<String>) {
    match &stmt.kind {
        NodeKind::VariableDeclaration {
            kind: unweave_syntax::ast::DeclKind::Var,
            declarations,
        } => {
            for decl in declarations {
                if let NodeKind::VariableDeclarator { id, .. } = &decl.kind {
                    if let Some(name) = id.ident_name() {
                        out.push(name.to_string());
                    }
                }
            }
        }
        NodeKind::BlockStatement { body } => {
            for s in body {
                collect_var_names(s, out);
            }
        }
        NodeKind::IfStatement {
            consequent,
            alternate,
            ..
        } => {
            collect_var_names(consequent, out);
            if let Some(alt) = alternate {
                collect_var_names(alt, out);
            }
        }
        NodeKind::WhileStatement { body, .. }
        | NodeKind::DoWhileStatement { body, .. }
        | NodeKind::LabeledStatement { body, .. } => collect_var_names(body, out),
        NodeKind::ForStatement { init, body, .. } => {
            if let Some(init) = init {
                collect_var_names(init, out);
            }
            collect_var_names(body, out);
        }
        NodeKind::ForInStatement { left, body, .. }
        | NodeKind::ForOfStatement { left, body, .. } => {
            collect_var_names(left, out);
            collect_var_names(body, out);
        }
        NodeKind::TryStatement {
            block,
            handler,
            finalizer,
        } => {
            collect_var_names(block, out);
            if let Some(handler) = handler {
                if let NodeKind::CatchClause { body, .. } = &handler.kind {
                    collect_var_names(body, out);
                }
            }
            if let Some(finalizer) = finalizer {
                collect_var_names(finalizer, out);
            }
        }
        NodeKind::SwitchStatement { cases, .. } => {
            for case in cases {
                if let NodeKind::SwitchCase { consequent, .. } = &case.kind {
                    for s in consequent {
                        collect_var_names(s, out);
                    }
                }
            }
        }
        _ => {}
    }
}
