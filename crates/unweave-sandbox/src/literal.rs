//! Literalisation: convert a runtime value back into pure literal syntax.
//!
//! Returns `None` (the bad-value verdict) for anything that cannot round-trip
//! as a literal: functions, cyclic structures, objects with non-literalisable
//! members. Negative numbers come back as `UnaryExpression('-', …)` so the
//! printed form matches what a parser would rebuild.

use crate::value::Value;
use unweave_syntax::ast::{Node, NodeKind, PropertyKind, UnaryOp};

pub fn literalise(value: &Value) -> Option<Node> {
    let mut visiting: Vec<*const ()> = Vec::new();
    literalise_inner(value, &mut visiting)
}

fn literalise_inner(value: &Value, visiting: &mut Vec<*const ()>) -> Option<Node> {
    match value {
        Value::Str(s) => Some(Node::str_lit(s.to_string())),
        Value::Num(n) => Some(literalise_number(*n)),
        Value::Bool(b) => Some(Node::bool_lit(*b)),
        Value::Null => Some(Node::null_lit()),
        Value::Undefined => Some(Node::ident("undefined")),
        Value::BigInt(n) => {
            let (digits, negative) = if *n < 0 {
                (n.unsigned_abs().to_string(), true)
            } else {
                (n.to_string(), false)
            };
            let lit = Node::synth(NodeKind::BigIntLiteral { text: digits });
            Some(if negative {
                Node::unary(UnaryOp::Minus, lit)
            } else {
                lit
            })
        }
        Value::Regex(r) => Some(Node::synth(NodeKind::RegExpLiteral {
            pattern: r.pattern.clone(),
            flags: r.flags.clone(),
        })),
        Value::Symbol(s) => {
            let arguments = match &s.description {
                Some(d) => vec![Node::str_lit(d.clone())],
                None => Vec::new(),
            };
            Some(Node::call(Node::ident("Symbol"), arguments))
        }
        Value::Array(items) => {
            let ptr = aggregate_ptr(items);
            if visiting.contains(&ptr) {
                return None; // cyclic
            }
            visiting.push(ptr);
            let items = items.borrow();
            let mut elements = Vec::with_capacity(items.len());
            for item in items.iter() {
                elements.push(Some(literalise_inner(item, visiting)?));
            }
            visiting.pop();
            Some(Node::synth(NodeKind::ArrayExpression { elements }))
        }
        Value::Object(obj) => {
            let ptr = aggregate_ptr(obj);
            if visiting.contains(&ptr) {
                return None; // cyclic
            }
            visiting.push(ptr);
            let props = obj.borrow().props.clone();
            let mut properties = Vec::with_capacity(props.len());
            for (key, value) in &props {
                let value = literalise_inner(value, visiting)?;
                properties.push(Node::synth(NodeKind::Property {
                    key: Box::new(Node::str_lit(key.clone())),
                    value: Box::new(value),
                    computed: false,
                    shorthand: false,
                    kind: PropertyKind::Init,
                }));
            }
            visiting.pop();
            Some(Node::synth(NodeKind::ObjectExpression { properties }))
        }
        Value::Function(_) => None,
    }
}

fn literalise_number(n: f64) -> Node {
    if n.is_nan() {
        return Node::ident("NaN");
    }
    if n.is_infinite() {
        let inf = Node::ident("Infinity");
        return if n > 0.0 {
            inf
        } else {
            Node::unary(UnaryOp::Minus, inf)
        };
    }
    // Negative zero keeps its sign through the unary form.
    if n < 0.0 || (n == 0.0 && n.is_sign_negative()) {
        return Node::unary(UnaryOp::Minus, Node::num_lit(n.abs()));
    }
    Node::num_lit(n)
}

fn aggregate_ptr<T>(rc: &std::rc::Rc<std::cell::RefCell<T>>) -> *const () {
    std::rc::Rc::as_ptr(rc) as *const ()
}
