//! The fixed pure builtin subset available inside the sandbox.
//!
//! Everything here is deterministic and side-effect-free with respect to the
//! host: no clock, no randomness, no I/O. Unknown globals are simply absent,
//! so fragments that reach for `document` or `fetch` throw and the candidate
//! is skipped.

use std::rc::Rc;

use base64::Engine;

use crate::interp::{Env, EnvRef, Eval, Interp, Signal};
use crate::value::{number_to_string_radix, FunctionData, RegexValue, SymbolValue, Value};

fn throw(msg: impl Into<String>) -> Signal {
    Signal::Throw(Value::str(msg.into()))
}

/// Populate the global environment.
pub fn install(global: &EnvRef) {
    Env::declare(global, "undefined", Value::Undefined);
    Env::declare(global, "NaN", Value::Num(f64::NAN));
    Env::declare(global, "Infinity", Value::Num(f64::INFINITY));

    for name in [
        "parseInt",
        "parseFloat",
        "isNaN",
        "isFinite",
        "atob",
        "btoa",
        "escape",
        "unescape",
        "encodeURIComponent",
        "decodeURIComponent",
        "eval",
        "Boolean",
        "Symbol",
        "BigInt",
        "RegExp",
        "Error",
        "TypeError",
        "RangeError",
    ] {
        Env::declare(global, name, Value::Function(FunctionData::native(name)));
    }

    // String carries statics and a mutable prototype object (fragments
    // install methods on it).
    let string = FunctionData::native("String");
    string.set_prop(
        "fromCharCode",
        Value::Function(FunctionData::native("String.fromCharCode")),
    );
    string.set_prop(
        "fromCodePoint",
        Value::Function(FunctionData::native("String.fromCodePoint")),
    );
    string.set_prop("prototype", Value::object(Vec::new()));
    Env::declare(global, "String", Value::Function(string));

    let number = FunctionData::native("Number");
    for (key, value) in [
        ("MAX_SAFE_INTEGER", 9007199254740991.0),
        ("MIN_SAFE_INTEGER", -9007199254740991.0),
        ("MAX_VALUE", f64::MAX),
        ("MIN_VALUE", 5e-324),
        ("EPSILON", f64::EPSILON),
        ("POSITIVE_INFINITY", f64::INFINITY),
        ("NEGATIVE_INFINITY", f64::NEG_INFINITY),
        ("NaN", f64::NAN),
    ] {
        number.set_prop(key, Value::Num(value));
    }
    for method in ["isInteger", "isFinite", "isNaN", "parseInt", "parseFloat"] {
        number.set_prop(
            method,
            Value::Function(FunctionData::native(match method {
                "isInteger" => "Number.isInteger",
                "isFinite" => "Number.isFinite",
                "isNaN" => "Number.isNaN",
                "parseInt" => "parseInt",
                _ => "parseFloat",
            })),
        );
    }
    number.set_prop("prototype", Value::object(Vec::new()));
    Env::declare(global, "Number", Value::Function(number));

    let array = FunctionData::native("Array");
    array.set_prop(
        "isArray",
        Value::Function(FunctionData::native("Array.isArray")),
    );
    array.set_prop("prototype", Value::object(Vec::new()));
    Env::declare(global, "Array", Value::Function(array));

    let object = FunctionData::native("Object");
    for method in [
        "keys",
        "values",
        "entries",
        "assign",
        "freeze",
        "fromEntries",
        "getOwnPropertyNames",
    ] {
        let tag: &'static str = match method {
            "keys" => "Object.keys",
            "values" => "Object.values",
            "entries" => "Object.entries",
            "assign" => "Object.assign",
            "freeze" => "Object.freeze",
            "fromEntries" => "Object.fromEntries",
            _ => "Object.keys", // getOwnPropertyNames behaves like keys here
        };
        object.set_prop(method, Value::Function(FunctionData::native(tag)));
    }
    object.set_prop("prototype", Value::object(Vec::new()));
    Env::declare(global, "Object", Value::Function(object));

    let math_methods: &[(&str, &'static str)] = &[
        ("abs", "Math.abs"),
        ("floor", "Math.floor"),
        ("ceil", "Math.ceil"),
        ("round", "Math.round"),
        ("trunc", "Math.trunc"),
        ("sign", "Math.sign"),
        ("sqrt", "Math.sqrt"),
        ("cbrt", "Math.cbrt"),
        ("exp", "Math.exp"),
        ("log", "Math.log"),
        ("log2", "Math.log2"),
        ("log10", "Math.log10"),
        ("sin", "Math.sin"),
        ("cos", "Math.cos"),
        ("tan", "Math.tan"),
        ("asin", "Math.asin"),
        ("acos", "Math.acos"),
        ("atan", "Math.atan"),
        ("atan2", "Math.atan2"),
        ("pow", "Math.pow"),
        ("min", "Math.min"),
        ("max", "Math.max"),
        ("hypot", "Math.hypot"),
    ];
    let mut math_props: Vec<(String, Value)> = math_methods
        .iter()
        .map(|&(name, tag)| (name.to_string(), Value::Function(FunctionData::native(tag))))
        .collect();
    for (name, value) in [
        ("PI", std::f64::consts::PI),
        ("E", std::f64::consts::E),
        ("LN2", std::f64::consts::LN_2),
        ("LN10", std::f64::consts::LN_10),
        ("LOG2E", std::f64::consts::LOG2_E),
        ("LOG10E", std::f64::consts::LOG10_E),
        ("SQRT2", std::f64::consts::SQRT_2),
        ("SQRT1_2", std::f64::consts::FRAC_1_SQRT_2),
    ] {
        math_props.push((name.to_string(), Value::Num(value)));
    }
    Env::declare(global, "Math", Value::object(math_props));

    Env::declare(
        global,
        "JSON",
        Value::object(vec![
            (
                "parse".to_string(),
                Value::Function(FunctionData::native("JSON.parse")),
            ),
            (
                "stringify".to_string(),
                Value::Function(FunctionData::native("JSON.stringify")),
            ),
        ]),
    );
}

/// Look up a property on `<builtin>.prototype` (methods the fragment
/// installed there).
pub fn proto_lookup(global: &EnvRef, builtin: &str, key: &str) -> Option<Value> {
    let Some(Value::Function(func)) = Env::lookup(global, builtin) else {
        return None;
    };
    let Some(Value::Object(proto)) = func.get_prop("prototype") else {
        return None;
    };
    let value = proto.borrow().get(key);
    value
}

// =============================================================================
// Method tables
// =============================================================================

pub fn is_string_method(name: &str) -> bool {
    string_method_tag_opt(name).is_some()
}

pub fn string_method_tag(name: &str) -> &'static str {
    string_method_tag_opt(name).unwrap_or("string.unknown")
}

fn string_method_tag_opt(name: &str) -> Option<&'static str> {
    Some(match name {
        "charAt" => "string.charAt",
        "charCodeAt" => "string.charCodeAt",
        "codePointAt" => "string.codePointAt",
        "indexOf" => "string.indexOf",
        "lastIndexOf" => "string.lastIndexOf",
        "includes" => "string.includes",
        "startsWith" => "string.startsWith",
        "endsWith" => "string.endsWith",
        "slice" => "string.slice",
        "substring" => "string.substring",
        "substr" => "string.substr",
        "split" => "string.split",
        "replace" => "string.replace",
        "replaceAll" => "string.replaceAll",
        "repeat" => "string.repeat",
        "toUpperCase" => "string.toUpperCase",
        "toLowerCase" => "string.toLowerCase",
        "trim" => "string.trim",
        "trimStart" => "string.trimStart",
        "trimEnd" => "string.trimEnd",
        "concat" => "string.concat",
        "padStart" => "string.padStart",
        "padEnd" => "string.padEnd",
        "at" => "string.at",
        "toString" => "string.toString",
        "valueOf" => "string.valueOf",
        _ => return None,
    })
}

pub fn is_array_method(name: &str) -> bool {
    array_method_tag_opt(name).is_some()
}

pub fn array_method_tag(name: &str) -> &'static str {
    array_method_tag_opt(name).unwrap_or("array.unknown")
}

fn array_method_tag_opt(name: &str) -> Option<&'static str> {
    Some(match name {
        "push" => "array.push",
        "pop" => "array.pop",
        "shift" => "array.shift",
        "unshift" => "array.unshift",
        "slice" => "array.slice",
        "splice" => "array.splice",
        "join" => "array.join",
        "indexOf" => "array.indexOf",
        "lastIndexOf" => "array.lastIndexOf",
        "includes" => "array.includes",
        "concat" => "array.concat",
        "reverse" => "array.reverse",
        "sort" => "array.sort",
        "fill" => "array.fill",
        "copyWithin" => "array.copyWithin",
        "map" => "array.map",
        "filter" => "array.filter",
        "reduce" => "array.reduce",
        "forEach" => "array.forEach",
        "find" => "array.find",
        "findIndex" => "array.findIndex",
        "flat" => "array.flat",
        "at" => "array.at",
        "toString" => "array.toString",
        _ => return None,
    })
}

pub fn is_number_method(name: &str) -> bool {
    matches!(name, "toString" | "toFixed" | "valueOf")
}

pub fn number_method_tag(name: &str) -> &'static str {
    match name {
        "toString" => "number.toString",
        "toFixed" => "number.toFixed",
        _ => "number.valueOf",
    }
}

// =============================================================================
// Dispatch
// =============================================================================

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Undefined)
}

pub fn call_native(interp: &mut Interp, tag: &str, this: Value, args: &[Value]) -> Eval {
    match tag {
        // ----- global functions --------------------------------------------
        "parseInt" => {
            let s = interp.to_string_value(&arg(args, 0))?;
            let radix = match arg(args, 1) {
                Value::Undefined => None,
                r => Some(interp.to_number(&r)? as u32),
            };
            Ok(Value::Num(js_parse_int(&s, radix)))
        }
        "parseFloat" => {
            let s = interp.to_string_value(&arg(args, 0))?;
            Ok(Value::Num(js_parse_float(&s)))
        }
        "isNaN" => {
            let n = interp.to_number(&arg(args, 0))?;
            Ok(Value::Bool(n.is_nan()))
        }
        "isFinite" => {
            let n = interp.to_number(&arg(args, 0))?;
            Ok(Value::Bool(n.is_finite()))
        }
        "atob" => {
            let s = interp.to_string_value(&arg(args, 0))?;
            let engine = base64::engine::general_purpose::STANDARD;
            let bytes = engine
                .decode(s.trim())
                .or_else(|_| {
                    base64::engine::general_purpose::STANDARD_NO_PAD.decode(s.trim())
                })
                .map_err(|_| throw("invalid base64 in atob"))?;
            Ok(Value::str(bytes.iter().map(|&b| b as char).collect::<String>()))
        }
        "btoa" => {
            let s = interp.to_string_value(&arg(args, 0))?;
            let mut bytes = Vec::with_capacity(s.len());
            for ch in s.chars() {
                let code = ch as u32;
                if code > 255 {
                    return Err(throw("btoa operand outside latin-1"));
                }
                bytes.push(code as u8);
            }
            Ok(Value::str(
                base64::engine::general_purpose::STANDARD.encode(bytes),
            ))
        }
        "escape" => {
            let s = interp.to_string_value(&arg(args, 0))?;
            Ok(Value::str(js_escape(&s)))
        }
        "unescape" => {
            let s = interp.to_string_value(&arg(args, 0))?;
            Ok(Value::str(js_unescape(&s)))
        }
        "encodeURIComponent" => {
            let s = interp.to_string_value(&arg(args, 0))?;
            Ok(Value::str(encode_uri_component(&s)))
        }
        "decodeURIComponent" => {
            let s = interp.to_string_value(&arg(args, 0))?;
            decode_uri_component(&s)
                .map(Value::str)
                .ok_or_else(|| throw("malformed URI sequence"))
        }
        "eval" => {
            let Value::Str(src) = arg(args, 0) else {
                return Ok(arg(args, 0));
            };
            let program = unweave_syntax::parse(&src)
                .map_err(|e| throw(format!("eval: {e}")))?;
            interp.eval_program(&program.root)
        }

        // ----- conversion constructors -------------------------------------
        "String" => match arg(args, 0) {
            Value::Undefined if args.is_empty() => Ok(Value::str("")),
            Value::Symbol(sym) => Ok(Value::str(format!(
                "Symbol({})",
                sym.description.as_deref().unwrap_or("")
            ))),
            v => Ok(Value::str(interp.to_string_value(&v)?)),
        },
        "Number" => match arg(args, 0) {
            Value::Undefined if args.is_empty() => Ok(Value::Num(0.0)),
            Value::BigInt(n) => Ok(Value::Num(n as f64)),
            v => Ok(Value::Num(interp.to_number(&v)?)),
        },
        "Boolean" => Ok(Value::Bool(arg(args, 0).is_truthy())),
        "Array" => {
            if args.len() == 1 {
                if let Value::Num(n) = args[0] {
                    if n >= 0.0 && n == n.trunc() {
                        return Ok(Value::array(vec![Value::Undefined; n as usize]));
                    }
                    return Err(throw("invalid array length"));
                }
            }
            Ok(Value::array(args.to_vec()))
        }
        "Array.isArray" => Ok(Value::Bool(matches!(arg(args, 0), Value::Array(_)))),
        "Object" => match arg(args, 0) {
            Value::Undefined | Value::Null => Ok(Value::object(Vec::new())),
            v => Ok(v),
        },
        "Symbol" => {
            let description = match arg(args, 0) {
                Value::Undefined => None,
                v => Some(interp.to_string_value(&v)?),
            };
            Ok(Value::Symbol(Rc::new(SymbolValue { description })))
        }
        "BigInt" => match arg(args, 0) {
            Value::Num(n) if n == n.trunc() && n.is_finite() => Ok(Value::BigInt(n as i128)),
            Value::Str(s) => s
                .trim()
                .parse::<i128>()
                .map(Value::BigInt)
                .map_err(|_| throw("cannot convert string to BigInt")),
            Value::BigInt(n) => Ok(Value::BigInt(n)),
            Value::Bool(b) => Ok(Value::BigInt(b as i128)),
            _ => Err(throw("cannot convert value to BigInt")),
        },
        "RegExp" => {
            let pattern = interp.to_string_value(&arg(args, 0))?;
            let flags = match arg(args, 1) {
                Value::Undefined => String::new(),
                v => interp.to_string_value(&v)?,
            };
            Ok(Value::Regex(Rc::new(RegexValue { pattern, flags })))
        }
        "Error" | "TypeError" | "RangeError" => {
            let message = match arg(args, 0) {
                Value::Undefined => String::new(),
                v => interp.to_string_value(&v)?,
            };
            Ok(Value::object(vec![
                ("name".to_string(), Value::str(tag)),
                ("message".to_string(), Value::str(message)),
            ]))
        }

        // ----- namespace statics -------------------------------------------
        "String.fromCharCode" => {
            let mut units = Vec::with_capacity(args.len());
            for a in args {
                units.push(interp.to_number(a)? as i64 as u64 as u16);
            }
            Ok(Value::str(String::from_utf16_lossy(&units)))
        }
        "String.fromCodePoint" => {
            let mut out = String::new();
            for a in args {
                let code = interp.to_number(a)? as u32;
                out.push(char::from_u32(code).ok_or_else(|| throw("invalid code point"))?);
            }
            Ok(Value::str(out))
        }
        "Number.isInteger" => Ok(Value::Bool(matches!(
            arg(args, 0),
            Value::Num(n) if n.is_finite() && n == n.trunc()
        ))),
        "Number.isFinite" => Ok(Value::Bool(
            matches!(arg(args, 0), Value::Num(n) if n.is_finite()),
        )),
        "Number.isNaN" => Ok(Value::Bool(
            matches!(arg(args, 0), Value::Num(n) if n.is_nan()),
        )),
        "Object.keys" => object_keys(interp, &arg(args, 0)).map(|keys| {
            Value::array(keys.into_iter().map(Value::str).collect())
        }),
        "Object.values" => match arg(args, 0) {
            Value::Object(obj) => Ok(Value::array(
                obj.borrow().props.iter().map(|(_, v)| v.clone()).collect(),
            )),
            Value::Array(items) => Ok(Value::array(items.borrow().clone())),
            _ => Err(throw("Object.values needs an object")),
        },
        "Object.entries" => match arg(args, 0) {
            Value::Object(obj) => Ok(Value::array(
                obj.borrow()
                    .props
                    .iter()
                    .map(|(k, v)| Value::array(vec![Value::str(k.clone()), v.clone()]))
                    .collect(),
            )),
            _ => Err(throw("Object.entries needs an object")),
        },
        "Object.assign" => {
            let target = arg(args, 0);
            let Value::Object(target_obj) = &target else {
                return Err(throw("Object.assign target must be an object"));
            };
            for source in &args[1..] {
                if let Value::Object(src) = source {
                    let props = src.borrow().props.clone();
                    for (k, v) in props {
                        target_obj.borrow_mut().set(&k, v);
                    }
                }
            }
            Ok(target)
        }
        "Object.freeze" => Ok(arg(args, 0)),
        "Object.fromEntries" => match arg(args, 0) {
            Value::Array(entries) => {
                let entries = entries.borrow().clone();
                let mut props = Vec::with_capacity(entries.len());
                for entry in entries {
                    let Value::Array(pair) = entry else {
                        return Err(throw("fromEntries entry is not a pair"));
                    };
                    let pair = pair.borrow();
                    let key = interp.to_string_value(&pair.first().cloned().unwrap_or(Value::Undefined))?;
                    let value = pair.get(1).cloned().unwrap_or(Value::Undefined);
                    props.push((key, value));
                }
                Ok(Value::object(props))
            }
            _ => Err(throw("fromEntries needs an array")),
        },
        "JSON.parse" => {
            let s = interp.to_string_value(&arg(args, 0))?;
            let json: serde_json::Value =
                serde_json::from_str(&s).map_err(|e| throw(format!("JSON.parse: {e}")))?;
            Ok(json_to_value(&json))
        }
        "JSON.stringify" => {
            if args.len() > 1 && !matches!(args[1], Value::Undefined | Value::Null) {
                return Err(throw("JSON.stringify replacers are outside the sandbox subset"));
            }
            if args.len() > 2 && !matches!(args[2], Value::Undefined | Value::Null) {
                return Err(throw("JSON.stringify spacing is outside the sandbox subset"));
            }
            match value_to_json(interp, &arg(args, 0), 0)? {
                Some(json) => Ok(Value::str(json.to_string())),
                None => Ok(Value::Undefined),
            }
        }

        // ----- Math --------------------------------------------------------
        tag if tag.starts_with("Math.") => math_native(interp, tag, args),

        // ----- string methods ----------------------------------------------
        tag if tag.starts_with("string.") => string_native(interp, tag, this, args),

        // ----- array methods -----------------------------------------------
        tag if tag.starts_with("array.") => array_native(interp, tag, this, args),

        // ----- number methods ----------------------------------------------
        "number.toString" => {
            let n = interp.to_number(&this)?;
            let radix = match arg(args, 0) {
                Value::Undefined => 10,
                v => interp.to_number(&v)? as u32,
            };
            if !(2..=36).contains(&radix) {
                return Err(throw("toString radix out of range"));
            }
            Ok(Value::str(number_to_string_radix(n, radix)))
        }
        "number.toFixed" => {
            let n = interp.to_number(&this)?;
            let digits = interp.to_number(&arg(args, 0))? as usize;
            Ok(Value::str(format!("{n:.digits$}")))
        }
        "number.valueOf" => Ok(Value::Num(interp.to_number(&this)?)),
        "bigint.toString" => match this {
            Value::BigInt(n) => Ok(Value::str(n.to_string())),
            _ => Err(throw("bigint method on non-bigint")),
        },

        // ----- function/object plumbing ------------------------------------
        "function.call" => interp.call_value(&this, arg(args, 0), args.get(1..).unwrap_or(&[])),
        "function.apply" => {
            let call_args = match arg(args, 1) {
                Value::Undefined | Value::Null => Vec::new(),
                Value::Array(items) => items.borrow().clone(),
                _ => return Err(throw("apply arguments must be an array")),
            };
            interp.call_value(&this, arg(args, 0), &call_args)
        }
        "object.hasOwnProperty" => {
            let key = interp.to_string_value(&arg(args, 0))?;
            match &this {
                Value::Object(obj) => Ok(Value::Bool(obj.borrow().get(&key).is_some())),
                Value::Array(items) => Ok(Value::Bool(
                    key == "length"
                        || key.parse::<usize>().is_ok_and(|i| i < items.borrow().len()),
                )),
                _ => Ok(Value::Bool(false)),
            }
        }
        "object.toString" => Ok(Value::str(interp.to_string_value(&this)?)),

        _ => Err(throw(format!("builtin `{tag}` is outside the sandbox subset"))),
    }
}

fn object_keys(_interp: &mut Interp, value: &Value) -> Result<Vec<String>, Signal> {
    match value {
        Value::Object(obj) => Ok(obj.borrow().props.iter().map(|(k, _)| k.clone()).collect()),
        Value::Array(items) => Ok((0..items.borrow().len()).map(|i| i.to_string()).collect()),
        _ => Err(throw("Object.keys needs an object")),
    }
}

fn math_native(interp: &mut Interp, tag: &str, args: &[Value]) -> Eval {
    // Unary Math functions share one shape.
    if let Some(op) = math_unary(tag) {
        let n = interp.to_number(&arg(args, 0))?;
        return Ok(Value::Num(op(n)));
    }
    match tag {
        "Math.atan2" => {
            let a = interp.to_number(&arg(args, 0))?;
            let b = interp.to_number(&arg(args, 1))?;
            Ok(Value::Num(a.atan2(b)))
        }
        "Math.pow" => {
            let a = interp.to_number(&arg(args, 0))?;
            let b = interp.to_number(&arg(args, 1))?;
            Ok(Value::Num(a.powf(b)))
        }
        "Math.min" | "Math.max" => {
            let mut best = if tag == "Math.min" {
                f64::INFINITY
            } else {
                f64::NEG_INFINITY
            };
            for a in args {
                let n = interp.to_number(a)?;
                if n.is_nan() {
                    return Ok(Value::Num(f64::NAN));
                }
                best = if tag == "Math.min" {
                    best.min(n)
                } else {
                    best.max(n)
                };
            }
            Ok(Value::Num(best))
        }
        "Math.hypot" => {
            let mut sum = 0.0;
            for a in args {
                let n = interp.to_number(a)?;
                sum += n * n;
            }
            Ok(Value::Num(sum.sqrt()))
        }
        _ => Err(throw(format!("{tag} is outside the sandbox subset"))),
    }
}

fn math_unary(tag: &str) -> Option<fn(f64) -> f64> {
    Some(match tag {
        "Math.abs" => f64::abs,
        "Math.floor" => f64::floor,
        "Math.ceil" => f64::ceil,
        // JS rounds half toward positive infinity.
        "Math.round" => |n| (n + 0.5).floor(),
        "Math.trunc" => f64::trunc,
        "Math.sign" => |n| {
            if n.is_nan() {
                f64::NAN
            } else if n > 0.0 {
                1.0
            } else if n < 0.0 {
                -1.0
            } else {
                n
            }
        },
        "Math.sqrt" => f64::sqrt,
        "Math.cbrt" => f64::cbrt,
        "Math.exp" => f64::exp,
        "Math.log" => f64::ln,
        "Math.log2" => f64::log2,
        "Math.log10" => f64::log10,
        "Math.sin" => f64::sin,
        "Math.cos" => f64::cos,
        "Math.tan" => f64::tan,
        "Math.asin" => f64::asin,
        "Math.acos" => f64::acos,
        "Math.atan" => f64::atan,
        _ => return None,
    })
}

// =============================================================================
// String methods
// =============================================================================

fn utf16(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

fn from_utf16(units: &[u16]) -> String {
    String::from_utf16_lossy(units)
}

/// Clamp a JS index (negative counts from the end) into `0..=len`.
fn clamp_index(i: f64, len: usize) -> usize {
    if i.is_nan() {
        return 0;
    }
    if i < 0.0 {
        let from_end = len as f64 + i;
        if from_end < 0.0 {
            0
        } else {
            from_end as usize
        }
    } else if i >= len as f64 {
        len
    } else {
        i as usize
    }
}

fn string_native(interp: &mut Interp, tag: &str, this: Value, args: &[Value]) -> Eval {
    let s = interp.to_string_value(&this)?;
    match tag {
        "string.toString" | "string.valueOf" => Ok(Value::str(s)),
        "string.charAt" => {
            let units = utf16(&s);
            let i = interp.to_number(&arg(args, 0))?;
            if i.is_nan() || i < 0.0 || i >= units.len() as f64 {
                return Ok(Value::str(""));
            }
            Ok(Value::str(from_utf16(&units[i as usize..i as usize + 1])))
        }
        "string.charCodeAt" => {
            let units = utf16(&s);
            let i = interp.to_number(&arg(args, 0))?;
            let i = if i.is_nan() { 0.0 } else { i };
            match units.get(i as usize) {
                Some(&u) if i >= 0.0 => Ok(Value::Num(u as f64)),
                _ => Ok(Value::Num(f64::NAN)),
            }
        }
        "string.codePointAt" => {
            let i = interp.to_number(&arg(args, 0))? as usize;
            match s.chars().nth(i) {
                Some(c) => Ok(Value::Num(c as u32 as f64)),
                None => Ok(Value::Undefined),
            }
        }
        "string.indexOf" | "string.lastIndexOf" => {
            let needle = interp.to_string_value(&arg(args, 0))?;
            let hay = utf16(&s);
            let needle = utf16(&needle);
            let found = if tag == "string.indexOf" {
                utf16_find(&hay, &needle, false)
            } else {
                utf16_find(&hay, &needle, true)
            };
            Ok(Value::Num(found.map_or(-1.0, |i| i as f64)))
        }
        "string.includes" => {
            let needle = interp.to_string_value(&arg(args, 0))?;
            Ok(Value::Bool(s.contains(&needle)))
        }
        "string.startsWith" => {
            let needle = interp.to_string_value(&arg(args, 0))?;
            Ok(Value::Bool(s.starts_with(&needle)))
        }
        "string.endsWith" => {
            let needle = interp.to_string_value(&arg(args, 0))?;
            Ok(Value::Bool(s.ends_with(&needle)))
        }
        "string.slice" => {
            let units = utf16(&s);
            let len = units.len();
            let start = match arg(args, 0) {
                Value::Undefined => 0,
                v => clamp_index(interp.to_number(&v)?, len),
            };
            let end = match arg(args, 1) {
                Value::Undefined => len,
                v => clamp_index(interp.to_number(&v)?, len),
            };
            if start >= end {
                return Ok(Value::str(""));
            }
            Ok(Value::str(from_utf16(&units[start..end])))
        }
        "string.substring" => {
            let units = utf16(&s);
            let len = units.len();
            let a = match arg(args, 0) {
                Value::Undefined => 0,
                v => {
                    let n = interp.to_number(&v)?;
                    if n < 0.0 || n.is_nan() {
                        0
                    } else {
                        (n as usize).min(len)
                    }
                }
            };
            let b = match arg(args, 1) {
                Value::Undefined => len,
                v => {
                    let n = interp.to_number(&v)?;
                    if n < 0.0 || n.is_nan() {
                        0
                    } else {
                        (n as usize).min(len)
                    }
                }
            };
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            Ok(Value::str(from_utf16(&units[lo..hi])))
        }
        "string.substr" => {
            let units = utf16(&s);
            let len = units.len();
            let start = clamp_index(interp.to_number(&arg(args, 0))?, len);
            let count = match arg(args, 1) {
                Value::Undefined => len - start,
                v => (interp.to_number(&v)?.max(0.0) as usize).min(len - start),
            };
            Ok(Value::str(from_utf16(&units[start..start + count])))
        }
        "string.split" => {
            match arg(args, 1) {
                Value::Undefined => {}
                _ => return Err(throw("split limit is outside the sandbox subset")),
            }
            match arg(args, 0) {
                Value::Undefined => Ok(Value::array(vec![Value::str(s)])),
                Value::Regex(_) => Err(throw("regex split is outside the sandbox subset")),
                sep => {
                    let sep = interp.to_string_value(&sep)?;
                    if sep.is_empty() {
                        let units = utf16(&s);
                        return Ok(Value::array(
                            units
                                .iter()
                                .map(|&u| Value::str(from_utf16(&[u])))
                                .collect(),
                        ));
                    }
                    Ok(Value::array(
                        s.split(sep.as_str()).map(Value::str).collect(),
                    ))
                }
            }
        }
        "string.replace" | "string.replaceAll" => {
            let pattern = match arg(args, 0) {
                Value::Regex(_) => {
                    return Err(throw("regex replace is outside the sandbox subset"))
                }
                v => interp.to_string_value(&v)?,
            };
            let all = tag == "string.replaceAll";
            match arg(args, 1) {
                Value::Function(_) => {
                    let func = arg(args, 1);
                    let mut out = String::new();
                    let mut rest = s.as_str();
                    loop {
                        match rest.find(pattern.as_str()) {
                            Some(pos) if !pattern.is_empty() => {
                                out.push_str(&rest[..pos]);
                                let replaced = interp.call_value(
                                    &func,
                                    Value::Undefined,
                                    &[Value::str(pattern.clone())],
                                )?;
                                out.push_str(&interp.to_string_value(&replaced)?);
                                rest = &rest[pos + pattern.len()..];
                                if !all {
                                    break;
                                }
                            }
                            _ => break,
                        }
                    }
                    out.push_str(rest);
                    Ok(Value::str(out))
                }
                rep => {
                    let rep = interp.to_string_value(&rep)?;
                    if rep.contains('$') {
                        return Err(throw(
                            "replacement patterns are outside the sandbox subset",
                        ));
                    }
                    if pattern.is_empty() {
                        return Ok(Value::str(format!("{rep}{s}")));
                    }
                    Ok(Value::str(if all {
                        s.replace(pattern.as_str(), &rep)
                    } else {
                        s.replacen(pattern.as_str(), &rep, 1)
                    }))
                }
            }
        }
        "string.repeat" => {
            let n = interp.to_number(&arg(args, 0))?;
            if n < 0.0 || !n.is_finite() {
                return Err(throw("invalid repeat count"));
            }
            let count = n as usize;
            if count.saturating_mul(s.len()) > 100_000_000 {
                return Err(Signal::OutOfBudget);
            }
            Ok(Value::str(s.repeat(count)))
        }
        "string.toUpperCase" => Ok(Value::str(s.to_uppercase())),
        "string.toLowerCase" => Ok(Value::str(s.to_lowercase())),
        "string.trim" => Ok(Value::str(s.trim().to_string())),
        "string.trimStart" => Ok(Value::str(s.trim_start().to_string())),
        "string.trimEnd" => Ok(Value::str(s.trim_end().to_string())),
        "string.concat" => {
            let mut out = s;
            for a in args {
                out.push_str(&interp.to_string_value(a)?);
            }
            Ok(Value::str(out))
        }
        "string.padStart" | "string.padEnd" => {
            let target = interp.to_number(&arg(args, 0))? as usize;
            let pad = match arg(args, 1) {
                Value::Undefined => " ".to_string(),
                v => interp.to_string_value(&v)?,
            };
            let units = utf16(&s);
            if units.len() >= target || pad.is_empty() {
                return Ok(Value::str(s));
            }
            let pad_units = utf16(&pad);
            let mut fill = Vec::new();
            while fill.len() < target - units.len() {
                fill.extend_from_slice(&pad_units);
            }
            fill.truncate(target - units.len());
            Ok(Value::str(if tag == "string.padStart" {
                format!("{}{}", from_utf16(&fill), s)
            } else {
                format!("{}{}", s, from_utf16(&fill))
            }))
        }
        "string.at" => {
            let units = utf16(&s);
            let mut i = interp.to_number(&arg(args, 0))?;
            if i < 0.0 {
                i += units.len() as f64;
            }
            if i < 0.0 || i >= units.len() as f64 {
                return Ok(Value::Undefined);
            }
            Ok(Value::str(from_utf16(&units[i as usize..i as usize + 1])))
        }
        _ => Err(throw(format!("{tag} is outside the sandbox subset"))),
    }
}

fn utf16_find(hay: &[u16], needle: &[u16], last: bool) -> Option<usize> {
    if needle.is_empty() {
        return Some(if last { hay.len() } else { 0 });
    }
    if needle.len() > hay.len() {
        return None;
    }
    let positions = 0..=(hay.len() - needle.len());
    if last {
        positions.rev().find(|&i| &hay[i..i + needle.len()] == needle)
    } else {
        positions.clone().find(|&i| &hay[i..i + needle.len()] == needle)
    }
}

// =============================================================================
// Array methods
// =============================================================================

fn array_native(interp: &mut Interp, tag: &str, this: Value, args: &[Value]) -> Eval {
    let Value::Array(items) = &this else {
        return Err(throw("array method on non-array"));
    };
    match tag {
        "array.push" => {
            items.borrow_mut().extend_from_slice(args);
            Ok(Value::Num(items.borrow().len() as f64))
        }
        "array.pop" => Ok(items.borrow_mut().pop().unwrap_or(Value::Undefined)),
        "array.shift" => {
            let mut v = items.borrow_mut();
            if v.is_empty() {
                Ok(Value::Undefined)
            } else {
                Ok(v.remove(0))
            }
        }
        "array.unshift" => {
            let mut v = items.borrow_mut();
            for (i, a) in args.iter().enumerate() {
                v.insert(i, a.clone());
            }
            Ok(Value::Num(v.len() as f64))
        }
        "array.slice" => {
            let v = items.borrow().clone();
            let len = v.len();
            let start = match arg(args, 0) {
                Value::Undefined => 0,
                a => clamp_index(interp.to_number(&a)?, len),
            };
            let end = match arg(args, 1) {
                Value::Undefined => len,
                a => clamp_index(interp.to_number(&a)?, len),
            };
            Ok(Value::array(if start < end {
                v[start..end].to_vec()
            } else {
                Vec::new()
            }))
        }
        "array.splice" => {
            let len = items.borrow().len();
            let start = clamp_index(interp.to_number(&arg(args, 0))?, len);
            let delete_count = match arg(args, 1) {
                Value::Undefined => len - start,
                a => (interp.to_number(&a)?.max(0.0) as usize).min(len - start),
            };
            let inserted: Vec<Value> = args.get(2..).unwrap_or(&[]).to_vec();
            let removed: Vec<Value> = items
                .borrow_mut()
                .splice(start..start + delete_count, inserted)
                .collect();
            Ok(Value::array(removed))
        }
        "array.join" | "array.toString" => {
            let sep = match arg(args, 0) {
                Value::Undefined => ",".to_string(),
                a => interp.to_string_value(&a)?,
            };
            let v = items.borrow().clone();
            let mut parts = Vec::with_capacity(v.len());
            for item in &v {
                parts.push(match item {
                    Value::Undefined | Value::Null => String::new(),
                    other => interp.to_string_value(other)?,
                });
            }
            Ok(Value::str(parts.join(&sep)))
        }
        "array.indexOf" | "array.lastIndexOf" => {
            let needle = arg(args, 0);
            let v = items.borrow();
            let found = if tag == "array.indexOf" {
                v.iter().position(|x| x.strict_eq(&needle))
            } else {
                v.iter().rposition(|x| x.strict_eq(&needle))
            };
            Ok(Value::Num(found.map_or(-1.0, |i| i as f64)))
        }
        "array.includes" => {
            let needle = arg(args, 0);
            Ok(Value::Bool(items.borrow().iter().any(|x| x.strict_eq(&needle))))
        }
        "array.concat" => {
            let mut out = items.borrow().clone();
            for a in args {
                match a {
                    Value::Array(other) => out.extend(other.borrow().iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Ok(Value::array(out))
        }
        "array.reverse" => {
            items.borrow_mut().reverse();
            Ok(this.clone())
        }
        "array.sort" => {
            let comparator = arg(args, 0);
            let mut v = items.borrow().clone();
            match comparator {
                Value::Undefined => {
                    // Default sort: string comparison, undefined last.
                    let mut keyed: Vec<(Option<String>, Value)> = Vec::with_capacity(v.len());
                    for item in v {
                        let key = match &item {
                            Value::Undefined => None,
                            other => Some(interp.to_string_value(other)?),
                        };
                        keyed.push((key, item));
                    }
                    keyed.sort_by(|a, b| match (&a.0, &b.0) {
                        (None, None) => std::cmp::Ordering::Equal,
                        (None, Some(_)) => std::cmp::Ordering::Greater,
                        (Some(_), None) => std::cmp::Ordering::Less,
                        (Some(x), Some(y)) => x.cmp(y),
                    });
                    v = keyed.into_iter().map(|(_, item)| item).collect();
                }
                func @ Value::Function(_) => {
                    // Insertion sort so the comparator can re-enter the
                    // interpreter.
                    for i in 1..v.len() {
                        let mut j = i;
                        while j > 0 {
                            let cmp = interp.call_value(
                                &func,
                                Value::Undefined,
                                &[v[j - 1].clone(), v[j].clone()],
                            )?;
                            if interp.to_number(&cmp)? > 0.0 {
                                v.swap(j - 1, j);
                                j -= 1;
                            } else {
                                break;
                            }
                        }
                    }
                }
                _ => return Err(throw("sort comparator must be a function")),
            }
            *items.borrow_mut() = v;
            Ok(this.clone())
        }
        "array.fill" => {
            let value = arg(args, 0);
            let len = items.borrow().len();
            let start = match arg(args, 1) {
                Value::Undefined => 0,
                a => clamp_index(interp.to_number(&a)?, len),
            };
            let end = match arg(args, 2) {
                Value::Undefined => len,
                a => clamp_index(interp.to_number(&a)?, len),
            };
            let mut v = items.borrow_mut();
            for slot in v.iter_mut().take(end).skip(start) {
                *slot = value.clone();
            }
            drop(v);
            Ok(this.clone())
        }
        "array.copyWithin" => {
            let len = items.borrow().len();
            let target = clamp_index(interp.to_number(&arg(args, 0))?, len);
            let start = match arg(args, 1) {
                Value::Undefined => 0,
                a => clamp_index(interp.to_number(&a)?, len),
            };
            let end = match arg(args, 2) {
                Value::Undefined => len,
                a => clamp_index(interp.to_number(&a)?, len),
            };
            let snapshot = items.borrow().clone();
            let mut v = items.borrow_mut();
            let mut t = target;
            for i in start..end {
                if t >= len {
                    break;
                }
                v[t] = snapshot[i].clone();
                t += 1;
            }
            drop(v);
            Ok(this.clone())
        }
        "array.map" | "array.filter" | "array.forEach" | "array.find" | "array.findIndex" => {
            let func = arg(args, 0);
            let v = items.borrow().clone();
            let mut mapped = Vec::with_capacity(v.len());
            for (i, item) in v.iter().enumerate() {
                let result = interp.call_value(
                    &func,
                    Value::Undefined,
                    &[item.clone(), Value::Num(i as f64), this.clone()],
                )?;
                match tag {
                    "array.map" => mapped.push(result),
                    "array.filter" => {
                        if result.is_truthy() {
                            mapped.push(item.clone());
                        }
                    }
                    "array.find" => {
                        if result.is_truthy() {
                            return Ok(item.clone());
                        }
                    }
                    "array.findIndex" => {
                        if result.is_truthy() {
                            return Ok(Value::Num(i as f64));
                        }
                    }
                    _ => {}
                }
            }
            match tag {
                "array.map" | "array.filter" => Ok(Value::array(mapped)),
                "array.find" => Ok(Value::Undefined),
                "array.findIndex" => Ok(Value::Num(-1.0)),
                _ => Ok(Value::Undefined),
            }
        }
        "array.reduce" => {
            let func = arg(args, 0);
            let v = items.borrow().clone();
            let mut iter = v.iter().enumerate();
            let mut acc = match args.get(1) {
                Some(init) => init.clone(),
                None => match iter.next() {
                    Some((_, first)) => first.clone(),
                    None => return Err(throw("reduce of empty array with no initial value")),
                },
            };
            for (i, item) in iter {
                acc = interp.call_value(
                    &func,
                    Value::Undefined,
                    &[acc, item.clone(), Value::Num(i as f64), this.clone()],
                )?;
            }
            Ok(acc)
        }
        "array.flat" => {
            let depth = match arg(args, 0) {
                Value::Undefined => 1,
                a => interp.to_number(&a)? as usize,
            };
            fn flatten(value: &[Value], depth: usize, out: &mut Vec<Value>) {
                for item in value {
                    match item {
                        Value::Array(inner) if depth > 0 => {
                            flatten(&inner.borrow().clone(), depth - 1, out)
                        }
                        other => out.push(other.clone()),
                    }
                }
            }
            let mut out = Vec::new();
            flatten(&items.borrow().clone(), depth, &mut out);
            Ok(Value::array(out))
        }
        "array.at" => {
            let v = items.borrow();
            let mut i = interp.to_number(&arg(args, 0))?;
            if i < 0.0 {
                i += v.len() as f64;
            }
            if i < 0.0 || i >= v.len() as f64 {
                return Ok(Value::Undefined);
            }
            Ok(v[i as usize].clone())
        }
        _ => Err(throw(format!("{tag} is outside the sandbox subset"))),
    }
}

// =============================================================================
// Encoding helpers
// =============================================================================

fn js_parse_int(s: &str, radix: Option<u32>) -> f64 {
    let t = s.trim_start();
    let (sign, t) = match t.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, t.strip_prefix('+').unwrap_or(t)),
    };
    let (radix, t) = match radix {
        Some(0) | None => {
            if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
                (16, hex)
            } else {
                (10, t)
            }
        }
        Some(16) => (
            16,
            t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")).unwrap_or(t),
        ),
        Some(r) if (2..=36).contains(&r) => (r, t),
        Some(_) => return f64::NAN,
    };
    let digits: String = t
        .chars()
        .take_while(|c| c.to_digit(radix).is_some())
        .collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    let mut value = 0.0f64;
    for c in digits.chars() {
        value = value * radix as f64 + c.to_digit(radix).unwrap_or(0) as f64;
    }
    sign * value
}

fn js_parse_float(s: &str) -> f64 {
    let t = s.trim_start();
    if t.starts_with("Infinity") || t.starts_with("+Infinity") {
        return f64::INFINITY;
    }
    if t.starts_with("-Infinity") {
        return f64::NEG_INFINITY;
    }
    // Longest valid float prefix.
    let bytes = t.as_bytes();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;
    while end < bytes.len() {
        let b = bytes[end];
        match b {
            b'+' | b'-' if end == 0 => {}
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot && !seen_exp => seen_dot = true,
            b'e' | b'E' if seen_digit && !seen_exp => {
                seen_exp = true;
                if matches!(bytes.get(end + 1), Some(b'+') | Some(b'-')) {
                    end += 1;
                }
            }
            _ => break,
        }
        end += 1;
    }
    if !seen_digit {
        return f64::NAN;
    }
    t[..end].parse().unwrap_or(f64::NAN)
}

fn js_escape(s: &str) -> String {
    let mut out = String::new();
    for ch in s.chars() {
        let code = ch as u32;
        if ch.is_ascii_alphanumeric() || "@*_+-./".contains(ch) {
            out.push(ch);
        } else if code < 256 {
            out.push_str(&format!("%{code:02X}"));
        } else {
            for unit in ch.encode_utf16(&mut [0u16; 2]).iter() {
                out.push_str(&format!("%u{unit:04X}"));
            }
        }
    }
    out
}

fn js_unescape(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut units: Vec<u16> = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 5 < bytes.len() && bytes[i + 1] == b'u' {
            if let Ok(unit) = u16::from_str_radix(&s[i + 2..i + 6], 16) {
                units.push(unit);
                i += 6;
                continue;
            }
        }
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(byte) = u8::from_str_radix(&s[i + 1..i + 3], 16) {
                units.push(byte as u16);
                i += 3;
                continue;
            }
        }
        let ch = s[i..].chars().next().unwrap_or('\u{fffd}');
        let mut buf = [0u16; 2];
        units.extend_from_slice(ch.encode_utf16(&mut buf));
        i += ch.len_utf8();
    }
    String::from_utf16_lossy(&units)
}

fn encode_uri_component(s: &str) -> String {
    let mut out = String::new();
    for ch in s.chars() {
        if ch.is_ascii_alphanumeric() || "-_.!~*'()".contains(ch) {
            out.push(ch);
        } else {
            let mut buf = [0u8; 4];
            for byte in ch.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    out
}

fn decode_uri_component(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 3 > bytes.len() {
                return None;
            }
            let hex = s.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

// =============================================================================
// JSON marshalling
// =============================================================================

fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Num(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::str(s.clone()),
        serde_json::Value::Array(items) => {
            Value::array(items.iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(map) => Value::object(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_value(v)))
                .collect(),
        ),
    }
}

/// `None` models JSON's "undefined is omitted" behavior at the top level.
fn value_to_json(
    interp: &mut Interp,
    value: &Value,
    depth: usize,
) -> Result<Option<serde_json::Value>, Signal> {
    if depth > 128 {
        return Err(throw("JSON.stringify depth limit"));
    }
    Ok(match value {
        Value::Undefined | Value::Function(_) | Value::Symbol(_) => None,
        Value::Null => Some(serde_json::Value::Null),
        Value::Bool(b) => Some(serde_json::Value::Bool(*b)),
        Value::Num(n) => {
            if n.is_finite() {
                Some(serde_json::Number::from_f64(*n).map_or(serde_json::Value::Null, serde_json::Value::Number))
            } else {
                Some(serde_json::Value::Null)
            }
        }
        Value::Str(s) => Some(serde_json::Value::String(s.to_string())),
        Value::BigInt(_) => return Err(throw("JSON.stringify cannot serialize a BigInt")),
        Value::Array(items) => {
            let items = items.borrow().clone();
            let mut out = Vec::with_capacity(items.len());
            for item in &items {
                out.push(
                    value_to_json(interp, item, depth + 1)?.unwrap_or(serde_json::Value::Null),
                );
            }
            Some(serde_json::Value::Array(out))
        }
        Value::Object(obj) => {
            let props = obj.borrow().props.clone();
            let mut map = serde_json::Map::new();
            for (k, v) in &props {
                if let Some(json) = value_to_json(interp, v, depth + 1)? {
                    map.insert(k.clone(), json);
                }
            }
            Some(serde_json::Value::Object(map))
        }
        Value::Regex(_) => Some(serde_json::Value::Object(serde_json::Map::new())),
    })
}
