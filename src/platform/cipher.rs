//! Signature cipher interpretation
//!
//! The signature function in the player script looks like
//!
//! ```text
//! Xy=function(a){a=a.split("");Bo.Rv(a,3);Bo.kT(a);Bo.P1(a,44);return a.join("")};
//! var Bo={Rv:function(a,b){a.splice(0,b)},
//! kT:function(a){a.reverse()},
//! P1:function(a,b){var c=a[0];a[0]=a[b%a.length];a[b%a.length]=c}};
//! ```
//!
//! The helper object's method names change with every script version, so
//! each method is classified by the shape of its body. The call sequence is
//! then replayed as a list of [`Primitive`] steps; no script code is run.

use crate::error::ResolveError;
use crate::platform::locator;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Identifier characters used by the minified player script
const IDENT: &str = r"[a-zA-Z0-9$_]+";

/// Helper method body shapes
const METHOD_SHAPES: &[(PrimitiveKind, &str)] = &[
    // function(a){a.reverse()}
    (PrimitiveKind::Reverse, r"^\s*[\w$]+\.reverse\(\s*\)\s*;?\s*$"),
    // function(a,b){a.splice(0,b)}
    (
        PrimitiveKind::DropFirst,
        r"^\s*[\w$]+\.splice\(\s*0\s*,\s*[\w$]+\s*\)\s*;?\s*$",
    ),
    // function(a,b){var c=a[0];a[0]=a[b%a.length];a[b%a.length]=c}
    // function(a,b){var c=a[0];a[0]=a[b%a.length];a[b]=c}
    (
        PrimitiveKind::SwapFirst,
        r"var\s+[\w$]+\s*=\s*[\w$]+\[\s*0\s*\]\s*;\s*[\w$]+\[\s*0\s*\]\s*=\s*[\w$]+\[\s*[\w$]+\s*%\s*[\w$]+\.length\s*\]",
    ),
];

/// A single signature transform step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Primitive {
    /// Reverse the character sequence
    Reverse,
    /// Swap the first character with the one at `index % len`
    SwapFirst(usize),
    /// Drop the first `count` characters
    DropFirst(usize),
}

impl Primitive {
    /// Apply this step in place
    pub fn apply(&self, chars: &mut Vec<char>) {
        match *self {
            Primitive::Reverse => chars.reverse(),
            Primitive::SwapFirst(index) => {
                if !chars.is_empty() {
                    let index = index % chars.len();
                    chars.swap(0, index);
                }
            }
            Primitive::DropFirst(count) => {
                if count >= chars.len() {
                    chars.clear();
                } else {
                    chars.drain(..count);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrimitiveKind {
    Reverse,
    SwapFirst,
    DropFirst,
}

/// Ordered list of transform steps taken from one player script
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CipherProgram {
    steps: Vec<Primitive>,
}

impl CipherProgram {
    /// Create a program from known steps
    pub fn new(steps: Vec<Primitive>) -> Self {
        Self { steps }
    }

    /// Locate the signature function in a player script and build its program
    pub fn from_script(script_body: &str) -> Result<Self, ResolveError> {
        let function_name = locator::locate(script_body)?;
        Self::build(&function_name, script_body)
    }

    /// Build the program performed by `function_name` in the player script
    pub fn build(function_name: &str, script_body: &str) -> Result<Self, ResolveError> {
        let (param, body) = function_body(function_name, script_body)?;
        debug!("Signature function {}({}) body: {}", function_name, param, body);

        let calls = helper_calls(&body, &param)?;
        let helper = calls
            .first()
            .map(|call| call.object.clone())
            .ok_or_else(|| {
                ResolveError::CipherHelperUnresolved(format!(
                    "{} makes no helper calls",
                    function_name
                ))
            })?;
        debug!("Found transform object: {}", helper);

        let methods = classify_helper(&helper, script_body)?;
        debug!("Classified {} helper methods", methods.len());

        let mut steps = Vec::with_capacity(calls.len());
        for call in &calls {
            if call.object != helper {
                return Err(ResolveError::CipherHelperUnresolved(format!(
                    "{} calls a second helper object {}",
                    function_name, call.object
                )));
            }
            let kind = methods.get(&call.method).ok_or_else(|| {
                ResolveError::CipherHelperUnresolved(format!(
                    "helper method {}.{} has an unknown shape",
                    helper, call.method
                ))
            })?;
            steps.push(call.primitive(*kind)?);
        }

        debug!("Found {} transform steps", steps.len());
        Ok(Self { steps })
    }

    /// Steps in execution order
    pub fn steps(&self) -> &[Primitive] {
        &self.steps
    }

    /// Check if the program has no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Transform a raw signature
    pub fn apply(&self, raw_signature: &str) -> String {
        let mut chars: Vec<char> = raw_signature.chars().collect();
        for step in &self.steps {
            step.apply(&mut chars);
        }
        chars.into_iter().collect()
    }
}

/// One `Helper.method(param[, n])` call in the signature function
#[derive(Debug)]
struct HelperCall {
    object: String,
    method: String,
    argument: Option<usize>,
}

impl HelperCall {
    fn primitive(&self, kind: PrimitiveKind) -> Result<Primitive, ResolveError> {
        let argument = || {
            self.argument.ok_or_else(|| {
                ResolveError::CipherHelperUnresolved(format!(
                    "call to {}.{} has no numeric argument",
                    self.object, self.method
                ))
            })
        };
        Ok(match kind {
            PrimitiveKind::Reverse => Primitive::Reverse,
            PrimitiveKind::SwapFirst => Primitive::SwapFirst(argument()?),
            PrimitiveKind::DropFirst => Primitive::DropFirst(argument()?),
        })
    }
}

/// Find the parameter name and body of the signature function
fn function_body(function_name: &str, script_body: &str) -> Result<(String, String), ResolveError> {
    let name = regex::escape(function_name);
    let pattern = Regex::new(&format!(
        r"(?:^|[^a-zA-Z0-9$_.])(?:function\s+{name}|{name}\s*=\s*function)\s*\(\s*({IDENT})\s*\)\s*\{{([^}}]*)\}}",
    ))?;

    let captures = pattern.captures(script_body).ok_or_else(|| {
        ResolveError::CipherHelperUnresolved(format!(
            "body of signature function {} not found",
            function_name
        ))
    })?;

    Ok((captures[1].to_string(), captures[2].to_string()))
}

/// List the helper calls made on `param`, in order
fn helper_calls(body: &str, param: &str) -> Result<Vec<HelperCall>, ResolveError> {
    let param = regex::escape(param);
    let pattern = Regex::new(&format!(
        r#"({IDENT})(?:\.({IDENT})|\[\s*["']({IDENT})["']\s*\])\(\s*{param}\s*(?:,\s*(\d+)\s*)?\)"#,
    ))?;

    let calls = pattern
        .captures_iter(body)
        .filter_map(|captures| {
            let object = captures.get(1)?.as_str().to_string();
            let method = captures.get(2).or_else(|| captures.get(3))?.as_str().to_string();
            let argument = captures.get(4).and_then(|m| m.as_str().parse().ok());
            Some(HelperCall {
                object,
                method,
                argument,
            })
        })
        .collect();

    Ok(calls)
}

/// Map the helper object's method names to primitive kinds
fn classify_helper(
    helper: &str,
    script_body: &str,
) -> Result<HashMap<String, PrimitiveKind>, ResolveError> {
    let name = regex::escape(helper);
    let object_pattern = Regex::new(&format!(
        r"(?:^|[^a-zA-Z0-9$_.])(?:(?:var|let|const)\s+)?{name}\s*=\s*\{{(?s:(.*?))\}}\s*;",
    ))?;
    let object_body = object_pattern
        .captures(script_body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| {
            ResolveError::CipherHelperUnresolved(format!(
                "definition of helper object {} not found",
                helper
            ))
        })?;

    let method_pattern = Regex::new(&format!(
        r#"["']?({IDENT})["']?\s*:\s*function\s*\([^)]*\)\s*\{{([^}}]*)\}}"#,
    ))?;
    let shapes = METHOD_SHAPES
        .iter()
        .map(|(kind, shape)| Ok((*kind, Regex::new(shape)?)))
        .collect::<Result<Vec<_>, ResolveError>>()?;

    let mut methods = HashMap::new();
    for captures in method_pattern.captures_iter(object_body) {
        let method = &captures[1];
        let body = &captures[2];
        match shapes.iter().find(|(_, shape)| shape.is_match(body)) {
            Some((kind, _)) => {
                methods.insert(method.to_string(), *kind);
            }
            None => debug!("Helper method {}.{} has no known shape: {}", helper, method, body),
        }
    }

    if methods.is_empty() {
        return Err(ResolveError::CipherHelperUnresolved(format!(
            "no method of helper object {} could be classified",
            helper
        )));
    }

    Ok(methods)
}
