//! Scalar placeholder assignments such as `drop_rate=0.5 is_training=false`.
//!
//! A value is a single literal or a parenthesised tuple `(1,2,3)`:
//! `true`/`false` give bool tensors, integers give i32 tensors and anything
//! with a decimal point or exponent gives f32 tensors. Tuples mixing integers
//! and floats are promoted to f32.

use crate::{IOName, ModelError, ModelResult, Shape, Tensor};

#[derive(Clone, Copy, Debug, PartialEq)]
enum Literal {
    Bool(bool),
    Int(i32),
    Float(f32),
}

/// Parses a single `name=value` assignment.
pub fn parse_expression(expr: &str) -> ModelResult<(IOName, Tensor)> {
    let invalid = |reason: &str| ModelError::configuration(format!("invalid expression `{expr}`: {reason}"));

    let (name, value) = expr.split_once('=').ok_or_else(|| invalid("missing `=`"))?;
    let name = name.trim();
    let value = value.trim();
    if name.is_empty() {
        return Err(invalid("empty placeholder name"));
    }
    if value.is_empty() {
        return Err(invalid("empty value"));
    }

    let (literals, shape) = match value.strip_prefix('(') {
        Some(rest) => {
            let inner = rest.strip_suffix(')').ok_or_else(|| invalid("unbalanced parentheses"))?;
            let literals = inner
                .split(',')
                .map(|tok| parse_literal(tok.trim()).ok_or_else(|| invalid("bad literal in tuple")))
                .collect::<ModelResult<Vec<_>>>()?;
            let len = literals.len();
            (literals, Shape::from_slice(&[len]))
        }
        None => {
            let literal = parse_literal(value).ok_or_else(|| invalid("bad literal"))?;
            (vec![literal], Shape::scalar())
        }
    };

    let tensor = literals_to_tensor(shape, &literals).ok_or_else(|| invalid("cannot mix bool and numeric values"))?;
    Ok((IOName(name.to_string()), tensor))
}

/// Parses whitespace-separated assignments; whitespace inside a tuple is kept.
pub fn parse_expressions(input: &str) -> ModelResult<Vec<(IOName, Tensor)>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in input.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens.iter().map(|t| parse_expression(t)).collect()
}

fn parse_literal(tok: &str) -> Option<Literal> {
    if tok.eq_ignore_ascii_case("true") {
        return Some(Literal::Bool(true));
    }
    if tok.eq_ignore_ascii_case("false") {
        return Some(Literal::Bool(false));
    }
    if tok.contains(['.', 'e', 'E']) {
        return tok.parse::<f32>().ok().filter(|v| v.is_finite()).map(Literal::Float);
    }
    tok.parse::<i32>().ok().map(Literal::Int)
}

fn literals_to_tensor(shape: Shape, literals: &[Literal]) -> Option<Tensor> {
    let bools = literals.iter().filter(|l| matches!(l, Literal::Bool(_))).count();
    if bools == literals.len() {
        let values: Vec<bool> = literals
            .iter()
            .map(|l| matches!(l, Literal::Bool(true)))
            .collect();
        return Tensor::from_values(shape, &values).ok();
    }
    if bools > 0 {
        return None;
    }

    if literals.iter().any(|l| matches!(l, Literal::Float(_))) {
        let values: Vec<f32> = literals
            .iter()
            .map(|l| match *l {
                Literal::Float(v) => v,
                Literal::Int(v) => v as f32,
                Literal::Bool(_) => unreachable!("bools rejected above"),
            })
            .collect();
        return Tensor::from_values(shape, &values).ok();
    }

    let values: Vec<i32> = literals
        .iter()
        .filter_map(|l| match *l {
            Literal::Int(v) => Some(v),
            _ => None,
        })
        .collect();
    Tensor::from_values(shape, &values).ok()
}
