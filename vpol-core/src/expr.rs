//! Expression evaluation: literals, `@` variable references, and `+`
//! concatenation. Every value is a string.

use crate::error::RuntimeError;
use crate::state::Variables;

/// Split a concatenation expression on top-level `+`.
///
/// A `+` inside a double-quoted span belongs to the literal and does not
/// split. Operands are returned as written (callers trim); empty operands
/// are legal and evaluate to the empty string.
pub fn split_concat(expr: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (i, c) in expr.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '+' if !in_quotes => {
                parts.push(&expr[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&expr[start..]);
    parts
}

/// Resolve an expression to its string value.
///
/// Multiple operands concatenate left to right. A single operand starting
/// with `@` is a variable reference; anything else is a literal with one
/// layer of surrounding double quotes stripped, no escape processing.
pub fn evaluate(expr: &str, vars: &Variables) -> Result<String, RuntimeError> {
    let parts = split_concat(expr);
    if parts.len() > 1 {
        let mut out = String::new();
        for part in parts {
            out.push_str(&evaluate(part.trim(), vars)?);
        }
        return Ok(out);
    }

    let expr = expr.trim();
    if let Some(name) = expr.strip_prefix('@') {
        return vars.get(name).map(str::to_string);
    }
    Ok(strip_quotes(expr).to_string())
}

pub(crate) fn strip_quotes(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Variables {
        let mut v = Variables::default();
        for (name, value) in pairs {
            v.set(name, (*value).to_string());
        }
        v
    }

    #[test]
    fn bare_literal_passes_through() {
        assert_eq!(evaluate("hello", &vars(&[])).unwrap(), "hello");
    }

    #[test]
    fn one_quote_layer_is_stripped() {
        assert_eq!(evaluate("\"hello\"", &vars(&[])).unwrap(), "hello");
        assert_eq!(evaluate("\"\"x\"\"", &vars(&[])).unwrap(), "\"x\"");
    }

    #[test]
    fn variable_reference_resolves() {
        let v = vars(&[("name", "World")]);
        assert_eq!(evaluate("@name", &v).unwrap(), "World");
    }

    #[test]
    fn undefined_variable_fails() {
        assert!(matches!(
            evaluate("@missing", &vars(&[])),
            Err(RuntimeError::UndefinedVariable(n)) if n == "missing"
        ));
    }

    #[test]
    fn concatenation_is_left_to_right() {
        let v = vars(&[("x", "c")]);
        assert_eq!(evaluate("\"a\" + \"b\" + @x", &v).unwrap(), "abc");
    }

    #[test]
    fn empty_operands_concatenate_to_nothing() {
        assert_eq!(evaluate("\"a\" + + \"b\"", &vars(&[])).unwrap(), "ab");
    }

    #[test]
    fn plus_inside_quotes_does_not_split() {
        assert_eq!(split_concat("\"a+b\""), vec!["\"a+b\""]);
        assert_eq!(evaluate("\"a+b\"", &vars(&[])).unwrap(), "a+b");

        let v = vars(&[("x", "!")]);
        assert_eq!(evaluate("\"1+1\" + @x", &v).unwrap(), "1+1!");
    }

    #[test]
    fn split_keeps_operands_verbatim() {
        assert_eq!(split_concat("a + b"), vec!["a ", " b"]);
        assert_eq!(split_concat("a"), vec!["a"]);
    }
}
