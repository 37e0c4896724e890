use std::fmt;

use super::combinators::Combinator;
use super::program::Assignment;
use super::stream::FunctionCall;
use crate::error::{ValidationError, ValidationResult};

/// Primitive values that can appear as SignalFlow arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Double-quoted string literal.
    Str(String),
    /// Signed integer literal.
    Int(i64),
    /// Floating-point literal.
    Float(f64),
    /// Boolean literal, rendered as `True`/`False`.
    Bool(bool),
    /// The `None` constant.
    None,
    /// Verbatim text: identifiers bound by assignments, lambdas, durations.
    Raw(String),
    /// Bracketed list of expressions.
    List(Vec<Expr>),
}

/// A `key=value` argument. A keyword without a value is omitted when its
/// enclosing call is rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordArg {
    key: String,
    value: Option<Box<Expr>>,
}

/// Expression tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value.
    Literal(Literal),
    /// Keyword argument inside a call.
    Keyword(KeywordArg),
    /// Logical/arithmetic combination of sub-expressions.
    Combinator(Combinator),
    /// Stream function call with its call chain.
    Call(FunctionCall),
    /// `label = expr` binding.
    Assign(Assignment),
}

impl KeywordArg {
    /// Build a keyword argument, rejecting an empty key.
    pub fn new(key: impl Into<String>, value: Option<Expr>) -> ValidationResult<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ValidationError::invalid("keyword argument name cannot be empty"));
        }
        Ok(Self::unchecked(key, value))
    }

    pub(crate) fn unchecked(key: impl Into<String>, value: Option<Expr>) -> Self {
        Self {
            key: key.into(),
            value: value.map(Box::new),
        }
    }

    /// Keyword name.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Bound value, if any.
    pub fn value(&self) -> Option<&Expr> {
        self.value.as_deref()
    }

    /// True when the keyword carries a value and will be rendered.
    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }
}

impl Expr {
    /// A bare identifier, typically referencing an assignment label.
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Literal(Literal::Raw(name.into()))
    }

    /// True for keyword arguments without a value.
    pub fn is_unset(&self) -> bool {
        matches!(self, Expr::Keyword(kw) if !kw.is_set())
    }

    /// True for n-ary combinators, the only nodes that need parentheses when
    /// nested inside another combinator.
    pub fn is_nary_combinator(&self) -> bool {
        matches!(self, Expr::Combinator(c) if c.is_nary())
    }

    /// Borrow the node as a function call.
    pub fn as_call(&self) -> Option<&FunctionCall> {
        match self {
            Expr::Call(call) => Some(call),
            _ => None,
        }
    }

    /// String value of a string literal.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Expr::Literal(Literal::Str(s)) => Some(s),
            _ => None,
        }
    }
}

/// Render an expression into SignalFlow text.
pub fn render(expr: &Expr) -> String {
    expr.to_string()
}

/// Writes `a,b,c`, skipping keyword arguments that have no value.
pub(crate) fn write_args(f: &mut fmt::Formatter<'_>, args: &[Expr]) -> fmt::Result {
    let mut first = true;
    for arg in args.iter().filter(|arg| !arg.is_unset()) {
        if !first {
            f.write_str(",")?;
        }
        first = false;
        write!(f, "{arg}")?;
    }
    Ok(())
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for ch in s.chars() {
        match ch {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            other => write!(f, "{other}")?,
        }
    }
    f.write_str("\"")
}

/// Floats as SignalFlow's parser reads them: whole values keep `.0`, and
/// exponents carry a sign and at least two digits (`1e+16`, `2.5e-07`).
fn write_float(f: &mut fmt::Formatter<'_>, x: f64) -> fmt::Result {
    // Debug switches to exponent form at the same magnitudes (1e16, 1e-5).
    let text = format!("{x:?}");
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            write!(f, "{mantissa}e{sign}{digits:0>2}")
        }
        None => f.write_str(&text),
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => write_quoted(f, s),
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Float(x) => write_float(f, *x),
            Literal::Bool(true) => f.write_str("True"),
            Literal::Bool(false) => f.write_str("False"),
            Literal::None => f.write_str("None"),
            Literal::Raw(text) => f.write_str(text),
            Literal::List(items) => {
                f.write_str("[")?;
                write_args(f, items)?;
                f.write_str("]")
            }
        }
    }
}

impl fmt::Display for KeywordArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.key, value),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(lit) => lit.fmt(f),
            Expr::Keyword(kw) => kw.fmt(f),
            Expr::Combinator(c) => c.fmt(f),
            Expr::Call(call) => call.fmt(f),
            Expr::Assign(assign) => assign.fmt(f),
        }
    }
}

impl From<Literal> for Expr {
    fn from(value: Literal) -> Self {
        Expr::Literal(value)
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::Literal(Literal::Str(value.to_string()))
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::Literal(Literal::Str(value))
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::Literal(Literal::Int(value))
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Expr::Literal(Literal::Int(value.into()))
    }
}

impl From<u32> for Expr {
    fn from(value: u32) -> Self {
        Expr::Literal(Literal::Int(value.into()))
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Literal(Literal::Float(value))
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::Literal(Literal::Bool(value))
    }
}

impl<T: Into<Expr>> From<Vec<T>> for Expr {
    fn from(values: Vec<T>) -> Self {
        Expr::Literal(Literal::List(values.into_iter().map(Into::into).collect()))
    }
}

impl From<KeywordArg> for Expr {
    fn from(value: KeywordArg) -> Self {
        Expr::Keyword(value)
    }
}

impl From<Combinator> for Expr {
    fn from(value: Combinator) -> Self {
        Expr::Combinator(value)
    }
}

impl From<FunctionCall> for Expr {
    fn from(value: FunctionCall) -> Self {
        Expr::Call(value)
    }
}

impl From<Assignment> for Expr {
    fn from(value: Assignment) -> Self {
        Expr::Assign(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_render_in_signalflow_syntax() {
        assert_eq!(render(&Expr::from("cpu")), "\"cpu\"");
        assert_eq!(render(&Expr::from(42)), "42");
        assert_eq!(render(&Expr::from(0.5)), "0.5");
        assert_eq!(render(&Expr::from(2.0)), "2.0");
        assert_eq!(render(&Expr::from(true)), "True");
        assert_eq!(render(&Expr::Literal(Literal::None)), "None");
        assert_eq!(render(&Expr::ident("A")), "A");
        assert_eq!(render(&Expr::from(vec!["a", "b"])), "[\"a\",\"b\"]");
    }

    #[test]
    fn large_and_small_floats_use_signed_exponents() {
        assert_eq!(render(&Expr::from(1e16)), "1e+16");
        assert_eq!(render(&Expr::from(2.5e-7)), "2.5e-07");
        assert_eq!(render(&Expr::from(-1.5e300)), "-1.5e+300");
        assert_eq!(render(&Expr::from(1e15)), "1000000000000000.0");
        assert_eq!(render(&Expr::from(0.0001)), "0.0001");
        assert_eq!(render(&Expr::from(0.00001)), "1e-05");
    }

    #[test]
    fn strings_escape_quotes_and_backslashes() {
        assert_eq!(render(&Expr::from("say \"hi\"\\")), "\"say \\\"hi\\\"\\\\\"");
    }

    #[test]
    fn keyword_quotes_strings_but_not_numbers() {
        let kw = KeywordArg::new("rollup", Some("rate".into())).unwrap();
        assert_eq!(kw.to_string(), "rollup=\"rate\"");

        let kw = KeywordArg::new("maxExtrapolations", Some(100.into())).unwrap();
        assert_eq!(kw.to_string(), "maxExtrapolations=100");
    }

    #[test]
    fn keyword_requires_a_name() {
        assert!(matches!(
            KeywordArg::new("  ", None),
            Err(ValidationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn unset_keywords_are_skipped_in_lists() {
        let list = Expr::from(vec![
            Expr::from("a"),
            KeywordArg::unchecked("skip", None).into(),
            Expr::from(1),
        ]);
        assert_eq!(list.to_string(), "[\"a\",1]");
    }
}
