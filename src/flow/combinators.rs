//! Logical and arithmetic combinators over SignalFlow expressions.

use std::fmt;

use super::expr::Expr;
use crate::error::{ValidationError, ValidationResult};

/// Combination of sub-expressions under an operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Combinator {
    /// `a op b op c`
    Nary {
        /// Operator interspersed between operands.
        operator: String,
        /// Operands in evaluation order (at least one).
        operands: Vec<Expr>,
    },
    /// `not a`
    Not(Box<Expr>),
}

impl Combinator {
    /// Build an n-ary combinator. Fails on an empty operator or operand list.
    pub fn new(operator: impl Into<String>, operands: Vec<Expr>) -> ValidationResult<Self> {
        let operator = operator.into();
        if operator.trim().is_empty() {
            return Err(ValidationError::invalid("combinator operator cannot be empty"));
        }
        if operands.is_empty() {
            return Err(ValidationError::invalid(format!(
                "combinator '{operator}' needs at least one operand"
            )));
        }
        Ok(Combinator::Nary { operator, operands })
    }

    /// Build a negation. Fails unless exactly one operand is given.
    pub fn negation(mut operands: Vec<Expr>) -> ValidationResult<Self> {
        if operands.len() != 1 {
            return Err(ValidationError::invalid(format!(
                "negation takes exactly one operand, got {}",
                operands.len()
            )));
        }
        let operand = operands.remove(0);
        Ok(Combinator::Not(Box::new(operand)))
    }

    /// Operator symbol (`not` for negation).
    pub fn operator(&self) -> &str {
        match self {
            Combinator::Nary { operator, .. } => operator,
            Combinator::Not(_) => "not",
        }
    }

    /// Operands in order.
    pub fn operands(&self) -> &[Expr] {
        match self {
            Combinator::Nary { operands, .. } => operands,
            Combinator::Not(operand) => std::slice::from_ref(operand.as_ref()),
        }
    }

    /// True for every variant except negation.
    pub fn is_nary(&self) -> bool {
        matches!(self, Combinator::Nary { .. })
    }

    fn binary(operator: &str, left: Expr, right: Expr) -> Expr {
        Expr::Combinator(Combinator::Nary {
            operator: operator.to_string(),
            operands: vec![left, right],
        })
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, operand: &Expr) -> fmt::Result {
    if operand.is_nary_combinator() {
        write!(f, "({operand})")
    } else {
        write!(f, "{operand}")
    }
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Combinator::Nary { operator, operands } => {
                for (idx, operand) in operands.iter().enumerate() {
                    if idx > 0 {
                        write!(f, " {operator} ")?;
                    }
                    write_operand(f, operand)?;
                }
                Ok(())
            }
            Combinator::Not(operand) => {
                f.write_str("not ")?;
                write_operand(f, operand)
            }
        }
    }
}

/// `left and right`
pub fn and(left: impl Into<Expr>, right: impl Into<Expr>) -> Expr {
    Combinator::binary("and", left.into(), right.into())
}

/// `left or right`
pub fn or(left: impl Into<Expr>, right: impl Into<Expr>) -> Expr {
    Combinator::binary("or", left.into(), right.into())
}

/// `not expr`
pub fn not(expr: impl Into<Expr>) -> Expr {
    Expr::Combinator(Combinator::Not(Box::new(expr.into())))
}

/// `left < right`
pub fn lt(left: impl Into<Expr>, right: impl Into<Expr>) -> Expr {
    Combinator::binary("<", left.into(), right.into())
}

/// `left <= right`
pub fn le(left: impl Into<Expr>, right: impl Into<Expr>) -> Expr {
    Combinator::binary("<=", left.into(), right.into())
}

/// `left > right`
pub fn gt(left: impl Into<Expr>, right: impl Into<Expr>) -> Expr {
    Combinator::binary(">", left.into(), right.into())
}

/// `left >= right`
pub fn ge(left: impl Into<Expr>, right: impl Into<Expr>) -> Expr {
    Combinator::binary(">=", left.into(), right.into())
}

/// `left == right`
pub fn eq(left: impl Into<Expr>, right: impl Into<Expr>) -> Expr {
    Combinator::binary("==", left.into(), right.into())
}

/// `left != right`
pub fn ne(left: impl Into<Expr>, right: impl Into<Expr>) -> Expr {
    Combinator::binary("!=", left.into(), right.into())
}

/// `left + right`
pub fn add(left: impl Into<Expr>, right: impl Into<Expr>) -> Expr {
    Combinator::binary("+", left.into(), right.into())
}

/// `left - right`
pub fn sub(left: impl Into<Expr>, right: impl Into<Expr>) -> Expr {
    Combinator::binary("-", left.into(), right.into())
}

/// `left * right`
pub fn mul(left: impl Into<Expr>, right: impl Into<Expr>) -> Expr {
    Combinator::binary("*", left.into(), right.into())
}

/// `left / right`
pub fn div(left: impl Into<Expr>, right: impl Into<Expr>) -> Expr {
    Combinator::binary("/", left.into(), right.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::stream::{data, filter};

    #[test]
    fn empty_operator_is_rejected() {
        assert!(Combinator::new("", vec![Expr::from(1)]).is_err());
        assert!(Combinator::new("   ", vec![Expr::from(1)]).is_err());
    }

    #[test]
    fn empty_operands_are_rejected() {
        assert!(Combinator::new("and", vec![]).is_err());
    }

    #[test]
    fn negation_requires_exactly_one_operand() {
        assert!(Combinator::negation(vec![]).is_err());
        assert!(Combinator::negation(vec![Expr::from(1), Expr::from(2)]).is_err());
        let not = Combinator::negation(vec![Expr::ident("A")]).unwrap();
        assert_eq!(not.to_string(), "not A");
        assert_eq!(not.operator(), "not");
        assert_eq!(not.operands().len(), 1);
    }

    #[test]
    fn single_operand_renders_alone() {
        let c = Combinator::new("and", vec![Expr::ident("A")]).unwrap();
        assert_eq!(c.to_string(), "A");
    }

    #[test]
    fn filters_combine_without_parentheses_at_top_level() {
        let expr = and(filter("app", "shoeadmin"), filter("env", "prod"));
        assert_eq!(
            expr.to_string(),
            "filter(\"app\",\"shoeadmin\") and filter(\"env\",\"prod\")"
        );
    }

    #[test]
    fn nested_combinators_are_parenthesized() {
        let f = data("f");
        let g = data("g");
        let expr = and(not(f.clone()), or(f.clone(), g.clone()));
        assert_eq!(
            expr.to_string(),
            format!("not {f} and ({f} or {g})")
        );
    }

    #[test]
    fn negated_group_keeps_its_parentheses() {
        let expr = not(and(Expr::ident("A"), Expr::ident("B")));
        assert_eq!(expr.to_string(), "not (A and B)");
    }

    #[test]
    fn arithmetic_respects_grouping() {
        let expr = div(sub(Expr::ident("A"), Expr::ident("B")), Expr::ident("A"));
        assert_eq!(expr.to_string(), "(A - B) / A");
        assert_eq!(mul(Expr::ident("A"), 100).to_string(), "A * 100");
        assert_eq!(gt(Expr::ident("A"), 0.5).to_string(), "A > 0.5");
    }
}
