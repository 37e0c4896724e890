//! Top-level SignalFlow programs and label assignments.

use std::fmt;

use super::expr::{Expr, Literal};
use super::stream::FunctionCall;
use crate::error::{ValidationError, ValidationResult};

/// `label = expr`
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    label: String,
    expr: Box<Expr>,
}

impl Assignment {
    /// Bind `expr` to `label`. The label must be a SignalFlow identifier.
    pub fn new(label: impl Into<String>, expr: impl Into<Expr>) -> ValidationResult<Self> {
        let label = label.into();
        let mut chars = label.chars();
        let valid_start = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ValidationError::invalid(format!(
                "'{label}' is not a valid assignment label"
            )));
        }
        Ok(Self {
            label,
            expr: Box::new(expr.into()),
        })
    }

    /// Bound label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Right-hand expression.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Identifier expression referring to this binding.
    pub fn reference(&self) -> Expr {
        Expr::ident(self.label.clone())
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.label, self.expr)
    }
}

/// Validation pass run by [`Program::validate`].
pub type Validator = fn(&Program) -> ValidationResult<()>;

/// Default validator: at least one statement must publish.
pub fn requires_publish(program: &Program) -> ValidationResult<()> {
    let publishes = program
        .statements
        .iter()
        .any(|stmt| statement_call(stmt).is_some_and(FunctionCall::publishes));
    if publishes {
        Ok(())
    } else {
        Err(ValidationError::ProgramDoesNotPublish)
    }
}

/// Default validator: NaN and infinite float literals have no SignalFlow
/// spelling.
pub fn finite_numbers(program: &Program) -> ValidationResult<()> {
    match program.statements.iter().find_map(non_finite) {
        Some(value) => Err(ValidationError::invalid(format!(
            "float literal {value} cannot be rendered in SignalFlow"
        ))),
        None => Ok(()),
    }
}

fn non_finite(expr: &Expr) -> Option<f64> {
    match expr {
        Expr::Literal(Literal::Float(x)) if !x.is_finite() => Some(*x),
        Expr::Literal(Literal::List(items)) => items.iter().find_map(non_finite),
        Expr::Literal(_) => None,
        Expr::Keyword(kw) => kw.value().and_then(non_finite),
        Expr::Combinator(c) => c.operands().iter().find_map(non_finite),
        Expr::Call(call) => call
            .args()
            .iter()
            .chain(call.chain().iter().flat_map(|t| t.args()))
            .find_map(non_finite),
        Expr::Assign(assign) => non_finite(assign.expr()),
    }
}

/// The call whose chain decides whether a statement publishes.
fn statement_call(stmt: &Expr) -> Option<&FunctionCall> {
    match stmt {
        Expr::Call(call) => Some(call),
        Expr::Assign(assign) => assign.expr().as_call(),
        _ => None,
    }
}

/// Ordered sequence of top-level SignalFlow statements.
#[derive(Debug, Clone)]
pub struct Program {
    statements: Vec<Expr>,
    validators: Vec<Validator>,
}

impl Default for Program {
    fn default() -> Self {
        Self {
            statements: Vec::new(),
            validators: vec![requires_publish, finite_numbers],
        }
    }
}

impl Program {
    /// Build a program from statements, each of which must be a function
    /// call or an assignment.
    pub fn new<I>(statements: I) -> ValidationResult<Self>
    where
        I: IntoIterator,
        I::Item: Into<Expr>,
    {
        let mut program = Self::default();
        for stmt in statements {
            program.add_statement(stmt)?;
        }
        Ok(program)
    }

    /// Append a statement.
    pub fn add_statement(&mut self, stmt: impl Into<Expr>) -> ValidationResult<()> {
        let stmt = stmt.into();
        match stmt {
            Expr::Call(_) | Expr::Assign(_) => {
                self.statements.push(stmt);
                Ok(())
            }
            other => Err(ValidationError::invalid(format!(
                "program statements must be function calls or assignments, got `{other}`"
            ))),
        }
    }

    /// Builder form of [`Program::add_statement`].
    pub fn with_statement(mut self, stmt: impl Into<Expr>) -> ValidationResult<Self> {
        self.add_statement(stmt)?;
        Ok(self)
    }

    /// Attach an extra validation pass.
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Statements in program order.
    pub fn statements(&self) -> &[Expr] {
        &self.statements
    }

    /// Whether the program has no statements.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Run every validator, stopping at the first failure.
    pub fn validate(&self) -> ValidationResult<()> {
        self.validators
            .iter()
            .try_for_each(|validator| validator(self))
    }

    /// First statement publishing under `label`.
    pub fn find_label(&self, label: &str) -> Option<&Expr> {
        self.statements.iter().find(|stmt| {
            statement_call(stmt).is_some_and(|call| call.publishes_label(label))
        })
    }
}

impl PartialEq for Program {
    fn eq(&self, other: &Self) -> bool {
        self.statements == other.statements
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, stmt) in self.statements.iter().enumerate() {
            if idx > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{stmt}")?;
        }
        Ok(())
    }
}
