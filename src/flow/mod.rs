//! SignalFlow expression model
//!
//! Programs are assembled from [`FunctionCall`] streams, [`Combinator`]s and
//! [`Assignment`]s, then rendered to SignalFlow text through `Display`. There
//! is no parser; text only flows out.
//!
//! ```
//! use signalform::flow::{Aggregation, Program, data, filter};
//!
//! let program = Program::new([data("cpu.utilization")
//!     .kwarg("filter", filter("app", "shoeadmin"))
//!     .mean(Aggregation::by(["host"]))
//!     .publish("A")])
//! .unwrap();
//! assert!(program.validate().is_ok());
//! assert_eq!(
//!     program.to_string(),
//!     r#"data("cpu.utilization",filter=filter("app","shoeadmin")).mean(by="host").publish(label="A")"#
//! );
//! ```

pub mod combinators;
pub mod expr;
pub mod program;
pub mod stream;

pub use combinators::{Combinator, add, and, div, eq, ge, gt, le, lt, mul, ne, not, or, sub};
pub use expr::{Expr, KeywordArg, Literal, render};
pub use program::{Assignment, Program, Validator, finite_numbers, requires_publish};
pub use stream::{
    Aggregation, FunctionCall, PUBLISH, Transform, check_by_over_exclusive, const_, data, detect,
    filter, filter_any, graphite, lasting, newrelic, union, when,
};
