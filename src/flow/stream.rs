//! Stream functions and the transforms chained onto them.
//!
//! A [`FunctionCall`] renders as `name(args)` followed by its call chain,
//! `.mean(by="host").publish(label="A")`. Builder methods consume and return
//! the call so chains read top to bottom; every method only appends an
//! immutable [`Transform`] descriptor, so rendering depends on nothing but the
//! argument list and the chain.

use std::fmt;

use super::expr::{Expr, KeywordArg, Literal, write_args};
use crate::error::{ValidationError, ValidationResult};

/// Name of the transform that makes a stream externally visible.
pub const PUBLISH: &str = "publish";

/// One method-style step in a call chain, e.g. `sum(by="host")`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    name: String,
    args: Vec<Expr>,
}

/// Function-call node, e.g. `data("cpu.utilization")`, with its call chain.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    name: String,
    args: Vec<Expr>,
    chain: Vec<Transform>,
}

/// Grouping for aggregation transforms: either `by` properties or an `over`
/// time window, never both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    by: Vec<String>,
    over: Option<String>,
}

/// Shared precondition of all aggregation transforms.
pub fn check_by_over_exclusive(by: &[String], over: Option<&str>) -> ValidationResult<()> {
    if !by.is_empty() && over.is_some() {
        return Err(ValidationError::invalid(
            "aggregations accept either 'by' or 'over', not both",
        ));
    }
    Ok(())
}

impl Aggregation {
    /// Aggregate across every time series in the stream.
    pub fn all() -> Self {
        Self::default()
    }

    /// Group by one or more properties.
    pub fn by<I, S>(properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            by: properties.into_iter().map(Into::into).collect(),
            over: None,
        }
    }

    /// Aggregate each series over a time window, e.g. `"1h"`.
    pub fn over(window: impl Into<String>) -> Self {
        Self {
            by: Vec::new(),
            over: Some(window.into()),
        }
    }

    /// Build from optional parts, rejecting `by` and `over` together.
    pub fn new(by: Option<Vec<String>>, over: Option<String>) -> ValidationResult<Self> {
        let by = by.unwrap_or_default();
        check_by_over_exclusive(&by, over.as_deref())?;
        Ok(Self { by, over })
    }

    fn apply(&self, mut transform: Transform) -> Transform {
        match self.by.as_slice() {
            [] => {}
            [single] => transform = transform.kwarg("by", single.as_str()),
            many => transform = transform.kwarg("by", many.to_vec()),
        }
        if let Some(window) = &self.over {
            transform = transform.kwarg("over", window.as_str());
        }
        transform
    }
}

impl Transform {
    /// Create a transform, rejecting an empty name.
    pub fn new(name: impl Into<String>) -> ValidationResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::invalid("transform name cannot be empty"));
        }
        Ok(Self::named(name))
    }

    fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Expr>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Append a keyword argument. Keys are not deduplicated.
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Expr>) -> Self {
        self.args
            .push(Expr::Keyword(KeywordArg::unchecked(key, Some(value.into()))));
        self
    }

    /// Append a keyword argument that is omitted when `value` is `None`.
    pub fn kwarg_opt<V: Into<Expr>>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.args
            .push(Expr::Keyword(KeywordArg::unchecked(key, value.map(Into::into))));
        self
    }

    /// Transform name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arguments in order, including unset keywords.
    pub fn args(&self) -> &[Expr] {
        &self.args
    }

    /// First set value for `key`.
    pub fn keyword(&self, key: &str) -> Option<&Expr> {
        self.args.iter().find_map(|arg| match arg {
            Expr::Keyword(kw) if kw.key() == key => kw.value(),
            _ => None,
        })
    }

    /// Label of a `publish` transform, from `label=` or the first positional
    /// string.
    pub fn publish_label(&self) -> Option<&str> {
        if self.name != PUBLISH {
            return None;
        }
        self.keyword("label")
            .and_then(Expr::as_str)
            .or_else(|| self.args.iter().find_map(Expr::as_str))
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        write_args(f, &self.args)?;
        f.write_str(")")
    }
}

macro_rules! aggregations {
    ($($(#[$doc:meta])* $method:ident => $name:literal;)*) => {
        $(
            $(#[$doc])*
            pub fn $method(self, aggregation: Aggregation) -> Self {
                self.aggregate($name, aggregation)
            }
        )*
    };
}

impl FunctionCall {
    /// Create a call to `name`, rejecting an empty name.
    pub fn new(name: impl Into<String>) -> ValidationResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::invalid("function name cannot be empty"));
        }
        Ok(Self::named(name))
    }

    fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            chain: Vec::new(),
        }
    }

    /// Function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arguments in order, including unset keywords.
    pub fn args(&self) -> &[Expr] {
        &self.args
    }

    /// Call chain in application order.
    pub fn chain(&self) -> &[Transform] {
        &self.chain
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Expr>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Append a keyword argument, e.g. `.kwarg("rollup", "rate")`.
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Expr>) -> Self {
        self.args
            .push(Expr::Keyword(KeywordArg::unchecked(key, Some(value.into()))));
        self
    }

    /// Append a keyword argument that is omitted when `value` is `None`.
    pub fn kwarg_opt<V: Into<Expr>>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.args
            .push(Expr::Keyword(KeywordArg::unchecked(key, value.map(Into::into))));
        self
    }

    /// Append an arbitrary transform to the call chain.
    pub fn transform(mut self, transform: Transform) -> Self {
        self.chain.push(transform);
        self
    }

    fn step(self, name: &str) -> Self {
        self.transform(Transform::named(name))
    }

    fn aggregate(self, name: &str, aggregation: Aggregation) -> Self {
        let transform = aggregation.apply(Transform::named(name));
        self.transform(transform)
    }

    /// True when some transform in the chain is `publish`.
    pub fn publishes(&self) -> bool {
        self.chain.iter().any(|t| t.name == PUBLISH)
    }

    /// True when the chain publishes under exactly `label`.
    pub fn publishes_label(&self, label: &str) -> bool {
        self.chain
            .iter()
            .any(|t| t.publish_label() == Some(label))
    }

    aggregations! {
        /// `count()`
        count => "count";
        /// `mean()`
        mean => "mean";
        /// `mean_plus_stddev()`
        mean_plus_stddev => "mean_plus_stddev";
        /// `median()`
        median => "median";
        /// `min()`
        min => "min";
        /// `max()`
        max => "max";
        /// `sample_stddev()`
        sample_stddev => "sample_stddev";
        /// `sample_variance()`
        sample_variance => "sample_variance";
        /// `size()`
        size => "size";
        /// `stddev()`
        stddev => "stddev";
        /// `sum()`
        sum => "sum";
        /// `variance()`
        variance => "variance";
    }

    /// `percentile(pct)`
    pub fn percentile(self, pct: f64, aggregation: Aggregation) -> Self {
        let transform = aggregation.apply(Transform::named("percentile").arg(pct));
        self.transform(transform)
    }

    /// `random(count=n)`
    pub fn random(self, count: u32, aggregation: Aggregation) -> Self {
        let transform = aggregation.apply(Transform::named("random").kwarg("count", count));
        self.transform(transform)
    }

    /// `top(count=.., percentage=..)`. Passing both selectors renders both.
    pub fn top(self, count: Option<u32>, percentage: Option<f64>, aggregation: Aggregation) -> Self {
        self.selection("top", count, percentage, aggregation)
    }

    /// `bottom(count=.., percentage=..)`. Passing both selectors renders both.
    pub fn bottom(
        self,
        count: Option<u32>,
        percentage: Option<f64>,
        aggregation: Aggregation,
    ) -> Self {
        self.selection("bottom", count, percentage, aggregation)
    }

    fn selection(
        self,
        name: &str,
        count: Option<u32>,
        percentage: Option<f64>,
        aggregation: Aggregation,
    ) -> Self {
        let transform = Transform::named(name)
            .kwarg_opt("count", count)
            .kwarg_opt("percentage", percentage);
        self.transform(aggregation.apply(transform))
    }

    /// `delta()`
    pub fn delta(self) -> Self {
        self.step("delta")
    }

    /// `integrate()`
    pub fn integrate(self) -> Self {
        self.step("integrate")
    }

    /// `ewma(alpha)`
    pub fn ewma(self, alpha: f64) -> Self {
        self.transform(Transform::named("ewma").arg(alpha))
    }

    /// `abs()`
    pub fn abs(self) -> Self {
        self.step("abs")
    }

    /// `ceil()`
    pub fn ceil(self) -> Self {
        self.step("ceil")
    }

    /// `floor()`
    pub fn floor(self) -> Self {
        self.step("floor")
    }

    /// `log()`
    pub fn log(self) -> Self {
        self.step("log")
    }

    /// `log10()`
    pub fn log10(self) -> Self {
        self.step("log10")
    }

    /// `sqrt()`
    pub fn sqrt(self) -> Self {
        self.step("sqrt")
    }

    /// `pow(exponent)`: raise the stream data to `exponent`.
    pub fn pow(self, exponent: f64) -> Self {
        self.transform(Transform::named("pow").arg(exponent))
    }

    /// `pow(base=..)`: raise `base` to the stream data.
    pub fn pow_base(self, base: f64) -> Self {
        self.transform(Transform::named("pow").kwarg("base", base))
    }

    /// `scale(multiplier)`
    pub fn scale(self, multiplier: f64) -> Self {
        self.transform(Transform::named("scale").arg(multiplier))
    }

    /// `above(limit, inclusive=.., clamp=..)`
    pub fn above(self, limit: f64, inclusive: Option<bool>, clamp: Option<bool>) -> Self {
        self.transform(
            Transform::named("above")
                .arg(limit)
                .kwarg_opt("inclusive", inclusive)
                .kwarg_opt("clamp", clamp),
        )
    }

    /// `below(limit, inclusive=.., clamp=..)`
    pub fn below(self, limit: f64, inclusive: Option<bool>, clamp: Option<bool>) -> Self {
        self.transform(
            Transform::named("below")
                .arg(limit)
                .kwarg_opt("inclusive", inclusive)
                .kwarg_opt("clamp", clamp),
        )
    }

    /// `between(low, high, low_inclusive=.., high_inclusive=.., clamp=..)`
    pub fn between(
        self,
        low: f64,
        high: f64,
        low_inclusive: Option<bool>,
        high_inclusive: Option<bool>,
        clamp: Option<bool>,
    ) -> Self {
        self.transform(
            Transform::named("between")
                .arg(low)
                .arg(high)
                .kwarg_opt("low_inclusive", low_inclusive)
                .kwarg_opt("high_inclusive", high_inclusive)
                .kwarg_opt("clamp", clamp),
        )
    }

    /// `not_between(low, high, low_inclusive=.., high_inclusive=..)`
    pub fn not_between(
        self,
        low: f64,
        high: f64,
        low_inclusive: Option<bool>,
        high_inclusive: Option<bool>,
    ) -> Self {
        self.transform(
            Transform::named("not_between")
                .arg(low)
                .arg(high)
                .kwarg_opt("low_inclusive", low_inclusive)
                .kwarg_opt("high_inclusive", high_inclusive),
        )
    }

    /// `equals(value, replacement=..)`
    pub fn equals(self, value: f64, replacement: Option<f64>) -> Self {
        self.transform(
            Transform::named("equals")
                .arg(value)
                .kwarg_opt("replacement", replacement),
        )
    }

    /// `not_equals(value, replacement=..)`
    pub fn not_equals(self, value: f64, replacement: Option<f64>) -> Self {
        self.transform(
            Transform::named("not_equals")
                .arg(value)
                .kwarg_opt("replacement", replacement),
        )
    }

    /// `map(lambda x: ...)`; the lambda is emitted verbatim.
    pub fn map(self, lambda: impl Into<String>) -> Self {
        self.transform(Transform::named("map").arg(Literal::Raw(lambda.into())))
    }

    /// `promote("prop", ...)`
    pub fn promote<I, S>(self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let transform = properties
            .into_iter()
            .fold(Transform::named("promote"), |t, p| t.arg(Into::<String>::into(p)));
        self.transform(transform)
    }

    /// `timeshift("1w")`
    pub fn timeshift(self, offset: impl Into<String>) -> Self {
        self.transform(Transform::named("timeshift").arg(offset.into()))
    }

    /// `publish(label="A")`
    pub fn publish(self, label: impl Into<String>) -> Self {
        self.publish_with(Some(label.into()), None)
    }

    /// `publish()`
    pub fn publish_unlabeled(self) -> Self {
        self.publish_with(None, None)
    }

    /// `publish(label=.., enable=..)`
    pub fn publish_with(self, label: Option<String>, enable: Option<bool>) -> Self {
        self.transform(
            Transform::named(PUBLISH)
                .kwarg_opt("label", label)
                .kwarg_opt("enable", enable),
        )
    }
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        write_args(f, &self.args)?;
        f.write_str(")")?;
        for transform in &self.chain {
            write!(f, ".{transform}")?;
        }
        Ok(())
    }
}

/// `data("metric")`. Optional keywords: `filter`, `rollup`, `extrapolation`,
/// `maxExtrapolations`.
pub fn data(metric: impl Into<String>) -> FunctionCall {
    FunctionCall::named("data").arg(metric.into())
}

/// `filter("property", "value")`
pub fn filter(property: impl Into<String>, value: impl Into<String>) -> FunctionCall {
    FunctionCall::named("filter")
        .arg(property.into())
        .arg(value.into())
}

/// `filter("property", "v1", "v2", ...)`, matching any of the values.
pub fn filter_any<I, S>(property: impl Into<String>, values: I) -> ValidationResult<FunctionCall>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let call = values
        .into_iter()
        .fold(FunctionCall::named("filter").arg(property.into()), |c, v| {
            c.arg(Into::<String>::into(v))
        });
    if call.args.len() < 2 {
        return Err(ValidationError::invalid("filter requires at least one value"));
    }
    Ok(call)
}

/// `const(value)`. Optional keywords: `key`, `timeseries`.
pub fn const_(value: impl Into<Expr>) -> FunctionCall {
    FunctionCall::named("const").arg(value)
}

/// `graphite("metric")`. Optional keywords: `rollup`, `extrapolation`,
/// `maxExtrapolations`, plus node-name mappings.
pub fn graphite(metric: impl Into<String>) -> FunctionCall {
    FunctionCall::named("graphite").arg(metric.into())
}

/// `newrelic("metric")`. Same keywords as [`graphite`] plus `filter`.
pub fn newrelic(metric: impl Into<String>) -> FunctionCall {
    FunctionCall::named("newrelic").arg(metric.into())
}

/// `union(a, b, ...)`
pub fn union(streams: Vec<Expr>) -> ValidationResult<FunctionCall> {
    if streams.is_empty() {
        return Err(ValidationError::invalid("union requires at least one stream"));
    }
    Ok(streams
        .into_iter()
        .fold(FunctionCall::named("union"), |call, stream| call.arg(stream)))
}

/// `detect(on)`. Optional keywords: `off`, `mode` (`"paired"` or `"split"`).
pub fn detect(on: impl Into<Expr>) -> FunctionCall {
    FunctionCall::named("detect").arg(on)
}

/// `when(predicate)`. Optional keywords: `lasting`, `at_least`.
pub fn when(predicate: impl Into<Expr>) -> FunctionCall {
    FunctionCall::named("when").arg(predicate)
}

/// `lasting(lasting=.., at_least=..)`
pub fn lasting(lasting: Option<&str>, at_least: Option<f64>) -> FunctionCall {
    FunctionCall::named("lasting")
        .kwarg_opt("lasting", lasting)
        .kwarg_opt("at_least", at_least)
}
