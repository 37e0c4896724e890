//! Dashboard filters: saved variables, ad hoc sources and a time window.

use serde::Serialize;
use serde_json::{Value, json};

use crate::error::{ValidationError, ValidationResult};

fn non_empty(value: impl Into<String>, what: &str) -> ValidationResult<String> {
    let value = value.into();
    if value.trim().is_empty() {
        return Err(ValidationError::invalid(format!("{what} cannot be empty")));
    }
    Ok(value)
}

/// Filter shown as a drop-down at the top of the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterVariable {
    property: String,
    alias: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(rename = "value")]
    values: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    preferred_suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    apply_if_exists: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    replace_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    restricted: Option<bool>,
}

impl FilterVariable {
    /// Variable over `property`, labelled `alias` in the UI.
    pub fn new(property: impl Into<String>, alias: impl Into<String>) -> ValidationResult<Self> {
        Ok(Self {
            property: non_empty(property, "filter property")?,
            alias: non_empty(alias, "filter alias")?,
            description: None,
            values: Vec::new(),
            preferred_suggestions: Vec::new(),
            apply_if_exists: None,
            replace_only: None,
            required: None,
            restricted: None,
        })
    }

    /// Help text.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Default values, replacing earlier ones.
    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Values listed first in the drop-down.
    pub fn with_preferred_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preferred_suggestions = suggestions.into_iter().map(Into::into).collect();
        self
    }

    /// Only apply to charts whose data carries the property.
    pub fn apply_if_exists(mut self, enabled: bool) -> Self {
        self.apply_if_exists = Some(enabled);
        self
    }

    /// Only replace existing filters on the property, never add one.
    pub fn replace_only(mut self, enabled: bool) -> Self {
        self.replace_only = Some(enabled);
        self
    }

    /// A value must always be selected.
    pub fn required(mut self, enabled: bool) -> Self {
        self.required = Some(enabled);
        self
    }

    /// Values are limited to the preferred suggestions.
    pub fn restricted(mut self, enabled: bool) -> Self {
        self.restricted = Some(enabled);
        self
    }
}

/// Ad hoc filter applied to every chart on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterSource {
    property: String,
    #[serde(rename = "value")]
    values: Vec<String>,
    #[serde(rename = "NOT")]
    negated: bool,
}

impl FilterSource {
    /// Match `property` against any of `values`. At least one value is needed.
    pub fn new<I, S>(property: impl Into<String>, values: I) -> ValidationResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let property = non_empty(property, "filter property")?;
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() || values.iter().any(|v| v.trim().is_empty()) {
            return Err(ValidationError::invalid(format!(
                "filter source '{property}' needs non-empty values"
            )));
        }
        Ok(Self {
            property,
            values,
            negated: false,
        })
    }

    /// Exclude matching data instead of keeping it.
    pub fn negated(mut self, negated: bool) -> Self {
        self.negated = negated;
        self
    }
}

/// Time window overriding every chart's own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterTime {
    /// From `start` (e.g. `-1h`) until now.
    Relative {
        /// Negative offset with a unit suffix
        start: String,
    },
    /// Fixed window in epoch milliseconds.
    Absolute {
        /// Start, inclusive
        start_ms: u64,
        /// End, not before `start_ms`
        end_ms: u64,
    },
}

impl FilterTime {
    /// Window such as `-15m`, `-2h`, `-7d` or `-1w`, ending now.
    pub fn relative(start: impl Into<String>) -> ValidationResult<Self> {
        let start = start.into();
        let body = start.strip_prefix('-').ok_or_else(|| {
            ValidationError::invalid(format!("relative start '{start}' must begin with '-'"))
        })?;
        let digits = body
            .strip_suffix(['m', 'h', 'd', 'w'])
            .ok_or_else(|| {
                ValidationError::invalid(format!(
                    "relative start '{start}' must end with one of m, h, d, w"
                ))
            })?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::invalid(format!(
                "relative start '{start}' needs a whole number after '-'"
            )));
        }
        Ok(FilterTime::Relative { start })
    }

    /// Fixed window; `start_ms` must not be after `end_ms`.
    pub fn absolute(start_ms: u64, end_ms: u64) -> ValidationResult<Self> {
        if start_ms > end_ms {
            return Err(ValidationError::invalid(format!(
                "filter start {start_ms} is after end {end_ms}"
            )));
        }
        Ok(FilterTime::Absolute { start_ms, end_ms })
    }

    /// API representation.
    pub fn to_value(&self) -> Value {
        match self {
            FilterTime::Relative { start } => json!({"start": start, "end": "Now"}),
            FilterTime::Absolute { start_ms, end_ms } => json!({"start": start_ms, "end": end_ms}),
        }
    }
}

/// Filters attached to a dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardFilters {
    variables: Vec<FilterVariable>,
    sources: Vec<FilterSource>,
    time: Option<FilterTime>,
}

impl DashboardFilters {
    /// No filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Variables, replacing earlier ones.
    pub fn with_variables(mut self, variables: Vec<FilterVariable>) -> Self {
        self.variables = variables;
        self
    }

    /// Sources, replacing earlier ones.
    pub fn with_sources(mut self, sources: Vec<FilterSource>) -> Self {
        self.sources = sources;
        self
    }

    /// Dashboard-wide time window.
    pub fn with_time(mut self, time: FilterTime) -> Self {
        self.time = Some(time);
        self
    }

    /// Whether nothing is set.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.sources.is_empty() && self.time.is_none()
    }

    /// API representation; empty parts are omitted.
    pub fn to_value(&self) -> Value {
        let mut filters = serde_json::Map::new();
        if !self.variables.is_empty() {
            filters.insert("variables".into(), to_json(&self.variables));
        }
        if !self.sources.is_empty() {
            filters.insert("sources".into(), to_json(&self.sources));
        }
        if let Some(time) = &self.time {
            filters.insert("time".into(), time.to_value());
        }
        Value::Object(filters)
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_serializes_set_fields_only() {
        let variable = FilterVariable::new("app", "application name")
            .unwrap()
            .with_values(["my-app"])
            .required(true);
        assert_eq!(
            to_json(&variable),
            json!({
                "property": "app",
                "alias": "application name",
                "value": ["my-app"],
                "required": true,
            })
        );
        assert!(FilterVariable::new("app", " ").is_err());
        assert!(FilterVariable::new("", "alias").is_err());
    }

    #[test]
    fn source_needs_values() {
        assert!(FilterSource::new("env", Vec::<String>::new()).is_err());
        assert!(FilterSource::new("env", [""]).is_err());
        let source = FilterSource::new("env", ["canary"]).unwrap().negated(true);
        assert_eq!(
            to_json(&source),
            json!({"property": "env", "value": ["canary"], "NOT": true})
        );
    }

    #[test]
    fn relative_time_shapes() {
        assert_eq!(
            FilterTime::relative("-1h").unwrap().to_value(),
            json!({"start": "-1h", "end": "Now"})
        );
        assert!(FilterTime::relative("1h").is_err());
        assert!(FilterTime::relative("-1y").is_err());
        assert!(FilterTime::relative("-h").is_err());
        assert!(FilterTime::relative("--1h").is_err());
    }

    #[test]
    fn absolute_time_is_ordered() {
        assert_eq!(
            FilterTime::absolute(10, 20).unwrap().to_value(),
            json!({"start": 10, "end": 20})
        );
        assert!(FilterTime::absolute(20, 10).is_err());
    }

    #[test]
    fn empty_parts_are_omitted() {
        let filters = DashboardFilters::new().with_time(FilterTime::relative("-15m").unwrap());
        assert_eq!(filters.to_value(), json!({"time": {"start": "-15m", "end": "Now"}}));
        assert!(DashboardFilters::new().is_empty());
    }
}
