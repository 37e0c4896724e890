//! Event overlays drawn on top of a dashboard's charts.

use serde::Serialize;
use serde_json::Value;

use crate::error::{ValidationError, ValidationResult};

/// Highest palette index an overlay may use.
pub const MAX_EVENT_COLOR_INDEX: u8 = 20;

/// Where overlay events come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    /// Incidents raised by detectors
    DetectorEvent,
    /// Custom event time series
    EventTimeSeries,
}

/// Search selecting the events of an overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSignal {
    event_search_text: String,
    event_type: EventType,
}

impl EventSignal {
    /// Events of `event_type` whose name matches `search_text` (`*` wildcards
    /// allowed).
    pub fn new(search_text: impl Into<String>, event_type: EventType) -> ValidationResult<Self> {
        let event_search_text = search_text.into();
        if event_search_text.trim().is_empty() {
            return Err(ValidationError::invalid("event search text cannot be empty"));
        }
        Ok(Self {
            event_search_text,
            event_type,
        })
    }
}

/// Overlay offered in the dashboard's event drop-down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOverlay {
    event_signal: EventSignal,
    #[serde(skip_serializing_if = "Option::is_none")]
    event_color_index: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    event_line: Option<bool>,
}

impl EventOverlay {
    /// Overlay for `signal` with the service's default styling.
    pub fn new(signal: EventSignal) -> Self {
        Self {
            event_signal: signal,
            event_color_index: None,
            event_line: None,
        }
    }

    /// Palette index, 0 to [`MAX_EVENT_COLOR_INDEX`].
    pub fn with_color_index(mut self, index: u8) -> ValidationResult<Self> {
        if index > MAX_EVENT_COLOR_INDEX {
            return Err(ValidationError::invalid(format!(
                "event color index {index} is outside 0-{MAX_EVENT_COLOR_INDEX}"
            )));
        }
        self.event_color_index = Some(index);
        Ok(self)
    }

    /// Draw a vertical line across the charts at each event.
    pub fn with_event_line(mut self, show: bool) -> Self {
        self.event_line = Some(show);
        self
    }

    /// API representation.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Overlay shown when the dashboard opens. Styling comes from the matching
/// [`EventOverlay`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedEventOverlay {
    event_signal: EventSignal,
}

impl SelectedEventOverlay {
    /// Select `signal` by default.
    pub fn new(signal: EventSignal) -> Self {
        Self {
            event_signal: signal,
        }
    }

    /// API representation.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deploys() -> EventSignal {
        EventSignal::new("deploy", EventType::EventTimeSeries).unwrap()
    }

    #[test]
    fn overlay_shape() {
        let overlay = EventOverlay::new(deploys())
            .with_color_index(1)
            .unwrap()
            .with_event_line(true);
        assert_eq!(
            overlay.to_value(),
            json!({
                "eventSignal": {"eventSearchText": "deploy", "eventType": "eventTimeSeries"},
                "eventColorIndex": 1,
                "eventLine": true,
            })
        );
        assert_eq!(
            SelectedEventOverlay::new(deploys()).to_value(),
            json!({"eventSignal": {"eventSearchText": "deploy", "eventType": "eventTimeSeries"}})
        );
    }

    #[test]
    fn color_index_is_bounded() {
        assert!(EventOverlay::new(deploys()).with_color_index(20).is_ok());
        assert!(EventOverlay::new(deploys()).with_color_index(21).is_err());
    }

    #[test]
    fn search_text_is_required() {
        assert!(EventSignal::new("  ", EventType::DetectorEvent).is_err());
    }
}
