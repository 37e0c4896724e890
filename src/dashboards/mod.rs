//! Dashboard resources
//!
//! A [`Dashboard`] owns its charts locally. Remotely, a dashboard only holds
//! placements (`{chartId, row, column, width, height}`), so updates diff the
//! local charts against the remote ones by name:
//!
//! 1. placements without a `chartId` are pruned, the rest are fetched;
//! 2. remote charts with a local namesake are overwritten with the local chart;
//! 3. local charts with no remote namesake are created and placed;
//! 4. remote charts with no local namesake are deleted and unplaced.
//!
//! There is no rollback: a failure part way leaves earlier steps applied, and
//! re-running the update converges because matching is by name.
//!
//! Dashboards are created through `/dashboard/simple`, which keeps only the
//! name and the charts. Other options (description, [`filters`], event
//! [`overlays`]) are written by a follow-up PUT. Every dashboard belongs to a
//! [`group`]; one created on its own gets a group of its own.

use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::charts::{CHART_ENDPOINT, Chart};
use crate::error::{Result, ValidationError, ValidationResult};
use crate::resources::client::{into_object, remote_id};
use crate::resources::{Client, Resource, Syncable};
use crate::transport::ApiRequest;

pub mod filters;
pub mod group;
pub mod overlays;

pub use filters::{DashboardFilters, FilterSource, FilterTime, FilterVariable};
pub use group::{DASHBOARD_GROUP_ENDPOINT, DashboardGroup};
pub use overlays::{EventOverlay, EventSignal, EventType, SelectedEventOverlay};

/// Collection endpoint for dashboards.
pub const DASHBOARD_ENDPOINT: &str = "/dashboard";

/// Grid position given to charts added by an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildPlacement {
    /// Row index
    pub row: u32,
    /// Column index, 0 to 11
    pub column: u32,
    /// Width in columns
    pub width: u32,
    /// Height in rows
    pub height: u32,
}

impl Default for ChildPlacement {
    fn default() -> Self {
        Self {
            row: 99,
            column: 11,
            width: 6,
            height: 3,
        }
    }
}

impl ChildPlacement {
    /// Placement entry for `chart_id`.
    pub fn to_value(&self, chart_id: &str) -> Value {
        json!({
            "chartId": chart_id,
            "row": self.row,
            "column": self.column,
            "width": self.width,
            "height": self.height,
        })
    }
}

/// Remote chart as seen through a dashboard placement.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RemoteChart {
    id: String,
    name: Option<String>,
}

/// A dashboard in SignalFx.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    resource: Resource,
    charts: Vec<Chart>,
    placement: ChildPlacement,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Dashboard {
    /// Empty dashboard.
    pub fn new() -> Self {
        Self {
            resource: Resource::new(DASHBOARD_ENDPOINT),
            charts: Vec::new(),
            placement: ChildPlacement::default(),
        }
    }

    /// Dashboard name.
    pub fn name(&self) -> Option<&str> {
        self.resource.name()
    }

    /// Local charts in declaration order.
    pub fn charts(&self) -> &[Chart] {
        &self.charts
    }

    /// Placement used for newly added charts.
    pub fn child_placement(&self) -> ChildPlacement {
        self.placement
    }

    /// Set the dashboard name.
    pub fn with_name(mut self, name: impl Into<String>) -> ValidationResult<Self> {
        self.resource.set_name(name)?;
        Ok(self)
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.resource.set_description(description);
        self
    }

    /// Pin the remote id.
    pub fn with_id(mut self, id: impl Into<String>) -> ValidationResult<Self> {
        self.resource.set_id(id)?;
        Ok(self)
    }

    /// Append charts. Every chart must be named, since names identify charts
    /// across updates.
    pub fn with_charts(mut self, charts: impl IntoIterator<Item = Chart>) -> ValidationResult<Self> {
        for chart in charts {
            if chart.name().is_none() {
                return Err(ValidationError::invalid(format!(
                    "charts on dashboard '{}' must be named",
                    self.name().unwrap_or("unnamed")
                )));
            }
            self.charts.push(chart);
        }
        Ok(self)
    }

    /// Override where charts added by later updates are placed.
    pub fn with_child_placement(mut self, placement: ChildPlacement) -> Self {
        self.placement = placement;
        self
    }

    /// Dashboard filters. Empty filters clear the option.
    pub fn with_filters(mut self, filters: DashboardFilters) -> Self {
        if filters.is_empty() {
            self.resource.remove_option("filters");
        } else {
            self.resource.set_option("filters", filters.to_value());
        }
        self
    }

    /// Overlays offered in the event drop-down.
    pub fn with_event_overlays(mut self, overlays: impl IntoIterator<Item = EventOverlay>) -> Self {
        let overlays = overlays.into_iter().map(|o| o.to_value()).collect();
        self.resource.set_option("eventOverlays", Value::Array(overlays));
        self
    }

    /// Overlays shown when the dashboard opens.
    pub fn with_selected_event_overlays(
        mut self,
        overlays: impl IntoIterator<Item = SelectedEventOverlay>,
    ) -> Self {
        let overlays = overlays.into_iter().map(|o| o.to_value()).collect();
        self.resource
            .set_option("selectedEventOverlays", Value::Array(overlays));
        self
    }

    /// Options the simple endpoint drops: everything but the name.
    fn extra_options(&self) -> Map<String, Value> {
        self.resource
            .options()
            .iter()
            .filter(|(key, _)| key.as_str() != "name")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn chart_payloads(&self) -> Vec<Value> {
        self.charts.iter().map(Syncable::payload).collect()
    }

    fn local_named(&self, name: Option<&str>) -> Option<&Chart> {
        name.and_then(|name| self.charts.iter().find(|chart| chart.name() == Some(name)))
    }

    fn is_local(&self, name: Option<&str>) -> bool {
        self.local_named(name).is_some()
    }

    /// Diff local charts against the placements of the remote dashboard and
    /// return the reconciled placement list.
    pub fn reconcile_charts(&self, client: &Client, placements: &Value) -> Result<Vec<Value>> {
        let mut state = prune_placements(placements.as_array().cloned().unwrap_or_default());

        let mut remote = Vec::with_capacity(state.len());
        for entry in &state {
            let id = placement_chart_id(entry).unwrap_or_default().to_string();
            let chart = client.get(format!("{CHART_ENDPOINT}/{id}"))?;
            let name = chart.get("name").and_then(Value::as_str).map(str::to_string);
            remote.push(RemoteChart { id, name });
        }
        debug!(remote = remote.len(), local = self.charts.len(), "diffing dashboard charts");

        for chart in &remote {
            if let Some(local) = self.local_named(chart.name.as_deref()) {
                info!(id = %chart.id, name = ?chart.name, "updating dashboard chart");
                client.put(format!("{CHART_ENDPOINT}/{}", chart.id), local.payload())?;
            }
        }

        for local in &self.charts {
            let exists = remote
                .iter()
                .any(|chart| chart.name.as_deref() == local.name());
            if !exists {
                info!(name = ?local.name(), "adding chart to dashboard");
                let created = client.execute(local.create_request())?;
                match remote_id(&created) {
                    "" => warn!(name = ?local.name(), "created chart has no id; not placing it"),
                    id => state.push(self.placement.to_value(id)),
                }
            }
        }

        for chart in &remote {
            if !self.is_local(chart.name.as_deref()) {
                info!(id = %chart.id, name = ?chart.name, "removing chart from dashboard");
                client.delete_path(format!("{CHART_ENDPOINT}/{}", chart.id))?;
                state.retain(|entry| placement_chart_id(entry) != Some(chart.id.as_str()));
            }
        }

        Ok(prune_placements(state))
    }
}

fn placement_chart_id(entry: &Value) -> Option<&str> {
    entry
        .get("chartId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

/// Drop placements that do not reference a chart.
fn prune_placements(entries: Vec<Value>) -> Vec<Value> {
    entries
        .into_iter()
        .filter(|entry| {
            let valid = placement_chart_id(entry).is_some();
            if !valid {
                warn!(?entry, "pruning dashboard placement without a chart id");
            }
            valid
        })
        .collect()
}

impl Syncable for Dashboard {
    fn resource(&self) -> &Resource {
        &self.resource
    }

    fn payload(&self) -> Value {
        let mut payload = self.resource.options().clone();
        payload.insert("charts".into(), Value::Array(self.chart_payloads()));
        Value::Object(payload)
    }

    fn create_request(&self) -> ApiRequest {
        let request = ApiRequest::post(
            format!("{DASHBOARD_ENDPOINT}/simple"),
            Value::Array(self.chart_payloads()),
        );
        match self.name() {
            Some(name) => request.with_param("name", name),
            None => request,
        }
    }

    fn after_create(&self, client: &Client, created: Value) -> Result<Value> {
        let extra = self.extra_options();
        if extra.is_empty() {
            return Ok(created);
        }
        let id = remote_id(&created).to_string();
        if id.is_empty() {
            warn!(name = ?self.name(), "created dashboard has no id; options not applied");
            return Ok(created);
        }
        let mut body = into_object(created);
        body.extend(extra);
        debug!(id = %id, "applying dashboard options");
        client.put(self.resource.entity_path(&id), Value::Object(body))
    }

    fn update_payload(&self, client: &Client, remote: &Value) -> Result<Value> {
        let charts = self.reconcile_charts(client, remote.get("charts").unwrap_or(&Value::Null))?;
        let mut body = into_object(remote.clone());
        body.insert("charts".into(), Value::Array(charts));
        body.extend(self.extra_options());
        Ok(Value::Object(body))
    }

    fn before_delete(&self, client: &Client, id: &str) -> Result<()> {
        delete_dashboard_charts(client, id)
    }
}

/// Delete every chart placed on the remote dashboard `id`.
pub(crate) fn delete_dashboard_charts(client: &Client, id: &str) -> Result<()> {
    let remote = client.get(format!("{DASHBOARD_ENDPOINT}/{id}"))?;
    let chart_ids: Vec<String> = remote
        .get("charts")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(placement_chart_id)
        .map(str::to_string)
        .collect();
    for chart_id in chart_ids {
        info!(dashboard = id, chart = %chart_id, "deleting dashboard chart");
        client.delete_path(format!("{CHART_ENDPOINT}/{chart_id}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{Program, data};

    fn chart(name: &str, metric: &str) -> Chart {
        Chart::time_series()
            .with_name(name)
            .unwrap()
            .with_program(Program::new([data(metric).publish("A")]).unwrap())
            .unwrap()
    }

    #[test]
    fn payload_nests_chart_payloads() {
        let dashboard = Dashboard::new()
            .with_name("Ops")
            .unwrap()
            .with_charts([chart("CPU", "cpu"), chart("Memory", "mem")])
            .unwrap();
        let payload = dashboard.payload();

        assert_eq!(payload["name"], "Ops");
        assert_eq!(payload["charts"][0], chart("CPU", "cpu").payload());
        assert_eq!(payload["charts"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn create_uses_the_simple_endpoint() {
        let dashboard = Dashboard::new()
            .with_name("Ops")
            .unwrap()
            .with_charts([chart("CPU", "cpu")])
            .unwrap();
        let request = dashboard.create_request();

        assert_eq!(request.path, "/dashboard/simple");
        assert_eq!(request.param("name"), Some("Ops"));
        assert_eq!(request.body, Some(json!([chart("CPU", "cpu").payload()])));
    }

    #[test]
    fn unnamed_charts_are_rejected() {
        let err = Dashboard::new()
            .with_name("Ops")
            .unwrap()
            .with_charts([Chart::time_series()])
            .unwrap_err();
        assert!(err.to_string().contains("Ops"));
    }

    #[test]
    fn filters_and_overlays_are_options() {
        let deploys = EventSignal::new("deploy", EventType::EventTimeSeries).unwrap();
        let dashboard = Dashboard::new()
            .with_name("Ops")
            .unwrap()
            .with_filters(
                DashboardFilters::new().with_sources(vec![FilterSource::new("env", ["prod"]).unwrap()]),
            )
            .with_event_overlays([EventOverlay::new(deploys.clone())])
            .with_selected_event_overlays([SelectedEventOverlay::new(deploys)]);
        let payload = dashboard.payload();

        assert_eq!(
            payload["filters"],
            json!({"sources": [{"property": "env", "value": ["prod"], "NOT": false}]})
        );
        assert_eq!(payload["eventOverlays"][0]["eventSignal"]["eventSearchText"], "deploy");
        assert_eq!(payload["selectedEventOverlays"].as_array().unwrap().len(), 1);
        assert!(!dashboard.extra_options().contains_key("name"));
        assert_eq!(dashboard.extra_options().len(), 3);

        let cleared = dashboard.with_filters(DashboardFilters::new());
        assert!(cleared.resource().get("filters").is_none());
    }

    #[test]
    fn default_placement() {
        assert_eq!(
            ChildPlacement::default().to_value("c1"),
            json!({"chartId": "c1", "row": 99, "column": 11, "width": 6, "height": 3})
        );
    }
}
