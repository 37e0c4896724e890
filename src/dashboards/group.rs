//! Dashboard groups
//!
//! A [`DashboardGroup`] owns its dashboards. The API only moves a dashboard
//! between groups by cloning it, so reconciling a group:
//!
//! 1. updates (or creates) each local dashboard on its own, by name;
//! 2. clones every dashboard living in another group into this one;
//! 3. retires the originals, deleting their group once nothing else is in it;
//! 4. deletes dashboards of this group that are not declared locally,
//!    including the default dashboard the API puts in every new group.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use super::{DASHBOARD_ENDPOINT, Dashboard, delete_dashboard_charts};
use crate::error::{Result, ValidationError, ValidationResult};
use crate::resources::client::{into_object, remote_id};
use crate::resources::{ActionFlags, Client, Overrides, Resource, Syncable};
use crate::transport::ApiRequest;

/// Collection endpoint for dashboard groups.
pub const DASHBOARD_GROUP_ENDPOINT: &str = "/dashboardgroup";

/// A dashboard group in SignalFx.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardGroup {
    resource: Resource,
    dashboards: Vec<Dashboard>,
}

impl Default for DashboardGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardGroup {
    /// Empty group.
    pub fn new() -> Self {
        Self {
            resource: Resource::new(DASHBOARD_GROUP_ENDPOINT),
            dashboards: Vec::new(),
        }
    }

    /// Group name.
    pub fn name(&self) -> Option<&str> {
        self.resource.name()
    }

    /// Local dashboards in declaration order.
    pub fn dashboards(&self) -> &[Dashboard] {
        &self.dashboards
    }

    /// Set the group name.
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

    /// Append dashboards. Each must be named, since dashboards are matched by
    /// name.
    pub fn with_dashboards(
        mut self,
        dashboards: impl IntoIterator<Item = Dashboard>,
    ) -> ValidationResult<Self> {
        for dashboard in dashboards {
            if dashboard.name().is_none() {
                return Err(ValidationError::invalid(format!(
                    "dashboards in group '{}' must be named",
                    self.name().unwrap_or("unnamed")
                )));
            }
            self.dashboards.push(dashboard);
        }
        Ok(self)
    }

    /// Teams allowed to edit the group, replacing earlier ones.
    pub fn with_teams<I, S>(mut self, team_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let teams = team_ids
            .into_iter()
            .map(|id| Value::String(id.into()))
            .collect();
        self.resource.set_option("teams", Value::Array(teams));
        self
    }

    fn extra_options(&self) -> Map<String, Value> {
        self.resource
            .options()
            .iter()
            .filter(|(key, _)| key.as_str() != "name")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Bring every local dashboard into group `group_id` and return their
    /// ids in declaration order.
    fn adopt_dashboards(&self, client: &Client, group_id: &str) -> Result<Vec<String>> {
        let mut kept = Vec::with_capacity(self.dashboards.len());
        let mut moved: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for dashboard in &self.dashboards {
            let remote = client.update(dashboard, &Overrides::default(), ActionFlags::default())?;
            let id = remote_id(&remote).to_string();
            let home = remote.get("groupId").and_then(Value::as_str).unwrap_or_default();
            if home == group_id {
                kept.push(id);
                continue;
            }
            info!(dashboard = %id, from = home, to = group_id, "cloning dashboard into group");
            let clone = client.post(
                format!("{DASHBOARD_GROUP_ENDPOINT}/{group_id}/dashboard"),
                json!({"sourceDashboard": id}),
            )?;
            kept.push(remote_id(&clone).to_string());
            moved.entry(home.to_string()).or_default().push(id);
        }

        for (home, sources) in moved {
            retire_originals(client, &home, &sources)?;
        }
        Ok(kept)
    }

    /// Delete dashboards of the remote group that are not in `kept`.
    fn prune_dashboards(&self, client: &Client, remote: &Value, kept: &[String]) -> Result<()> {
        for id in member_ids(remote) {
            if kept.contains(&id) {
                continue;
            }
            info!(dashboard = %id, "removing dashboard from group");
            client.delete(&Dashboard::new().with_id(id)?, ActionFlags::default())?;
        }
        Ok(())
    }
}

/// Ids listed in a remote group's `dashboards` array.
fn member_ids(group: &Value) -> Vec<String> {
    group
        .get("dashboards")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Remove dashboards that were cloned out of group `home`. The group itself
/// goes once it holds nothing else.
fn retire_originals(client: &Client, home: &str, sources: &[String]) -> Result<()> {
    for id in sources {
        delete_dashboard_charts(client, id)?;
    }
    if home.is_empty() {
        for id in sources {
            client.delete_path(format!("{DASHBOARD_ENDPOINT}/{id}"))?;
        }
        return Ok(());
    }

    let group = client.get(format!("{DASHBOARD_GROUP_ENDPOINT}/{home}"))?;
    let others = member_ids(&group)
        .into_iter()
        .filter(|id| !sources.contains(id))
        .count();
    if others == 0 {
        info!(group = home, "deleting emptied dashboard group");
        client.delete_path(format!("{DASHBOARD_GROUP_ENDPOINT}/{home}"))?;
    } else {
        debug!(group = home, others, "group keeps other dashboards");
        for id in sources {
            client.delete_path(format!("{DASHBOARD_ENDPOINT}/{id}"))?;
        }
    }
    Ok(())
}

impl Syncable for DashboardGroup {
    fn resource(&self) -> &Resource {
        &self.resource
    }

    fn payload(&self) -> Value {
        let mut payload = self.resource.options().clone();
        let dashboards = self.dashboards.iter().map(Syncable::payload).collect();
        payload.insert("dashboards".into(), Value::Array(dashboards));
        Value::Object(payload)
    }

    fn create_request(&self) -> ApiRequest {
        let request = ApiRequest::post(
            DASHBOARD_GROUP_ENDPOINT,
            Value::Object(self.resource.options().clone()),
        );
        match self.name() {
            Some(name) => request.with_param("name", name),
            None => request,
        }
    }

    fn after_create(&self, client: &Client, created: Value) -> Result<Value> {
        if self.dashboards.is_empty() {
            return Ok(created);
        }
        let id = remote_id(&created).to_string();
        if id.is_empty() {
            warn!(name = ?self.name(), "created group has no id; dashboards not added");
            return Ok(created);
        }
        let kept = self.adopt_dashboards(client, &id)?;
        let path = self.resource.entity_path(&id);
        let current = client.get(&path)?;
        self.prune_dashboards(client, &current, &kept)?;
        client.get(path)
    }

    fn update_payload(&self, client: &Client, remote: &Value) -> Result<Value> {
        let mut body = into_object(remote.clone());
        if !self.dashboards.is_empty() {
            let kept = self.adopt_dashboards(client, remote_id(remote))?;
            self.prune_dashboards(client, remote, &kept)?;
            let ids = kept.into_iter().map(Value::String).collect();
            body.insert("dashboards".into(), Value::Array(ids));
        }
        body.extend(self.extra_options());
        Ok(Value::Object(body))
    }

    fn before_delete(&self, client: &Client, id: &str) -> Result<()> {
        let remote = client.get(self.resource.entity_path(id))?;
        for dashboard in member_ids(&remote) {
            delete_dashboard_charts(client, &dashboard)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dashboard(name: &str) -> Dashboard {
        Dashboard::new().with_name(name).unwrap()
    }

    #[test]
    fn payload_nests_dashboard_payloads() {
        let group = DashboardGroup::new()
            .with_name("Team")
            .unwrap()
            .with_dashboards([dashboard("Ops"), dashboard("Billing")])
            .unwrap();
        let payload = group.payload();

        assert_eq!(payload["name"], "Team");
        assert_eq!(payload["dashboards"][1], dashboard("Billing").payload());
    }

    #[test]
    fn create_posts_only_the_group_options() {
        let group = DashboardGroup::new()
            .with_name("Team")
            .unwrap()
            .with_teams(["t1"])
            .with_dashboards([dashboard("Ops")])
            .unwrap();
        let request = group.create_request();

        assert_eq!(request.path, "/dashboardgroup");
        assert_eq!(request.param("name"), Some("Team"));
        assert_eq!(request.body, Some(json!({"name": "Team", "teams": ["t1"]})));
    }

    #[test]
    fn unnamed_dashboards_are_rejected() {
        let err = DashboardGroup::new()
            .with_name("Team")
            .unwrap()
            .with_dashboards([Dashboard::new()])
            .unwrap_err();
        assert!(err.to_string().contains("Team"));
    }

    #[test]
    fn member_ids_skip_blanks() {
        let group = json!({"dashboards": ["a", "", 3, "b"]});
        assert_eq!(member_ids(&group), vec!["a".to_string(), "b".to_string()]);
        assert!(member_ids(&json!({})).is_empty());
    }
}
