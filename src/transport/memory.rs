//! In-memory stand-in for the SignalFx REST API.
//!
//! Collections are keyed by their first path segment (`chart`, `dashboard`,
//! `dashboardgroup`, `detector`). Search mimics the real API: `GET
//! /chart?name=cpu` matches by substring, so exact-match filtering remains the
//! engine's job.
//!
//! Dashboards always belong to a group. `POST /dashboard/simple` creates a
//! group of its own for the new dashboard, a new group starts with a default
//! dashboard, and deleting a group deletes its dashboards but not their charts.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use tracing::debug;
use uuid::Uuid;

use super::http::status_error;
use super::{ApiRequest, Method, Transport};
use crate::error::{TransportError, TransportResult};

/// Default placement the service assigns to charts of a simple dashboard.
const SIMPLE_DASHBOARD_WIDTH: u64 = 6;
const SIMPLE_DASHBOARD_HEIGHT: u64 = 1;

#[derive(Debug, Default)]
struct State {
    collections: HashMap<String, Vec<Value>>,
    requests: Vec<ApiRequest>,
    token: Option<String>,
}

impl State {
    fn collection(&mut self, name: &str) -> &mut Vec<Value> {
        self.collections.entry(name.to_string()).or_default()
    }

    fn insert(&mut self, name: &str, mut entity: Value) -> Value {
        let id = Uuid::new_v4().simple().to_string();
        if let Some(obj) = entity.as_object_mut() {
            obj.insert("id".into(), Value::String(id));
        }
        self.collection(name).push(entity.clone());
        entity
    }

    fn position(&mut self, name: &str, id: &str) -> Option<usize> {
        self.collection(name)
            .iter()
            .position(|entity| entity.get("id").and_then(Value::as_str) == Some(id))
    }

    fn get(&mut self, name: &str, id: &str) -> Option<Value> {
        let idx = self.position(name, id)?;
        Some(self.collection(name)[idx].clone())
    }

    fn remove(&mut self, name: &str, id: &str) -> Option<Value> {
        let idx = self.position(name, id)?;
        Some(self.collection(name).remove(idx))
    }

    /// New group holding nothing yet.
    fn insert_group(&mut self, mut group: Map<String, Value>) -> String {
        group.insert("dashboards".into(), json!([]));
        let stored = self.insert(GROUPS, Value::Object(group));
        id_of(&stored).to_string()
    }

    /// Store `dashboard` as a member of `group_id`.
    fn insert_dashboard(&mut self, group_id: &str, mut dashboard: Value) -> Value {
        if let Some(obj) = dashboard.as_object_mut() {
            obj.insert("groupId".into(), Value::String(group_id.to_string()));
        }
        let stored = self.insert(DASHBOARDS, dashboard);
        let id = id_of(&stored).to_string();
        if let Some(idx) = self.position(GROUPS, group_id) {
            if let Some(members) = self.collection(GROUPS)[idx]
                .get_mut("dashboards")
                .and_then(Value::as_array_mut)
            {
                members.push(Value::String(id));
            }
        }
        stored
    }

    /// Remove dashboard `id` from whichever group lists it.
    fn unlist_dashboard(&mut self, id: &str) {
        for group in self.collection(GROUPS).iter_mut() {
            if let Some(members) = group.get_mut("dashboards").and_then(Value::as_array_mut) {
                members.retain(|member| member.as_str() != Some(id));
            }
        }
    }
}

const DASHBOARDS: &str = "dashboard";
const GROUPS: &str = "dashboardgroup";

/// Name the service gives the dashboard every new group starts with.
pub const DEFAULT_DASHBOARD_NAME: &str = "Default Dashboard";

fn id_of(entity: &Value) -> &str {
    entity.get("id").and_then(Value::as_str).unwrap_or_default()
}

/// Thread-safe, clonable fake API. Clones share state, so a test can keep a
/// handle while the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<State>>,
}

impl MemoryTransport {
    /// Empty API accepting any token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept `token`; anything else answers 401.
    pub fn with_required_token(self, token: impl Into<String>) -> Self {
        self.state.lock().token = Some(token.into());
        self
    }

    /// Seed an entity into `collection`, returning its assigned id.
    pub fn seed(&self, collection: &str, entity: Value) -> String {
        let stored = self.state.lock().insert(collection, entity);
        stored
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    /// Snapshot of every entity in `collection`, in insertion order.
    pub fn entities(&self, collection: &str) -> Vec<Value> {
        self.state
            .lock()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Entity `id` in `collection`.
    pub fn entity(&self, collection: &str, id: &str) -> Option<Value> {
        self.entities(collection)
            .into_iter()
            .find(|entity| entity.get("id").and_then(Value::as_str) == Some(id))
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.state.lock().requests.clone()
    }

    /// Number of requests with `method` whose path starts with `prefix`.
    pub fn count(&self, method: Method, prefix: &str) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.path.starts_with(prefix))
            .count()
    }

    /// Forget the request log, keeping entities.
    pub fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }

    fn not_found(request: &ApiRequest) -> TransportError {
        status_error(
            request.method,
            request.path.clone(),
            404,
            json!({"message": "not found"}).to_string(),
        )
    }

    fn handle(state: &mut State, request: &ApiRequest) -> TransportResult<Value> {
        let path = request.path.trim_start_matches('/');
        let segments: Vec<&str> = path.split('/').collect();

        match (request.method, segments.as_slice()) {
            (Method::Post, ["dashboard", "simple"]) => Self::create_simple_dashboard(state, request),
            (Method::Post, ["dashboardgroup"]) => Self::create_group(state, request),
            (Method::Post, ["dashboardgroup", group_id, "dashboard"]) if !group_id.is_empty() => {
                Self::clone_dashboard(state, request, group_id)
            }
            (Method::Delete, ["dashboardgroup", group_id]) if !group_id.is_empty() => {
                state
                    .remove(GROUPS, group_id)
                    .ok_or_else(|| Self::not_found(request))?;
                state.collection(DASHBOARDS).retain(|dashboard| {
                    dashboard.get("groupId").and_then(Value::as_str) != Some(*group_id)
                });
                Ok(Value::Null)
            }
            (Method::Get, [collection]) => {
                let name = request.param("name").unwrap_or_default();
                let results: Vec<Value> = state
                    .collection(collection)
                    .iter()
                    .filter(|entity| {
                        entity
                            .get("name")
                            .and_then(Value::as_str)
                            .is_some_and(|n| n.contains(name))
                    })
                    .cloned()
                    .collect();
                Ok(json!({"count": results.len(), "results": results}))
            }
            (Method::Post, [collection]) => {
                let body = request.body.clone().unwrap_or_else(|| json!({}));
                Ok(state.insert(collection, body))
            }
            (Method::Get, [collection, id]) if !id.is_empty() => state
                .get(collection, id)
                .ok_or_else(|| Self::not_found(request)),
            (Method::Put, [collection, id]) if !id.is_empty() => {
                let idx = state
                    .position(collection, id)
                    .ok_or_else(|| Self::not_found(request))?;
                let mut body = request.body.clone().unwrap_or_else(|| json!({}));
                if let Some(obj) = body.as_object_mut() {
                    obj.insert("id".into(), Value::String(id.to_string()));
                }
                state.collection(collection)[idx] = body.clone();
                Ok(body)
            }
            (Method::Delete, [collection, id]) if !id.is_empty() => {
                state
                    .remove(collection, id)
                    .ok_or_else(|| Self::not_found(request))?;
                if *collection == DASHBOARDS {
                    state.unlist_dashboard(id);
                }
                Ok(Value::Null)
            }
            _ => Err(status_error(
                request.method,
                request.path.clone(),
                405,
                String::new(),
            )),
        }
    }

    fn create_simple_dashboard(state: &mut State, request: &ApiRequest) -> TransportResult<Value> {
        let charts = match &request.body {
            Some(Value::Array(charts)) => charts.clone(),
            _ => Vec::new(),
        };
        let placements: Vec<Value> = charts
            .into_iter()
            .enumerate()
            .map(|(row, chart)| {
                let stored = state.insert("chart", chart);
                json!({
                    "chartId": stored.get("id").cloned().unwrap_or(Value::Null),
                    "row": row as u64,
                    "column": 0,
                    "width": SIMPLE_DASHBOARD_WIDTH,
                    "height": SIMPLE_DASHBOARD_HEIGHT,
                })
            })
            .collect();

        let name = request.param("name").unwrap_or_default().to_string();
        let mut group = Map::new();
        group.insert("name".into(), Value::String(name.clone()));
        let group_id = state.insert_group(group);

        Ok(state.insert_dashboard(&group_id, json!({"name": name, "charts": placements})))
    }

    fn create_group(state: &mut State, request: &ApiRequest) -> TransportResult<Value> {
        let mut group = match &request.body {
            Some(Value::Object(body)) => body.clone(),
            _ => Map::new(),
        };
        if let Some(name) = request.param("name") {
            group.insert("name".into(), Value::String(name.to_string()));
        }
        let group_id = state.insert_group(group);
        state.insert_dashboard(&group_id, json!({"name": DEFAULT_DASHBOARD_NAME, "charts": []}));
        state
            .get(GROUPS, &group_id)
            .ok_or_else(|| Self::not_found(request))
    }

    /// Copy a dashboard and its charts into `group_id`.
    fn clone_dashboard(
        state: &mut State,
        request: &ApiRequest,
        group_id: &str,
    ) -> TransportResult<Value> {
        let source_id = request
            .body
            .as_ref()
            .and_then(|body| body.get("sourceDashboard"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        if state.position(GROUPS, group_id).is_none() {
            return Err(Self::not_found(request));
        }
        let mut copy = state
            .get(DASHBOARDS, source_id)
            .ok_or_else(|| Self::not_found(request))?;

        let placements = copy
            .get("charts")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut copied = Vec::with_capacity(placements.len());
        for mut placement in placements {
            let chart_id = placement
                .get("chartId")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if let (Some(chart), Some(entry)) =
                (state.get("chart", &chart_id), placement.as_object_mut())
            {
                let stored = state.insert("chart", chart);
                entry.insert("chartId".into(), Value::String(id_of(&stored).to_string()));
            }
            copied.push(placement);
        }
        if let Some(obj) = copy.as_object_mut() {
            obj.insert("charts".into(), Value::Array(copied));
            obj.remove("id");
        }
        Ok(state.insert_dashboard(group_id, copy))
    }
}

impl Transport for MemoryTransport {
    fn execute(&self, request: &ApiRequest) -> TransportResult<Value> {
        let mut state = self.state.lock();
        state.requests.push(request.clone());
        debug!(method = %request.method, path = %request.path, "memory transport request");

        if let Some(expected) = &state.token {
            if *expected != request.token {
                return Err(TransportError::Unauthorized);
            }
        }
        Self::handle(&mut state, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_matches_substrings() {
        let api = MemoryTransport::new();
        api.seed("chart", json!({"name": "cpu"}));
        api.seed("chart", json!({"name": "cpu (copy)"}));
        api.seed("chart", json!({"name": "memory"}));

        let found = api
            .execute(&ApiRequest::get("/chart").with_param("name", "cpu"))
            .unwrap();
        assert_eq!(found["count"], 2);
        assert_eq!(found["results"][0]["name"], "cpu");
    }

    #[test]
    fn crud_round_trip() {
        let api = MemoryTransport::new();
        let created = api
            .execute(&ApiRequest::post("/detector", json!({"name": "d"})))
            .unwrap();
        let id = created["id"].as_str().unwrap().to_string();

        let path = format!("/detector/{id}");
        api.execute(&ApiRequest::put(path.clone(), json!({"name": "d2"})))
            .unwrap();
        assert_eq!(api.entity("detector", &id).unwrap()["name"], "d2");

        assert_eq!(api.execute(&ApiRequest::delete(path.clone())).unwrap(), Value::Null);
        assert!(matches!(
            api.execute(&ApiRequest::get(path)),
            Err(TransportError::Status { status: 404, .. })
        ));
        assert_eq!(api.count(Method::Put, "/detector"), 1);
    }

    #[test]
    fn empty_id_is_method_not_allowed() {
        let api = MemoryTransport::new();
        assert!(matches!(
            api.execute(&ApiRequest::put("/chart/", json!({}))),
            Err(TransportError::MethodNotAllowed { .. })
        ));
    }

    #[test]
    fn simple_dashboard_creates_charts() {
        let api = MemoryTransport::new();
        let dashboard = api
            .execute(
                &ApiRequest::post("/dashboard/simple", json!([{"name": "a"}, {"name": "b"}]))
                    .with_param("name", "ops"),
            )
            .unwrap();

        assert_eq!(dashboard["name"], "ops");
        assert_eq!(dashboard["charts"].as_array().unwrap().len(), 2);
        assert_eq!(api.entities("chart").len(), 2);
        let chart_id = dashboard["charts"][1]["chartId"].as_str().unwrap();
        assert_eq!(api.entity("chart", chart_id).unwrap()["name"], "b");
    }

    #[test]
    fn dashboards_always_have_a_group() {
        let api = MemoryTransport::new();
        let simple = api
            .execute(&ApiRequest::post("/dashboard/simple", json!([])).with_param("name", "ops"))
            .unwrap();
        let home = simple["groupId"].as_str().unwrap();
        assert_eq!(api.entity("dashboardgroup", home).unwrap()["dashboards"], json!([simple["id"]]));

        let group = api
            .execute(&ApiRequest::post("/dashboardgroup", json!({"name": "team"})))
            .unwrap();
        let members = group["dashboards"].as_array().unwrap();
        assert_eq!(members.len(), 1);
        let default = api.entity("dashboard", members[0].as_str().unwrap()).unwrap();
        assert_eq!(default["name"], DEFAULT_DASHBOARD_NAME);
        assert_eq!(default["groupId"], group["id"]);
    }

    #[test]
    fn clone_copies_charts_into_the_group() {
        let api = MemoryTransport::new();
        let source = api
            .execute(&ApiRequest::post("/dashboard/simple", json!([{"name": "a"}])))
            .unwrap();
        let group = api
            .execute(&ApiRequest::post("/dashboardgroup", json!({"name": "team"})))
            .unwrap();
        let group_id = group["id"].as_str().unwrap();

        let clone = api
            .execute(&ApiRequest::post(
                format!("/dashboardgroup/{group_id}/dashboard"),
                json!({"sourceDashboard": source["id"]}),
            ))
            .unwrap();
        assert_eq!(clone["groupId"], group["id"]);
        assert_ne!(clone["id"], source["id"]);
        assert_ne!(clone["charts"][0]["chartId"], source["charts"][0]["chartId"]);
        assert_eq!(api.entities("chart").len(), 2);
        assert_eq!(
            api.entity("dashboardgroup", group_id).unwrap()["dashboards"][1],
            clone["id"]
        );

        let missing = ApiRequest::post(
            format!("/dashboardgroup/{group_id}/dashboard"),
            json!({"sourceDashboard": "nope"}),
        );
        assert!(matches!(
            api.execute(&missing),
            Err(TransportError::Status { status: 404, .. })
        ));
    }

    #[test]
    fn deleting_a_group_deletes_its_dashboards() {
        let api = MemoryTransport::new();
        let group = api
            .execute(&ApiRequest::post("/dashboardgroup", json!({"name": "team"})))
            .unwrap();
        let kept = api
            .execute(&ApiRequest::post("/dashboard/simple", json!([])))
            .unwrap();

        api.execute(&ApiRequest::delete(format!(
            "/dashboardgroup/{}",
            group["id"].as_str().unwrap()
        )))
        .unwrap();
        let remaining = api.entities("dashboard");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0]["id"], kept["id"]);
    }

    #[test]
    fn deleting_a_dashboard_unlists_it() {
        let api = MemoryTransport::new();
        let dashboard = api
            .execute(&ApiRequest::post("/dashboard/simple", json!([])))
            .unwrap();
        let id = dashboard["id"].as_str().unwrap();
        api.execute(&ApiRequest::delete(format!("/dashboard/{id}")))
            .unwrap();

        let home = dashboard["groupId"].as_str().unwrap();
        assert_eq!(api.entity("dashboardgroup", home).unwrap()["dashboards"], json!([]));
    }

    #[test]
    fn wrong_token_is_unauthorized() {
        let api = MemoryTransport::new().with_required_token("good");
        assert!(matches!(
            api.execute(&ApiRequest::get("/chart").with_token("bad")),
            Err(TransportError::Unauthorized)
        ));
        assert!(api.execute(&ApiRequest::get("/chart").with_token("good")).is_ok());
        assert_eq!(api.requests().len(), 2);
    }
}
