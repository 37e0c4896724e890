//! Remote resources and the reconciliation engine
//!
//! A [`Resource`] is the identity and option bag shared by every SignalFx
//! object this crate manages. Concrete types ([`Chart`], [`Detector`],
//! [`Dashboard`]) wrap one and implement [`Syncable`]; the [`Client`] drives
//! the search / create / update / read / delete lifecycle against a
//! [`Transport`].
//!
//! [`Chart`]: crate::charts::Chart
//! [`Detector`]: crate::detectors::Detector
//! [`Dashboard`]: crate::dashboards::Dashboard
//! [`Transport`]: crate::transport::Transport

use serde_json::{Map, Value};

use crate::error::{Result, ValidationError, ValidationResult};
use crate::transport::ApiRequest;

pub mod client;
pub mod confirm;

pub use client::{ActionFlags, Client, Lookup, Overrides};
pub use confirm::{Confirm, FixedAnswer, StdinConfirm};

/// Identity (`endpoint`, `name`, optional `id`) plus the option bag sent to
/// the API.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    endpoint: String,
    id: Option<String>,
    options: Map<String, Value>,
}

impl Resource {
    /// Empty resource living under `endpoint`, e.g. `/chart`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            id: None,
            options: Map::new(),
        }
    }

    /// Collection endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Explicit remote id, if one was assigned.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Declared name.
    pub fn name(&self) -> Option<&str> {
        self.options.get("name").and_then(Value::as_str)
    }

    /// Declared name, or a validation error when unset.
    pub fn require_name(&self) -> ValidationResult<&str> {
        self.name().ok_or_else(|| {
            ValidationError::invalid(format!(
                "resource under {} has no name",
                self.endpoint
            ))
        })
    }

    /// Set the name. Empty names are rejected.
    pub fn set_name(&mut self, name: impl Into<String>) -> ValidationResult<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::invalid("resource name cannot be empty"));
        }
        self.options.insert("name".into(), Value::String(name));
        Ok(())
    }

    /// Set the description.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.options
            .insert("description".into(), Value::String(description.into()));
    }

    /// Pin the remote id used by read and delete.
    pub fn set_id(&mut self, id: impl Into<String>) -> ValidationResult<()> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::invalid("resource id cannot be empty"));
        }
        self.id = Some(id);
        Ok(())
    }

    /// Insert or replace a top-level option.
    pub fn set_option(&mut self, key: impl Into<String>, value: Value) {
        self.options.insert(key.into(), value);
    }

    /// Remove a top-level option.
    pub fn remove_option(&mut self, key: &str) -> Option<Value> {
        self.options.remove(key)
    }

    /// Top-level option `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// The whole option bag.
    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    /// Path of a single remote entity under this endpoint.
    pub fn entity_path(&self, id: &str) -> String {
        format!("{}/{}", self.endpoint, id)
    }
}

/// A resource the [`Client`] can reconcile.
///
/// The defaults describe a flat resource: create POSTs the option bag to the
/// endpoint and update PUTs the same bag. Composite resources override the
/// hooks to manage their children.
pub trait Syncable {
    /// Identity and options.
    fn resource(&self) -> &Resource;

    /// Locally serialized payload, children included. Also the result of a
    /// dry-run create.
    fn payload(&self) -> Value {
        Value::Object(self.resource().options().clone())
    }

    /// Request that creates this resource remotely.
    fn create_request(&self) -> ApiRequest {
        ApiRequest::post(self.resource().endpoint(), self.payload())
    }

    /// Runs after the create request succeeded; returns the final response.
    fn after_create(&self, _client: &Client, created: Value) -> Result<Value> {
        Ok(created)
    }

    /// Body to PUT over the exactly matching remote entity `remote`.
    fn update_payload(&self, _client: &Client, _remote: &Value) -> Result<Value> {
        Ok(self.payload())
    }

    /// Runs before the remote entity `id` is deleted.
    fn before_delete(&self, _client: &Client, _id: &str) -> Result<()> {
        Ok(())
    }
}

impl Syncable for Resource {
    fn resource(&self) -> &Resource {
        self
    }
}

impl<T: Syncable + ?Sized> Syncable for Box<T> {
    fn resource(&self) -> &Resource {
        (**self).resource()
    }

    fn payload(&self) -> Value {
        (**self).payload()
    }

    fn create_request(&self) -> ApiRequest {
        (**self).create_request()
    }

    fn after_create(&self, client: &Client, created: Value) -> Result<Value> {
        (**self).after_create(client, created)
    }

    fn update_payload(&self, client: &Client, remote: &Value) -> Result<Value> {
        (**self).update_payload(client, remote)
    }

    fn before_delete(&self, client: &Client, id: &str) -> Result<()> {
        (**self).before_delete(client, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn names_and_ids_must_be_non_empty() {
        let mut resource = Resource::new("/chart");
        assert!(resource.set_name("").is_err());
        assert!(resource.set_id("  ").is_err());
        assert!(resource.require_name().is_err());

        resource.set_name("cpu").unwrap();
        resource.set_id("abc").unwrap();
        assert_eq!(resource.name(), Some("cpu"));
        assert_eq!(resource.id(), Some("abc"));
        assert_eq!(resource.entity_path("abc"), "/chart/abc");
    }

    #[test]
    fn default_payload_is_the_option_bag() {
        let mut resource = Resource::new("/detector");
        resource.set_name("latency").unwrap();
        resource.set_description("p99 latency");

        assert_eq!(
            resource.payload(),
            json!({"name": "latency", "description": "p99 latency"})
        );
        let request = resource.create_request();
        assert_eq!(request.path, "/detector");
        assert_eq!(request.body, Some(resource.payload()));
    }
}
