//! Reconciliation engine
//!
//! Every operation re-queries the API; nothing is cached between calls.
//! Conflicts are classified by exact name equality over the API's
//! substring search results.

use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use super::Syncable;
use super::confirm::{Confirm, StdinConfirm};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::transport::{ApiRequest, HttpTransport, Transport};

/// Policy flags accepted by every lifecycle operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionFlags {
    /// Make no remote calls; report what would be sent.
    pub dry_run: bool,
    /// Create even if a resource with the same name exists.
    pub force: bool,
    /// Ask before creating over a conflict.
    pub interactive: bool,
}

impl ActionFlags {
    /// Flags with only `dry_run` set.
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }

    /// Flags with only `force` set.
    pub fn force() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }

    /// Flags with only `interactive` set.
    pub fn interactive() -> Self {
        Self {
            interactive: true,
            ..Self::default()
        }
    }
}

/// Name and description replacements applied by `update`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// New name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
}

impl Overrides {
    /// Merge into `payload`, replacing existing fields. Blank values are ignored.
    pub fn apply(&self, payload: &mut Value) {
        let Value::Object(map) = payload else {
            return;
        };
        for (key, value) in [("name", &self.name), ("description", &self.description)] {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                map.insert(key.into(), Value::String(value.to_string()));
            }
        }
    }
}

/// Outcome of searching for a resource by name.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// No remote entity has exactly this name.
    Missing,
    /// Exactly one remote entity has this name.
    Exact(Value),
    /// This many remote entities share the name.
    Ambiguous(usize),
}

impl Lookup {
    /// Classify a search response (`{count, results: [...]}`) against `name`.
    /// A missing `results` field counts as no results.
    pub fn classify(name: &str, response: &Value) -> Self {
        let mut matches: Vec<&Value> = response
            .get("results")
            .and_then(Value::as_array)
            .map(|results| {
                results
                    .iter()
                    .filter(|entity| entity.get("name").and_then(Value::as_str) == Some(name))
                    .collect()
            })
            .unwrap_or_default();
        match matches.len() {
            0 => Lookup::Missing,
            1 => Lookup::Exact(matches.remove(0).clone()),
            n => Lookup::Ambiguous(n),
        }
    }

    /// The reconciliation error this outcome represents.
    pub fn conflict(&self, name: &str) -> Error {
        let name = name.to_string();
        match self {
            Lookup::Missing => Error::NotFound { name },
            Lookup::Exact(_) => Error::AlreadyExists { name },
            Lookup::Ambiguous(_) => Error::MultipleMatches { name },
        }
    }

    /// The single match, or the matching error.
    pub fn into_exact(self, name: &str) -> Result<Value> {
        match self {
            Lookup::Exact(entity) => Ok(entity),
            other => Err(other.conflict(name)),
        }
    }
}

/// Runs lifecycle operations for [`Syncable`] resources against a transport.
pub struct Client {
    transport: Box<dyn Transport>,
    token: String,
    confirm: Box<dyn Confirm>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client. The token must not be empty.
    pub fn new(transport: impl Transport + 'static, token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::Config(
                "cannot proceed with an empty API token".to_string(),
            ));
        }
        Ok(Self {
            transport: Box::new(transport),
            token,
            confirm: Box::new(StdinConfirm),
        })
    }

    /// HTTP client built from configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let token = config.require_token()?.to_string();
        let transport = HttpTransport::from_config(config)?;
        Self::new(transport, token)
    }

    /// Replace the interactive prompt.
    pub fn with_confirm(mut self, confirm: impl Confirm + 'static) -> Self {
        self.confirm = Box::new(confirm);
        self
    }

    /// Send `request` with this client's token.
    pub fn execute(&self, request: ApiRequest) -> Result<Value> {
        let request = request.with_token(self.token.clone());
        debug!(method = %request.method, path = %request.path, "api request");
        Ok(self.transport.execute(&request)?)
    }

    /// `GET path`
    pub fn get(&self, path: impl Into<String>) -> Result<Value> {
        self.execute(ApiRequest::get(path))
    }

    /// `POST path`
    pub fn post(&self, path: impl Into<String>, body: Value) -> Result<Value> {
        self.execute(ApiRequest::post(path, body))
    }

    /// `PUT path`
    pub fn put(&self, path: impl Into<String>, body: Value) -> Result<Value> {
        self.execute(ApiRequest::put(path, body))
    }

    /// `DELETE path`
    pub fn delete_path(&self, path: impl Into<String>) -> Result<Value> {
        self.execute(ApiRequest::delete(path))
    }

    /// Search `endpoint` for entities whose name contains `name`.
    pub fn search(&self, endpoint: &str, name: &str) -> Result<Value> {
        self.execute(ApiRequest::get(endpoint).with_param("name", name))
    }

    /// Search for `item` and classify the result.
    pub fn lookup(&self, item: &dyn Syncable) -> Result<Lookup> {
        let resource = item.resource();
        let name = resource.require_name()?;
        let response = self.search(resource.endpoint(), name)?;
        let lookup = Lookup::classify(name, &response);
        debug!(name, endpoint = resource.endpoint(), ?lookup, "classified search");
        Ok(lookup)
    }

    /// Create `item` remotely.
    ///
    /// An existing resource with the same name aborts the create unless
    /// `force` is set, or `interactive` is set and the operator agrees.
    #[instrument(skip_all, fields(endpoint = item.resource().endpoint(), name = item.resource().name()))]
    pub fn create(&self, item: &dyn Syncable, flags: ActionFlags) -> Result<Value> {
        if flags.dry_run {
            info!("dry run: skipping create");
            return Ok(item.payload());
        }
        let name = item.resource().require_name()?;
        let lookup = self.lookup(item)?;
        if lookup != Lookup::Missing {
            if flags.force {
                warn!(name, "resource already exists; creating anyway");
            } else if flags.interactive {
                let prompt = format!(
                    "A resource named \"{name}\" already exists under {}. Create another?",
                    item.resource().endpoint()
                );
                if !self.confirm.confirm(&prompt) {
                    return Err(Error::AlreadyExists {
                        name: name.to_string(),
                    });
                }
                warn!(name, "creating duplicate after confirmation");
            } else {
                return Err(lookup.conflict(name));
            }
        }
        self.create_remote(item)
    }

    fn create_remote(&self, item: &dyn Syncable) -> Result<Value> {
        let request = item.create_request();
        info!(path = %request.path, "creating resource");
        let created = self.execute(request)?;
        item.after_create(self, created)
    }

    /// Update the remote resource named like `item`, creating it if absent.
    #[instrument(skip_all, fields(endpoint = item.resource().endpoint(), name = item.resource().name()))]
    pub fn update(
        &self,
        item: &dyn Syncable,
        overrides: &Overrides,
        flags: ActionFlags,
    ) -> Result<Value> {
        if flags.dry_run {
            info!("dry run: skipping update");
            let mut payload = item.payload();
            overrides.apply(&mut payload);
            return Ok(payload);
        }
        let name = item.resource().require_name()?;
        match self.lookup(item)? {
            Lookup::Missing => {
                info!(name, "no existing resource; creating");
                self.create_remote(item)
            }
            ambiguous @ Lookup::Ambiguous(_) => Err(ambiguous.conflict(name)),
            Lookup::Exact(remote) => {
                let id = remote_id(&remote);
                let mut payload = item.update_payload(self, &remote)?;
                overrides.apply(&mut payload);
                info!(name, id, "updating resource");
                self.put(item.resource().entity_path(id), payload)
            }
        }
    }

    /// Fetch the remote state of `item`, by explicit id or exact name.
    pub fn read(&self, item: &dyn Syncable, flags: ActionFlags) -> Result<Value> {
        if flags.dry_run {
            info!(endpoint = item.resource().endpoint(), "dry run: skipping read");
            return Ok(Value::Null);
        }
        let id = self.resolve_id(item)?;
        self.get(item.resource().entity_path(&id))
    }

    /// Delete the remote resource, by explicit id or exact name.
    #[instrument(skip_all, fields(endpoint = item.resource().endpoint(), name = item.resource().name()))]
    pub fn delete(&self, item: &dyn Syncable, flags: ActionFlags) -> Result<Value> {
        if flags.dry_run {
            info!("dry run: skipping delete");
            return Ok(Value::Null);
        }
        let id = self.resolve_id(item)?;
        item.before_delete(self, &id)?;
        info!(id, "deleting resource");
        self.delete_path(item.resource().entity_path(&id))
    }

    fn resolve_id(&self, item: &dyn Syncable) -> Result<String> {
        if let Some(id) = item.resource().id() {
            return Ok(id.to_string());
        }
        let name = item.resource().require_name()?;
        let remote = self.lookup(item)?.into_exact(name)?;
        Ok(remote_id(&remote).to_string())
    }
}

/// `id` of a remote entity. An entity without one yields an empty id, which
/// the API answers with 405.
pub(crate) fn remote_id(entity: &Value) -> &str {
    entity.get("id").and_then(Value::as_str).unwrap_or_default()
}

/// Object view of a payload, empty for non-objects.
pub(crate) fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classification_uses_exact_names() {
        let one = json!({"count": 1, "results": [{"name": "foo", "id": "1"}]});
        let none = json!({"count": 0});
        let two = json!({"count": 2, "results": [{"name": "foo"}, {"name": "foo"}]});
        let fuzzy = json!({"count": 2, "results": [{"name": "foo bar"}, {"name": "foo"}]});

        assert!(matches!(
            Lookup::classify("foo", &one).conflict("foo"),
            Error::AlreadyExists { .. }
        ));
        assert!(matches!(
            Lookup::classify("foo", &none).conflict("foo"),
            Error::NotFound { .. }
        ));
        assert!(matches!(
            Lookup::classify("foo", &two).conflict("foo"),
            Error::MultipleMatches { .. }
        ));
        assert_eq!(
            Lookup::classify("foo", &fuzzy),
            Lookup::Exact(json!({"name": "foo"}))
        );
    }

    #[test]
    fn into_exact_maps_other_outcomes_to_errors() {
        assert!(matches!(
            Lookup::Missing.into_exact("x"),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            Lookup::Ambiguous(3).into_exact("x"),
            Err(Error::MultipleMatches { .. })
        ));
        assert_eq!(
            Lookup::Exact(json!({"id": "1"})).into_exact("x").unwrap(),
            json!({"id": "1"})
        );
    }

    #[test]
    fn overrides_replace_name_and_description() {
        let mut payload = json!({"name": "old", "programText": "x"});
        Overrides {
            name: Some("new".into()),
            description: Some(String::new()),
        }
        .apply(&mut payload);
        assert_eq!(payload, json!({"name": "new", "programText": "x"}));
    }

    #[test]
    fn empty_token_is_rejected() {
        let transport = crate::transport::MemoryTransport::new();
        assert!(matches!(Client::new(transport, " "), Err(Error::Config(_))));
    }

    #[test]
    fn remote_id_defaults_to_empty() {
        assert_eq!(remote_id(&json!({"id": "abc"})), "abc");
        assert_eq!(remote_id(&json!({"name": "abc"})), "");
        assert!(into_object(json!([1])).is_empty());
    }
}
