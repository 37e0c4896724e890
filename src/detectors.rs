//! Detector resources
//!
//! A detector runs a SignalFlow program containing `detect` calls; each
//! [`Rule`] maps a detect label to a severity and the notifications to send
//! when it fires.

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::charts::{Chart, TimeConfig};
use crate::error::{ValidationError, ValidationResult};
use crate::flow::Program;
use crate::resources::{Resource, Syncable};

/// Collection endpoint for detectors.
pub const DETECTOR_ENDPOINT: &str = "/detector";

/// Rule severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[allow(missing_docs)]
pub enum Severity {
    Critical,
    Major,
    Minor,
    Warning,
    Info,
}

/// Where a firing rule sends notifications. Integrations must already exist
/// in SignalFx; their ids are not checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum Notification {
    /// E-mail address
    Email {
        /// Recipient
        email: String,
    },
    /// PagerDuty integration
    PagerDuty {
        /// Integration id
        credential_id: String,
    },
    /// Slack channel
    Slack {
        /// Integration id
        credential_id: String,
        /// Channel name
        channel: String,
    },
    /// HipChat room
    HipChat {
        /// Integration id
        credential_id: String,
        /// Room name
        room: String,
    },
    /// ServiceNow integration
    ServiceNow {
        /// Integration id
        credential_id: String,
    },
    /// VictorOps routing key
    VictorOps {
        /// Integration id
        credential_id: String,
        /// Routing key
        routing_key: String,
    },
    /// HTTP callback
    Webhook {
        /// Callback URL
        url: String,
        /// Shared secret for the `X-SFX-Signature` HMAC
        #[serde(skip_serializing_if = "Option::is_none")]
        secret: Option<String>,
    },
    /// SignalFx team
    Team {
        /// Team id
        team: String,
    },
    /// E-mail to every member of a team
    TeamEmail {
        /// Team id
        team: String,
    },
}

fn non_empty(value: impl Into<String>, what: &str) -> ValidationResult<String> {
    let value = value.into();
    if value.trim().is_empty() {
        return Err(ValidationError::invalid(format!("{what} cannot be empty")));
    }
    Ok(value)
}

impl Notification {
    /// E-mail notification; the address needs a local part and a dotted
    /// domain.
    pub fn email(address: impl Into<String>) -> ValidationResult<Self> {
        let email = non_empty(address, "email address")?.trim().to_string();
        let valid = match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.split('.').count() > 1
                    && domain.split('.').all(|part| !part.is_empty())
            }
            None => false,
        };
        if !valid {
            return Err(ValidationError::invalid(format!(
                "'{email}' is not a valid email address"
            )));
        }
        Ok(Notification::Email { email })
    }

    /// PagerDuty notification.
    pub fn pager_duty(credential_id: impl Into<String>) -> ValidationResult<Self> {
        Ok(Notification::PagerDuty {
            credential_id: non_empty(credential_id, "PagerDuty integration id")?,
        })
    }

    /// Slack notification.
    pub fn slack(
        credential_id: impl Into<String>,
        channel: impl Into<String>,
    ) -> ValidationResult<Self> {
        Ok(Notification::Slack {
            credential_id: non_empty(credential_id, "Slack integration id")?,
            channel: non_empty(channel, "Slack channel")?,
        })
    }

    /// HipChat notification.
    pub fn hip_chat(
        credential_id: impl Into<String>,
        room: impl Into<String>,
    ) -> ValidationResult<Self> {
        Ok(Notification::HipChat {
            credential_id: non_empty(credential_id, "HipChat integration id")?,
            room: non_empty(room, "HipChat room")?,
        })
    }

    /// ServiceNow notification.
    pub fn service_now(credential_id: impl Into<String>) -> ValidationResult<Self> {
        Ok(Notification::ServiceNow {
            credential_id: non_empty(credential_id, "ServiceNow integration id")?,
        })
    }

    /// VictorOps notification.
    pub fn victor_ops(
        credential_id: impl Into<String>,
        routing_key: impl Into<String>,
    ) -> ValidationResult<Self> {
        Ok(Notification::VictorOps {
            credential_id: non_empty(credential_id, "VictorOps integration id")?,
            routing_key: non_empty(routing_key, "VictorOps routing key")?,
        })
    }

    /// Webhook notification, optionally signed with `secret`.
    pub fn webhook(url: impl Into<String>, secret: Option<String>) -> ValidationResult<Self> {
        Ok(Notification::Webhook {
            url: non_empty(url, "webhook URL")?,
            secret: secret.filter(|s| !s.is_empty()),
        })
    }

    /// Team notification.
    pub fn team(team: impl Into<String>) -> ValidationResult<Self> {
        Ok(Notification::Team {
            team: non_empty(team, "team id")?,
        })
    }

    /// Team e-mail notification.
    pub fn team_email(team: impl Into<String>) -> ValidationResult<Self> {
        Ok(Notification::TeamEmail {
            team: non_empty(team, "team id")?,
        })
    }

    fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Maps a detect label to a severity and notifications.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rule {
    options: Map<String, Value>,
}

impl Rule {
    /// Rule for the `detect` published as `label`.
    pub fn for_label(label: impl Into<String>) -> ValidationResult<Self> {
        let mut rule = Self::default();
        rule.options
            .insert("detectLabel".into(), Value::String(non_empty(label, "detect label")?));
        Ok(rule)
    }

    fn set(mut self, key: &str, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    fn set_text(self, key: &str, value: impl Into<String>) -> ValidationResult<Self> {
        let value = non_empty(value, key)?;
        Ok(self.set(key, Value::String(value)))
    }

    /// Detect label this rule watches.
    pub fn label(&self) -> Option<&str> {
        self.options.get("detectLabel").and_then(Value::as_str)
    }

    /// Severity of incidents raised by this rule.
    pub fn with_severity(self, severity: Severity) -> Self {
        self.set("severity", json!(severity))
    }

    /// Human-readable description.
    pub fn with_description(self, description: impl Into<String>) -> ValidationResult<Self> {
        self.set_text("description", description)
    }

    /// Suppress notifications and events.
    pub fn disabled(self, disabled: bool) -> Self {
        self.set("disabled", json!(disabled))
    }

    /// Notification targets, replacing earlier ones.
    pub fn with_notifications(self, notifications: Vec<Notification>) -> Self {
        let values = notifications.iter().map(Notification::to_value).collect();
        self.set("notifications", Value::Array(values))
    }

    /// Custom message body. Supports SignalFx message variables.
    pub fn with_parameterized_body(self, body: impl Into<String>) -> ValidationResult<Self> {
        self.set_text("parameterizedBody", body)
    }

    /// Custom message subject.
    pub fn with_parameterized_subject(self, subject: impl Into<String>) -> ValidationResult<Self> {
        self.set_text("parameterizedSubject", subject)
    }

    /// Runbook link, available as `{{runbookUrl}}`.
    pub fn with_runbook_url(self, url: impl Into<String>) -> ValidationResult<Self> {
        self.set_text("runbookUrl", url)
    }

    /// First course of action, available as `{{tip}}`.
    pub fn with_tip(self, tip: impl Into<String>) -> ValidationResult<Self> {
        self.set_text("tip", tip)
    }

    fn to_value(&self) -> Value {
        Value::Object(self.options.clone())
    }
}

/// A detector in SignalFx.
#[derive(Debug, Clone, PartialEq)]
pub struct Detector {
    resource: Resource,
    program: Option<Program>,
}

impl Default for Detector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector {
    /// Empty detector.
    pub fn new() -> Self {
        Self {
            resource: Resource::new(DETECTOR_ENDPOINT),
            program: None,
        }
    }

    /// Detector name.
    pub fn name(&self) -> Option<&str> {
        self.resource.name()
    }

    /// Program attached to this detector.
    pub fn program(&self) -> Option<&Program> {
        self.program.as_ref()
    }

    /// Set the detector name.
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

    /// Attach a validated program.
    pub fn with_program(mut self, program: Program) -> ValidationResult<Self> {
        program.validate()?;
        self.resource
            .set_option("programText", Value::String(program.to_string()));
        self.program = Some(program);
        Ok(self)
    }

    /// Derive the program from `chart`, transformed by `update`.
    pub fn from_chart<F>(self, chart: &Chart, update: F) -> ValidationResult<Self>
    where
        F: FnOnce(Program) -> ValidationResult<Program>,
    {
        let program = chart.program().cloned().ok_or_else(|| {
            ValidationError::invalid(format!(
                "chart '{}' has no program to build detector '{}' from",
                chart.name().unwrap_or("unnamed"),
                self.name().unwrap_or("unnamed")
            ))
        })?;
        self.with_program(update(program)?)
    }

    /// Alerting rules, replacing earlier ones. Labels must be unique.
    pub fn with_rules(mut self, rules: Vec<Rule>) -> ValidationResult<Self> {
        if rules.is_empty() {
            return Err(ValidationError::invalid("a detector needs at least one rule"));
        }
        let mut seen = Vec::new();
        for label in rules.iter().filter_map(Rule::label) {
            if seen.contains(&label) {
                return Err(ValidationError::invalid(format!(
                    "detect label '{label}' has more than one rule"
                )));
            }
            seen.push(label);
        }
        let values = rules.iter().map(Rule::to_value).collect();
        self.resource.set_option("rules", Value::Array(values));
        Ok(self)
    }

    /// Wait for late datapoints up to `delay_ms`.
    pub fn with_max_delay(mut self, delay_ms: u64) -> Self {
        self.resource.set_option("maxDelay", json!(delay_ms));
        self
    }

    /// Time window and data markers when viewing the detector.
    pub fn with_visualization(mut self, time: Option<TimeConfig>, show_data_markers: bool) -> Self {
        let mut options = Map::new();
        if let Some(time) = time {
            options.insert("time".into(), time.to_value());
        }
        options.insert("showDataMarkers".into(), json!(show_data_markers));
        self.resource
            .set_option("visualizationOptions", Value::Object(options));
        self
    }

    /// Tags, replacing earlier ones.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        self.resource.set_option("tags", json!(tags));
        self
    }

    /// Owning team ids, replacing earlier ones.
    pub fn with_teams<I, S>(mut self, teams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let teams: Vec<String> = teams.into_iter().map(Into::into).collect();
        self.resource.set_option("teams", json!(teams));
        self
    }
}

impl Syncable for Detector {
    fn resource(&self) -> &Resource {
        &self.resource
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{Aggregation, Assignment, Expr, data, detect, gt, when};

    fn latency_chart() -> Chart {
        Chart::time_series()
            .with_name("Latency")
            .unwrap()
            .with_program(
                Program::new([data("latency").mean(Aggregation::by(["host"])).publish("A")])
                    .unwrap(),
            )
            .unwrap()
    }

    #[test]
    fn notifications_serialize_with_type_tags() {
        let slack = Notification::slack("CRED", "#ops").unwrap();
        assert_eq!(
            slack.to_value(),
            json!({"type": "Slack", "credentialId": "CRED", "channel": "#ops"})
        );
        let hook = Notification::webhook("https://example.com/hook", None).unwrap();
        assert_eq!(hook.to_value(), json!({"type": "Webhook", "url": "https://example.com/hook"}));
        let vo = Notification::victor_ops("V", "key").unwrap();
        assert_eq!(vo.to_value()["routingKey"], "key");
    }

    #[test]
    fn email_addresses_are_checked() {
        assert!(Notification::email("ops@example.com").is_ok());
        assert!(Notification::email("ops").is_err());
        assert!(Notification::email("@example.com").is_err());
        assert!(Notification::email("ops@localhost").is_err());
        assert!(Notification::email("ops@example..com").is_err());
        assert!(Notification::pager_duty("").is_err());
    }

    #[test]
    fn rules_render_their_options() {
        let rule = Rule::for_label("CPU high")
            .unwrap()
            .with_severity(Severity::Critical)
            .with_notifications(vec![Notification::team("T1").unwrap()])
            .with_runbook_url("https://runbooks/cpu")
            .unwrap();
        assert_eq!(
            rule.to_value(),
            json!({
                "detectLabel": "CPU high",
                "severity": "Critical",
                "notifications": [{"type": "Team", "team": "T1"}],
                "runbookUrl": "https://runbooks/cpu",
            })
        );
        assert!(Rule::for_label(" ").is_err());
        assert!(Rule::for_label("x").unwrap().with_tip("").is_err());
    }

    #[test]
    fn duplicate_rule_labels_are_rejected() {
        let rules = vec![Rule::for_label("A").unwrap(), Rule::for_label("A").unwrap()];
        assert!(Detector::new().with_rules(rules).is_err());
        assert!(Detector::new().with_rules(vec![]).is_err());
    }

    #[test]
    fn from_chart_transforms_the_chart_program() {
        let chart = latency_chart();
        let detector = Detector::new()
            .with_name("Latency high")
            .unwrap()
            .from_chart(&chart, |program| {
                let a = Assignment::new("A", program.statements()[0].clone())?;
                let alert = detect(when(gt(a.reference(), 500))).publish("Latency high");
                Program::new([Expr::from(a), Expr::from(alert)])
            })
            .unwrap();

        let text = detector.resource().get("programText").unwrap().as_str().unwrap();
        assert_eq!(
            text,
            "A = data(\"latency\").mean(by=\"host\").publish(label=\"A\")\n\
             detect(when(A > 500)).publish(label=\"Latency high\")"
        );
        assert!(detector.program().unwrap().find_label("Latency high").is_some());
    }

    #[test]
    fn from_chart_requires_a_program() {
        let empty = Chart::time_series().with_name("Empty").unwrap();
        let err = Detector::new().from_chart(&empty, Ok).unwrap_err();
        assert!(err.to_string().contains("Empty"));
    }

    #[test]
    fn payload_collects_all_options() {
        let detector = Detector::new()
            .with_name("d")
            .unwrap()
            .with_max_delay(30_000)
            .with_tags(["prod"])
            .with_teams(vec!["T1".to_string()])
            .with_visualization(Some(TimeConfig::relative(60_000).unwrap()), true);
        let payload = detector.payload();
        assert_eq!(payload["maxDelay"], json!(30_000));
        assert_eq!(payload["tags"], json!(["prod"]));
        assert_eq!(payload["teams"], json!(["T1"]));
        assert_eq!(
            payload["visualizationOptions"],
            json!({"time": {"type": "relative", "range": 60_000}, "showDataMarkers": true})
        );
    }
}
