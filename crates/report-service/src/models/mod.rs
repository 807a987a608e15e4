//! Data models for the report service.
//!
//! Upstream records are what the Management API returns; report types are
//! what `GET /api/report/applications-actions` sends back.

use serde::{Deserialize, Serialize};

/// Placeholder used when an action has no source code.
pub const NO_CODE_PLACEHOLDER: &str = "No code available";

/// Client name excluded from every report.
pub const ALL_APPLICATIONS_CLIENT_NAME: &str = "All Applications";

// ============================================================================
// Upstream records
// ============================================================================

/// Application (client) from `GET clients`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientRecord {
    pub client_id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,
}

/// Trigger reference inside an action's `supported_triggers`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SupportedTrigger {
    /// Trigger id, e.g. `post-login`.
    pub id: String,

    #[serde(default)]
    pub version: Option<String>,
}

/// Action from `GET actions/actions`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActionRecord {
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// Source text; absent for some actions.
    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub supported_triggers: Option<Vec<SupportedTrigger>>,
}

/// Body of `GET actions/actions`.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionsPage {
    pub actions: Vec<ActionRecord>,
}

// ============================================================================
// Report
// ============================================================================

/// An action as it appears in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionSummary {
    pub id: String,
    pub name: String,
    /// Source text, or [`NO_CODE_PLACEHOLDER`].
    pub code: String,
    /// Ids of the action's supported triggers, in upstream order.
    pub triggers: Vec<String>,
}

impl From<ActionRecord> for ActionSummary {
    fn from(action: ActionRecord) -> Self {
        Self {
            id: action.id,
            name: action.name,
            code: action
                .code
                .unwrap_or_else(|| NO_CODE_PLACEHOLDER.to_string()),
            triggers: action
                .supported_triggers
                .unwrap_or_default()
                .into_iter()
                .map(|trigger| trigger.id)
                .collect(),
        }
    }
}

/// One application and the actions whose code mentions its client id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationEntry {
    pub client_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub app_actions: Vec<ActionSummary>,
}

/// Response body of `GET /api/report/applications-actions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub applications: Vec<ApplicationEntry>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_client_record_deserialization_ignores_extra_fields() {
        let json = r#"{
            "client_id": "abc123",
            "name": "Dashboard",
            "description": "Internal dashboard",
            "app_type": "spa",
            "callbacks": ["http://localhost:3000"]
        }"#;

        let client: ClientRecord = serde_json::from_str(json).unwrap();
        assert_eq!(client.client_id, "abc123");
        assert_eq!(client.name, "Dashboard");
        assert_eq!(client.description.as_deref(), Some("Internal dashboard"));
    }

    #[test]
    fn test_client_record_requires_client_id() {
        assert!(serde_json::from_str::<ClientRecord>(r#"{"name": "x"}"#).is_err());
    }

    #[test]
    fn test_actions_page_deserialization() {
        let json = r#"{
            "actions": [
                {
                    "id": "a1",
                    "name": "Add roles",
                    "code": "exports.onExecutePostLogin = async () => {}",
                    "supported_triggers": [{"id": "post-login", "version": "v3"}],
                    "status": "built"
                },
                {"id": "a2", "name": "Empty"}
            ],
            "total": 2,
            "per_page": 50
        }"#;

        let page: ActionsPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.actions.len(), 2);

        let first = page.actions.first().unwrap();
        assert_eq!(
            first.supported_triggers,
            Some(vec![SupportedTrigger {
                id: "post-login".to_string(),
                version: Some("v3".to_string())
            }])
        );

        let second = page.actions.get(1).unwrap();
        assert!(second.code.is_none());
        assert!(second.supported_triggers.is_none());
    }

    #[test]
    fn test_action_summary_defaults() {
        let summary = ActionSummary::from(ActionRecord {
            id: "a2".to_string(),
            name: "Empty".to_string(),
            code: None,
            supported_triggers: None,
        });

        assert_eq!(summary.code, NO_CODE_PLACEHOLDER);
        assert!(summary.triggers.is_empty());
    }

    #[test]
    fn test_action_summary_keeps_trigger_order() {
        let summary = ActionSummary::from(ActionRecord {
            id: "a1".to_string(),
            name: "Multi".to_string(),
            code: Some("code".to_string()),
            supported_triggers: Some(vec![
                SupportedTrigger {
                    id: "pre-user-registration".to_string(),
                    version: None,
                },
                SupportedTrigger {
                    id: "post-login".to_string(),
                    version: None,
                },
            ]),
        });

        assert_eq!(summary.triggers, vec!["pre-user-registration", "post-login"]);
    }

    #[test]
    fn test_report_serialization_shape() {
        let report = Report {
            applications: vec![
                ApplicationEntry {
                    client_id: "c1".to_string(),
                    name: "App1".to_string(),
                    description: None,
                    app_actions: vec![ActionSummary {
                        id: "a1".to_string(),
                        name: "Act1".to_string(),
                        code: "uses c1".to_string(),
                        triggers: vec!["post-login".to_string()],
                    }],
                },
                ApplicationEntry {
                    client_id: "c3".to_string(),
                    name: "App3".to_string(),
                    description: Some("Third".to_string()),
                    app_actions: vec![],
                },
            ],
        };

        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            serde_json::json!({
                "applications": [
                    {
                        "client_id": "c1",
                        "name": "App1",
                        "app_actions": [
                            {"id": "a1", "name": "Act1", "code": "uses c1", "triggers": ["post-login"]}
                        ]
                    },
                    {
                        "client_id": "c3",
                        "name": "App3",
                        "description": "Third",
                        "app_actions": []
                    }
                ]
            })
        );
    }
}
