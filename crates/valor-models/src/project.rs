//! Project configuration types for Valor.
//!
//! A project maps a set of monitored chat groups to a working
//! directory and a response policy. The full configuration is loaded
//! once at startup and treated as immutable for the process lifetime.

use serde::{Deserialize, Serialize};

/// How a project decides whether to respond to a group message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponsePolicy {
    /// Respond to every group message, regardless of content.
    #[serde(default)]
    pub respond_to_all: bool,

    /// Respond when a mention trigger appears in the message text.
    #[serde(default)]
    pub respond_to_mentions: bool,

    /// Trigger strings matched case-insensitively as substrings.
    #[serde(default)]
    pub triggers: Vec<String>,
}

/// Source-control policy and remote coordinates for a project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceControl {
    /// When true, completed branches go through a pull request instead
    /// of a direct push to the default branch.
    #[serde(default)]
    pub prefer_pr: bool,

    /// GitHub organization or user owning the repository.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,

    /// Repository name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

/// A project managed by Valor.
///
/// Immutable after load. Chat titles are matched against
/// `monitored_groups` by case-insensitive substring containment, so a
/// group named `"Dev: Alpha"` also claims a chat titled
/// `"Dev: Alpha Team"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Stable identifier key (used in job payloads and logs).
    pub key: String,

    /// Human-readable name.
    pub display_name: String,

    /// Absolute path to the project's main working directory.
    pub working_dir: String,

    /// Response policy for group messages.
    #[serde(default)]
    pub response_policy: ResponsePolicy,

    /// Display names of chat groups this project monitors.
    #[serde(default)]
    pub monitored_groups: Vec<String>,

    /// Source-control policy.
    #[serde(default)]
    pub source_control: SourceControl,
}

/// Top-level configuration: the global DM default plus all projects.
///
/// DM behavior is intentionally global rather than per-project: a DM
/// carries no chat title to resolve a project from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectsConfig {
    /// Whether DMs get a response at all.
    #[serde(default)]
    pub respond_to_dms: bool,

    /// All configured projects, in declaration order. Order matters:
    /// when two projects claim overlapping group names, the first
    /// declaration wins.
    #[serde(default)]
    pub projects: Vec<ProjectConfig>,
}

impl ProjectConfig {
    /// Creates a minimal project config (mostly useful in tests).
    pub fn new(key: impl Into<String>, working_dir: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            display_name: key.clone(),
            key,
            working_dir: working_dir.into(),
            response_policy: ResponsePolicy::default(),
            monitored_groups: Vec::new(),
            source_control: SourceControl::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_config_new() {
        let project = ProjectConfig::new("alpha", "/srv/alpha");
        assert_eq!(project.key, "alpha");
        assert_eq!(project.display_name, "alpha");
        assert_eq!(project.working_dir, "/srv/alpha");
        assert!(!project.response_policy.respond_to_all);
        assert!(project.monitored_groups.is_empty());
    }

    #[test]
    fn test_projects_config_deserializes_with_defaults() {
        let json = r#"{
            "projects": [
                {"key": "alpha", "display_name": "Alpha", "working_dir": "/srv/alpha"}
            ]
        }"#;

        let config: ProjectsConfig = serde_json::from_str(json).unwrap();
        assert!(!config.respond_to_dms);
        assert_eq!(config.projects.len(), 1);
        assert!(config.projects[0].monitored_groups.is_empty());
        assert!(!config.projects[0].source_control.prefer_pr);
    }

    #[test]
    fn test_full_project_roundtrip() {
        let json = r#"{
            "respond_to_dms": true,
            "projects": [{
                "key": "alpha",
                "display_name": "Alpha",
                "working_dir": "/srv/alpha",
                "response_policy": {
                    "respond_to_mentions": true,
                    "triggers": ["@bot", "valor"]
                },
                "monitored_groups": ["Dev: Alpha"],
                "source_control": {"prefer_pr": true, "org": "acme", "repo": "alpha"}
            }]
        }"#;

        let config: ProjectsConfig = serde_json::from_str(json).unwrap();
        let project = &config.projects[0];
        assert!(config.respond_to_dms);
        assert!(project.response_policy.respond_to_mentions);
        assert_eq!(project.response_policy.triggers, vec!["@bot", "valor"]);
        assert!(project.source_control.prefer_pr);
        assert_eq!(project.source_control.org.as_deref(), Some("acme"));

        let reserialized = serde_json::to_string(&config).unwrap();
        let reparsed: ProjectsConfig = serde_json::from_str(&reserialized).unwrap();
        assert_eq!(reparsed.projects[0].key, "alpha");
        assert_eq!(
            reparsed.projects[0].monitored_groups,
            vec!["Dev: Alpha".to_string()]
        );
    }
}
