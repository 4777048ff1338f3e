//! Chat-title to project resolution.

use std::sync::Arc;

use tracing::{debug, warn};
use valor_models::{ProjectConfig, ProjectsConfig};

/// Resolves chat titles to project configurations.
///
/// Built once per config load. Each project claims its monitored group
/// names (lowercased); the first project to claim a name wins and
/// later duplicate claims are ignored. That is a configuration hazard,
/// not a runtime error, so duplicates are logged at load time and the
/// declared project order stays authoritative.
pub struct ProjectResolver {
    /// (lowercased group name, project), in claim order.
    groups: Vec<(String, Arc<ProjectConfig>)>,
}

impl ProjectResolver {
    /// Builds the group-name map from the loaded configuration.
    pub fn new(config: &ProjectsConfig) -> Self {
        let mut groups: Vec<(String, Arc<ProjectConfig>)> = Vec::new();

        for project in &config.projects {
            let project = Arc::new(project.clone());
            for group in &project.monitored_groups {
                let key = group.trim().to_lowercase();
                if key.is_empty() {
                    continue;
                }
                if let Some((_, claimed_by)) = groups.iter().find(|(g, _)| *g == key) {
                    warn!(
                        group = %group,
                        project = %project.key,
                        claimed_by = %claimed_by.key,
                        "Duplicate monitored group claim ignored"
                    );
                    continue;
                }
                groups.push((key, Arc::clone(&project)));
            }
        }

        debug!(groups = groups.len(), "Project resolver built");
        Self { groups }
    }

    /// Resolves a chat title to its project.
    ///
    /// Matching is case-insensitive substring containment: the chat
    /// title must contain a known group name. This is intentionally
    /// loose to handle platform-appended suffixes on group titles.
    pub fn resolve(&self, chat_title: Option<&str>) -> Option<Arc<ProjectConfig>> {
        let title = chat_title?.to_lowercase();
        self.groups
            .iter()
            .find(|(group, _)| title.contains(group.as_str()))
            .map(|(_, project)| Arc::clone(project))
    }

    /// All monitored group names, in claim order (for catch-up scans).
    pub fn monitored_groups(&self) -> Vec<String> {
        self.groups.iter().map(|(g, _)| g.clone()).collect()
    }
}
