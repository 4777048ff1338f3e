//! Shared bot state and the live handling path.
//!
//! [`AppState`] owns everything the dispatcher handlers share: the
//! loaded project config, resolver, dedup store, spool queue, and
//! snapshot logger. The full live decision path lives
//! in [`AppState::handle_inbound`] so it stays testable without a
//! Telegram connection.

use std::sync::Arc;

use tracing::{debug, info};

use valor_core::config;
use valor_models::{InboundMessage, ProjectsConfig, SessionEvent, WorkItem, WorkPriority};
use valor_persistence::{read_json_optional, SnapshotContext, SnapshotLogger};
use valor_routing::{route, DedupStore, FileBackend, JobQueue, ProjectResolver};

use crate::error::Result;
use crate::queue::SpoolQueue;

/// What the live path did with an inbound message.
#[derive(Debug)]
pub enum HandleOutcome {
    /// No response policy matched; message ignored.
    Ignored,
    /// Already handled (dedup hit); silently dropped.
    Duplicate,
    /// Accepted, but nothing left after trigger stripping; reply with
    /// a greeting instead of enqueueing empty work.
    Greeting(String),
    /// Work item enqueued.
    Enqueued(WorkItem),
}

/// State shared across all dispatcher handlers.
pub struct AppState {
    pub config: ProjectsConfig,
    pub resolver: ProjectResolver,
    pub dedup: DedupStore,
    pub queue: SpoolQueue,
    pub snapshots: SnapshotLogger,
}

impl AppState {
    /// Loads state from the standard on-disk layout. A missing
    /// projects file yields an empty config rather than an error.
    pub fn load() -> Result<Arc<Self>> {
        let config: ProjectsConfig =
            read_json_optional(&config::projects_file())?.unwrap_or_default();
        info!(
            projects = config.projects.len(),
            respond_to_dms = config.respond_to_dms,
            "Projects config loaded"
        );

        let resolver = ProjectResolver::new(&config);
        let dedup = DedupStore::new(Box::new(FileBackend::open(config::dedup_file())));

        Ok(Arc::new(Self {
            resolver,
            dedup,
            queue: SpoolQueue::new(config::spool_dir()),
            snapshots: SnapshotLogger::new(config::sessions_log_dir()),
            config,
        }))
    }

    /// In-memory state for tests.
    #[cfg(test)]
    pub fn for_test(config: ProjectsConfig, spool: impl Into<std::path::PathBuf>) -> Self {
        use valor_routing::MemoryBackend;
        let resolver = ProjectResolver::new(&config);
        let spool = spool.into();
        Self {
            resolver,
            dedup: DedupStore::new(Box::new(MemoryBackend::new())),
            queue: SpoolQueue::new(&spool),
            snapshots: SnapshotLogger::new(spool.join("sessions")),
            config,
        }
    }

    /// The live decision path: resolve, route, dedup, enqueue, record.
    ///
    /// Each call handles exactly one message; concurrent calls for
    /// different chats share only the dedup store.
    pub async fn handle_inbound(
        &self,
        msg: &InboundMessage,
        chat_title: Option<&str>,
    ) -> HandleOutcome {
        let project = self.resolver.resolve(chat_title);
        let decision = route(msg, project.as_deref(), self.config.respond_to_dms);
        if !decision.respond {
            return HandleOutcome::Ignored;
        }

        if self.dedup.is_duplicate(msg.chat_id, msg.message_id) {
            debug!(
                chat_id = %msg.chat_id,
                message_id = %msg.message_id,
                "Duplicate message dropped"
            );
            return HandleOutcome::Duplicate;
        }

        // A bare mention with nothing left after trigger stripping
        // gets a direct greeting instead of a work item.
        if decision.cleaned_text.is_empty() {
            self.dedup.record(msg.chat_id, msg.message_id);
            return HandleOutcome::Greeting(decision.cleaned_or_greeting().to_string());
        }

        let (project_key, working_dir) = match &project {
            Some(p) => (p.key.clone(), p.working_dir.clone()),
            None => (String::from("dm"), String::new()),
        };

        let mut item = WorkItem::for_message(
            &project_key,
            &working_dir,
            msg.chat_id,
            msg.message_id,
            decision.cleaned_or_greeting(),
        )
        .from_sender(msg.sender_id, &msg.sender_name)
        .with_priority(WorkPriority::Normal);
        if let Some(title) = chat_title {
            item = item.in_chat(title);
        }

        if let Err(e) = self.queue.enqueue(&item) {
            // Not recorded in dedup: a failed enqueue stays eligible
            // for retry on redelivery.
            tracing::warn!(session_id = %item.session_id, error = %e, "Enqueue failed");
            return HandleOutcome::Ignored;
        }
        self.dedup.record(msg.chat_id, msg.message_id);

        self.snapshots
            .save(
                &item.session_id,
                SessionEvent::Create,
                SnapshotContext {
                    project_key: Some(project_key),
                    task_summary: item.text.clone(),
                    ..Default::default()
                },
            )
            .await;

        info!(
            session_id = %item.session_id,
            project = %item.project_key,
            "Work item enqueued from live message"
        );
        HandleOutcome::Enqueued(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use valor_models::{ProjectConfig, ResponsePolicy};

    fn test_config() -> ProjectsConfig {
        let mut project = ProjectConfig::new("alpha", "/srv/alpha");
        project.monitored_groups = vec!["Dev: Alpha".to_string()];
        project.response_policy = ResponsePolicy {
            respond_to_all: false,
            respond_to_mentions: true,
            triggers: vec!["@bot".to_string()],
        };
        ProjectsConfig {
            respond_to_dms: true,
            projects: vec![project],
        }
    }

    #[tokio::test]
    async fn test_group_mention_is_enqueued_once() {
        let dir = tempdir().unwrap();
        let state = AppState::for_test(test_config(), dir.path());

        let msg = InboundMessage::group(-900, 31, "@bot build X").from_sender(7, "dev");
        let outcome = state.handle_inbound(&msg, Some("Dev: Alpha Team")).await;
        match outcome {
            HandleOutcome::Enqueued(item) => {
                assert_eq!(item.project_key, "alpha");
                assert_eq!(item.text, "build X");
                assert!(state.queue.path_for(&item).exists());
            }
            other => panic!("expected enqueue, got {:?}", other),
        }

        // Redelivery is dropped.
        let outcome = state.handle_inbound(&msg, Some("Dev: Alpha Team")).await;
        assert!(matches!(outcome, HandleOutcome::Duplicate));
    }

    #[tokio::test]
    async fn test_unmatched_group_message_is_ignored() {
        let dir = tempdir().unwrap();
        let state = AppState::for_test(test_config(), dir.path());

        let msg = InboundMessage::group(-900, 1, "no trigger here");
        let outcome = state.handle_inbound(&msg, Some("Dev: Alpha")).await;
        assert!(matches!(outcome, HandleOutcome::Ignored));
    }

    #[tokio::test]
    async fn test_bare_mention_gets_greeting() {
        let dir = tempdir().unwrap();
        let state = AppState::for_test(test_config(), dir.path());

        let msg = InboundMessage::group(-900, 2, "@bot");
        let outcome = state.handle_inbound(&msg, Some("Dev: Alpha")).await;
        match outcome {
            HandleOutcome::Greeting(text) => assert!(!text.is_empty()),
            other => panic!("expected greeting, got {:?}", other),
        }
        // The greeting still counts as handled.
        let outcome = state.handle_inbound(&msg, Some("Dev: Alpha")).await;
        assert!(matches!(outcome, HandleOutcome::Duplicate));
    }

    #[tokio::test]
    async fn test_dm_with_text_is_enqueued() {
        let dir = tempdir().unwrap();
        let state = AppState::for_test(test_config(), dir.path());

        let msg = InboundMessage::dm(55, 3, "fix the login page").from_sender(55, "dev");
        let outcome = state.handle_inbound(&msg, None).await;
        match outcome {
            HandleOutcome::Enqueued(item) => {
                assert_eq!(item.project_key, "dm");
                assert_eq!(item.session_id, "tg-55-3");
            }
            other => panic!("expected enqueue, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dms_ignored_when_disabled() {
        let dir = tempdir().unwrap();
        let mut config = test_config();
        config.respond_to_dms = false;
        let state = AppState::for_test(config, dir.path());

        let msg = InboundMessage::dm(55, 4, "hello?");
        let outcome = state.handle_inbound(&msg, None).await;
        assert!(matches!(outcome, HandleOutcome::Ignored));
    }
}
