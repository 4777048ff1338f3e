//! Startup catch-up scanning.
//!
//! While the process was down, monitored chats kept moving. The
//! scanner walks each chat's recent history once at startup and
//! replays anything the router would have enqueued live, at low
//! priority. It holds no lock against the live path: the dedup store
//! and the reply-scan heuristic are the only protection against
//! double-enqueue, and both tolerate the race (same deterministic
//! session id, idempotent record).

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use valor_models::{InboundMessage, WorkItem, WorkPriority};

use crate::dedup::DedupStore;
use crate::resolver::ProjectResolver;
use crate::router::route;
use crate::transport::{ChatHistory, JobQueue};

/// How many newer messages are inspected for an existing reply.
///
/// Known limitation: in a busy chat with more than this many messages
/// between the target and our reply, the check false-negatives and the
/// message is re-enqueued. Widening the window needs real message
/// velocity data first.
pub const REPLY_SCAN_WINDOW: usize = 10;

/// One-shot startup scanner for missed messages.
pub struct CatchUpScanner<'a> {
    resolver: &'a ProjectResolver,
    dedup: &'a DedupStore,
    respond_to_dms: bool,
}

impl<'a> CatchUpScanner<'a> {
    pub fn new(resolver: &'a ProjectResolver, dedup: &'a DedupStore, respond_to_dms: bool) -> Self {
        Self {
            resolver,
            dedup,
            respond_to_dms,
        }
    }

    /// Scans the given chats and enqueues missed work.
    ///
    /// Returns the number of work items enqueued. A chat whose fetch
    /// fails is logged and skipped; it never aborts the scan of other
    /// chats.
    pub async fn scan<H, Q>(
        &self,
        history: &H,
        queue: &Q,
        chats: &[String],
        lookback: Duration,
        per_chat_limit: usize,
    ) -> usize
    where
        H: ChatHistory,
        Q: JobQueue,
    {
        let mut enqueued = 0;

        for chat in chats {
            match history.fetch_recent(chat, per_chat_limit).await {
                Ok(messages) => {
                    let count = self.scan_chat(queue, chat, &messages, lookback);
                    enqueued += count;
                    debug!(chat = %chat, replayed = count, "Chat scan complete");
                }
                Err(e) => {
                    warn!(chat = %chat, error = %e, "History fetch failed, skipping chat");
                }
            }
        }

        info!(chats = chats.len(), enqueued = enqueued, "Catch-up scan finished");
        enqueued
    }

    /// Walks one chat's messages, newest first.
    fn scan_chat<Q: JobQueue>(
        &self,
        queue: &Q,
        chat_title: &str,
        messages: &[InboundMessage],
        lookback: Duration,
    ) -> usize {
        let cutoff = Utc::now() - lookback;
        let mut enqueued = 0;

        for (i, msg) in messages.iter().enumerate() {
            // Messages arrive newest-first; the first one past the
            // window ends the walk.
            if msg.timestamp < cutoff {
                break;
            }
            if msg.is_outgoing || msg.text.trim().is_empty() {
                continue;
            }
            if already_replied(messages, i) {
                debug!(chat = %chat_title, message_id = msg.message_id, "Already answered live, skipping");
                continue;
            }

            let project = self.resolver.resolve(Some(chat_title));
            let decision = route(msg, project.as_deref(), self.respond_to_dms);
            if !decision.respond {
                continue;
            }
            let Some(project) = project else {
                continue;
            };
            if decision.cleaned_text.is_empty() {
                // A bare mention carries no task; the live path greets
                // it, but replaying a greeting hours later is noise.
                debug!(chat = %chat_title, message_id = msg.message_id, "Empty after trigger stripping, skipping");
                continue;
            }

            if self.dedup.is_duplicate(msg.chat_id, msg.message_id) {
                continue;
            }

            let item = WorkItem::for_message(
                &project.key,
                &project.working_dir,
                msg.chat_id,
                msg.message_id,
                decision.cleaned_text.as_str(),
            )
            .from_sender(msg.sender_id, &msg.sender_name)
            .in_chat(chat_title)
            .with_priority(WorkPriority::Low);

            match queue.enqueue(&item) {
                Ok(()) => {
                    self.dedup.record(msg.chat_id, msg.message_id);
                    info!(
                        chat = %chat_title,
                        message_id = msg.message_id,
                        session_id = %item.session_id,
                        "Replayed missed message"
                    );
                    enqueued += 1;
                }
                Err(e) => {
                    warn!(chat = %chat_title, message_id = msg.message_id, error = %e, "Enqueue failed");
                }
            }
        }

        enqueued
    }
}

/// Whether one of the next `REPLY_SCAN_WINDOW` newer messages is our
/// own reply targeting this message.
///
/// `messages` is newest-first, so "newer" means the slice just before
/// index `i`.
fn already_replied(messages: &[InboundMessage], i: usize) -> bool {
    let target_id = messages[i].message_id;
    let start = i.saturating_sub(REPLY_SCAN_WINDOW);
    messages[start..i]
        .iter()
        .any(|m| m.is_outgoing && m.reply_to == Some(target_id))
}
