//! In-memory stand-ins for the Postgres-backed stores, used by unit tests.

use crate::domain::announcement::Announcement;
use crate::domain::conversation::{AppendTarget, Conversation, ConversationKey, ConversationSummary, Participant, Route};
use crate::domain::message::{ChatMessage, MessageView};
use crate::domain::user::{Role, User};
use crate::error::{AppError, Result};
use crate::storage::announcement_repo::TransportDirectory;
use crate::storage::conversation_repo::ConversationStore;
use crate::storage::user_repo::UserDirectory;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use tokio::sync::Notify;
use uuid::Uuid;

#[derive(Debug, Default)]
pub(crate) struct StaticDirectory {
    users: Mutex<HashMap<Uuid, User>>,
    announcements: Mutex<HashMap<Uuid, Announcement>>,
}

impl StaticDirectory {
    pub(crate) fn add_user(&self, first_name: &str, last_name: &str, role: Role) -> User {
        let user = User { id: Uuid::new_v4(), first_name: first_name.into(), last_name: last_name.into(), role };
        self.users.lock().unwrap().insert(user.id, user.clone());
        user
    }

    pub(crate) fn add_announcement(&self, driver: &User, start_location: &str, end_location: &str) -> Announcement {
        let announcement = Announcement {
            id: Uuid::new_v4(),
            driver_id: driver.id,
            start_location: start_location.into(),
            end_location: end_location.into(),
        };
        self.announcements.lock().unwrap().insert(announcement.id, announcement.clone());
        announcement
    }

    fn display_name(&self, user_id: Uuid) -> String {
        self.users.lock().unwrap().get(&user_id).map(User::display_name).unwrap_or_default()
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self.users.lock().unwrap().get(&user_id).cloned())
    }
}

#[async_trait]
impl TransportDirectory for StaticDirectory {
    async fn find_announcement(&self, announcement_id: Uuid) -> Result<Option<Announcement>> {
        Ok(self.announcements.lock().unwrap().get(&announcement_id).cloned())
    }
}

#[derive(Debug, Default)]
struct StoreState {
    conversations: HashMap<Uuid, Conversation>,
    keys: HashMap<ConversationKey, Uuid>,
    messages: HashMap<Uuid, Vec<ChatMessage>>,
}

/// Holds an append in flight until the test releases it.
#[derive(Debug, Default)]
pub(crate) struct AppendGate {
    pub(crate) reached: Notify,
    pub(crate) release: Notify,
}

/// Conversation store that keeps everything behind one mutex, so every append is atomic.
#[derive(Debug)]
pub(crate) struct InMemoryStore {
    directory: Arc<StaticDirectory>,
    state: Mutex<StoreState>,
    fail_writes: AtomicBool,
    append_gate: Mutex<Option<Arc<AppendGate>>>,
}

impl InMemoryStore {
    pub(crate) fn new(directory: Arc<StaticDirectory>) -> Self {
        Self {
            directory,
            state: Mutex::new(StoreState::default()),
            fail_writes: AtomicBool::new(false),
            append_gate: Mutex::new(None),
        }
    }

    /// Parks every subsequent append at the returned gate until `release` is notified.
    pub(crate) fn gate_appends(&self) -> Arc<AppendGate> {
        let gate = Arc::new(AppendGate::default());
        *self.append_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Makes subsequent appends fail as if the database were unreachable.
    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn conversation_count(&self) -> usize {
        self.state.lock().unwrap().conversations.len()
    }

    pub(crate) fn messages(&self, conversation_id: Uuid) -> Vec<ChatMessage> {
        self.state.lock().unwrap().messages.get(&conversation_id).cloned().unwrap_or_default()
    }

    pub(crate) fn total_messages(&self) -> usize {
        self.state.lock().unwrap().messages.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn find(&self, conversation_id: Uuid) -> Result<Option<Conversation>> {
        Ok(self.state.lock().unwrap().conversations.get(&conversation_id).cloned())
    }

    async fn append_message(
        &self,
        target: AppendTarget,
        sender_id: Uuid,
        content: String,
    ) -> Result<(Conversation, ChatMessage)> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Persistence(sqlx::Error::PoolTimedOut));
        }

        let gate = self.append_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.reached.notify_one();
            gate.release.notified().await;
        }

        let mut state = self.state.lock().unwrap();
        let now = OffsetDateTime::now_utc();

        let conversation_id = match target {
            AppendTarget::Existing(id) if state.conversations.contains_key(&id) => id,
            AppendTarget::Existing(_) => return Err(AppError::ConversationNotFound),
            AppendTarget::Keyed(key) => {
                let existing = state.keys.get(&key).copied();
                if let Some(id) = existing {
                    id
                } else {
                    let id = Uuid::now_v7();
                    state.keys.insert(key, id);
                    state.conversations.insert(
                        id,
                        Conversation {
                            id,
                            announcement_id: key.announcement_id,
                            driver_id: key.driver_id,
                            sender_id: key.sender_id,
                            message_count: 0,
                            created_at: now,
                            last_activity_at: now,
                        },
                    );
                    id
                }
            }
        };

        let conversation = state.conversations.get_mut(&conversation_id).ok_or(AppError::ConversationNotFound)?;
        conversation.message_count += 1;
        conversation.last_activity_at = now;
        let conversation = conversation.clone();

        let message = ChatMessage {
            id: Uuid::now_v7(),
            conversation_id,
            seq: conversation.message_count,
            sender_id,
            content,
            created_at: now,
            read_by_recipient: false,
        };
        state.messages.entry(conversation_id).or_default().push(message.clone());

        Ok((conversation, message))
    }

    async fn mark_read(&self, conversation_id: Uuid, reader_id: Uuid) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let mut flipped = 0;
        for message in state.messages.entry(conversation_id).or_default() {
            if message.sender_id != reader_id && !message.read_by_recipient {
                message.read_by_recipient = true;
                flipped += 1;
            }
        }
        Ok(flipped)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ConversationSummary>> {
        let state = self.state.lock().unwrap();
        let announcements = self.directory.announcements.lock().unwrap().clone();

        let mut summaries: Vec<ConversationSummary> = state
            .conversations
            .values()
            .filter(|c| c.is_participant(user_id))
            .map(|c| {
                let route = announcements.get(&c.announcement_id).map_or_else(
                    || Route { start_location: String::new(), end_location: String::new() },
                    |a| Route { start_location: a.start_location.clone(), end_location: a.end_location.clone() },
                );
                let unread_count = state.messages.get(&c.id).map_or(0, |messages| {
                    messages.iter().filter(|m| m.sender_id != user_id && !m.read_by_recipient).count()
                });

                ConversationSummary {
                    id: c.id,
                    announcement_id: c.announcement_id,
                    route,
                    driver: Participant { id: c.driver_id, display_name: self.directory.display_name(c.driver_id) },
                    sender: Participant { id: c.sender_id, display_name: self.directory.display_name(c.sender_id) },
                    last_activity_at: c.last_activity_at,
                    unread_count: i64::try_from(unread_count).unwrap(),
                }
            })
            .collect();

        summaries.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at).then(b.id.cmp(&a.id)));
        Ok(summaries)
    }

    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<MessageView>> {
        Ok(self
            .messages(conversation_id)
            .into_iter()
            .map(|m| {
                let name = self.directory.display_name(m.sender_id);
                m.into_view(name)
            })
            .collect())
    }
}
