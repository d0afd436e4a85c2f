//! The sync coordinator: sole owner and mutator of the client state.
//!
//! User actions become optimistic local mutations plus channel emissions;
//! inbound channel events are routed into the message store, the presence
//! tracker and the directory; acknowledgments are reconciled against the
//! optimistic entries.
//!
//! Every mutation runs on one task. Timers and backend calls run detached and
//! report back through an internal queue, and their continuations re-check
//! that the targeted conversation or message still exists before touching
//! anything.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use palaver_net::{Backend, ChannelHandle, ChannelNotification};
use palaver_shared::constants::{
    backoff_delay_ms, CHANNEL_QUEUE_CAPACITY, DELETED_IDS_REMEMBERED,
};
use palaver_shared::protocol::{
    AckPayload, DeletedPayload, InboundEvent, OutboundEvent, PresencePayload, TypingPayload,
};
use palaver_shared::{
    Conversation, ConnectionState, ConversationId, FileAttachment, Identity, Message, MessageId,
    MessageKind, MessageStatus, Payload, SyncError, UserId, VoiceClip,
};
use palaver_store::{AppendOutcome, MessageStore, PresenceTracker, StatusUpdate};

use crate::config::ClientConfig;
use crate::contacts::{self, ContactBook};
use crate::directory::{self, ConversationDirectory, RefreshOutcome};
use crate::events::{emit_change, StateChange, STATE_FEED_CAPACITY};
use crate::session::{ReplyContext, Session};

/// User actions accepted by [`SyncCoordinator::run`].
#[derive(Debug, Clone)]
pub enum Action {
    SelectConversation(ConversationId),
    SendText(String),
    SendVoice(VoiceClip),
    SendFile(FileAttachment),
    BeginReply(MessageId),
    CancelReply,
    Forward {
        message_id: MessageId,
        target: ConversationId,
    },
    Delete(MessageId),
    Retry(MessageId),
    RefreshDirectory,
    CreateConversation(UserId),
    SearchContacts(String),
    Shutdown,
}

/// Completions of detached work, fed back into the loop.
#[derive(Debug)]
enum Internal {
    ReadAckDue {
        conversation: ConversationId,
        message: MessageId,
    },
    RetryDue {
        message: MessageId,
        attempt: u32,
    },
    TypingExpiry,
    DirectoryFetched(Result<Vec<Conversation>, SyncError>),
    ConversationCreated(Result<Conversation, SyncError>),
    ContactsFetched(Result<Vec<Identity>, SyncError>),
}

/// An outbound send not yet acknowledged by the backend.
#[derive(Debug, Clone)]
struct OutboxEntry {
    conversation: ConversationId,
    event: OutboundEvent,
    /// Successful emissions so far.
    attempts: u32,
}

pub struct SyncCoordinator {
    session: Session,
    config: ClientConfig,
    store: MessageStore,
    directory: ConversationDirectory,
    contacts: ContactBook,
    presence: PresenceTracker,
    channel: ChannelHandle,
    backend: Arc<dyn Backend>,
    connection: ConnectionState,
    outbox: HashMap<MessageId, OutboxEntry>,
    /// Inbound messages whose read acknowledgment is scheduled or sent.
    read_acks: HashSet<MessageId>,
    /// Recently deleted ids, oldest first. Echoes of these are dropped.
    deleted: VecDeque<MessageId>,
    changes: broadcast::Sender<StateChange>,
    internal_tx: mpsc::Sender<Internal>,
    internal_rx: mpsc::Receiver<Internal>,
}

impl SyncCoordinator {
    pub fn new(
        session: Session,
        config: ClientConfig,
        channel: ChannelHandle,
        backend: Arc<dyn Backend>,
    ) -> Self {
        let (changes, _) = broadcast::channel(STATE_FEED_CAPACITY);
        let (internal_tx, internal_rx) = mpsc::channel(CHANNEL_QUEUE_CAPACITY);
        let presence = PresenceTracker::new(config.typing_expiry);

        Self {
            session,
            config,
            store: MessageStore::new(),
            directory: ConversationDirectory::new(),
            contacts: ContactBook::new(),
            presence,
            connection: channel.state(),
            channel,
            backend,
            outbox: HashMap::new(),
            read_acks: HashSet::new(),
            deleted: VecDeque::new(),
            changes,
            internal_tx,
            internal_rx,
        }
    }

    /// Receive every subsequent state change.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn directory(&self) -> &ConversationDirectory {
        &self.directory
    }

    pub fn directory_mut(&mut self) -> &mut ConversationDirectory {
        &mut self.directory
    }

    pub fn contacts(&self) -> &ContactBook {
        &self.contacts
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// Identities typing in a conversation, in first-marked order.
    pub fn typing(&self, conversation: &ConversationId) -> Vec<String> {
        self.presence.typing(conversation, Instant::now())
    }

    pub fn messages(&self, conversation: &ConversationId) -> &[Message] {
        self.store.list(conversation)
    }

    /// Whether a sent message still waits for its acknowledgment.
    pub fn is_outstanding(&self, message: &MessageId) -> bool {
        self.outbox.contains_key(message)
    }

    // -----------------------------------------------------------------------
    // User actions
    // -----------------------------------------------------------------------

    /// Make a conversation the active one: its unread counter resets and its
    /// inbound messages get read acknowledgments after the display delay.
    pub fn select_conversation(&mut self, conversation: ConversationId) {
        debug!(conversation = %conversation, "Conversation selected");
        if self.session.active_conversation.as_ref() != Some(&conversation) {
            self.session.reply_context = None;
        }
        self.session.active_conversation = Some(conversation.clone());

        if self.directory.clear_unread(&conversation) {
            self.notify(StateChange::Directory);
        }

        self.schedule_unread_acks(&conversation);

        let identities = self.typing(&conversation);
        self.notify(StateChange::Typing {
            conversation: conversation.clone(),
            identities,
        });
        self.notify(StateChange::Messages(conversation));
    }

    pub fn send_text(&mut self, text: &str) -> Result<MessageId, SyncError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SyncError::EmptyMessage);
        }
        self.send_payload(Payload::text(text))
    }

    pub fn send_voice(&mut self, clip: VoiceClip) -> Result<MessageId, SyncError> {
        self.send_payload(Payload::Voice(clip))
    }

    pub fn send_file(&mut self, file: FileAttachment) -> Result<MessageId, SyncError> {
        self.send_payload(Payload::File(file))
    }

    /// Optimistically append a new message to the active conversation and
    /// emit it. The active reply context, if any, is attached and cleared.
    fn send_payload(&mut self, payload: Payload) -> Result<MessageId, SyncError> {
        let conversation = self
            .session
            .active_conversation
            .clone()
            .ok_or(SyncError::NoActiveConversation)?;

        let mut message = Message::outgoing(conversation, &self.session.user, payload);
        if let Some(reply) = self.session.reply_context.take() {
            message.reply_to_id = Some(reply.message_id);
            message.reply_snippet = Some(reply.snippet);
        }

        let event = match message.kind() {
            MessageKind::Text => OutboundEvent::SendMessage(message.clone()),
            MessageKind::Voice => OutboundEvent::VoiceMessage(message.clone()),
            MessageKind::File => OutboundEvent::FileMessage(message.clone()),
        };
        Ok(self.dispatch(message, event))
    }

    /// Start replying to a message of the active conversation. The snippet
    /// is copied now.
    pub fn begin_reply(&mut self, message_id: &MessageId) -> Result<(), SyncError> {
        let conversation = self
            .session
            .active_conversation
            .as_ref()
            .ok_or(SyncError::NoActiveConversation)?;
        let original = self
            .store
            .get(conversation, message_id)
            .ok_or_else(|| SyncError::NotFound(message_id.to_string()))?;

        self.session.reply_context = Some(ReplyContext {
            message_id: original.id.clone(),
            snippet: original
                .text()
                .map(str::to_string)
                .unwrap_or_else(|| original.preview()),
            sender: original.sender_label().to_string(),
        });
        Ok(())
    }

    pub fn cancel_reply(&mut self) {
        self.session.reply_context = None;
    }

    /// Re-send an existing message's content into `target` as a new message.
    pub fn forward(
        &mut self,
        message_id: &MessageId,
        target: ConversationId,
    ) -> Result<MessageId, SyncError> {
        let original = self
            .store
            .locate(message_id)
            .and_then(|conversation| self.store.get(conversation, message_id))
            .ok_or_else(|| SyncError::NotFound(message_id.to_string()))?;

        let mut message = Message::outgoing(target, &self.session.user, original.payload.clone());
        message.forwarded_from = Some(original.sender_label().to_string());

        let event = OutboundEvent::ForwardMessage(message.clone());
        Ok(self.dispatch(message, event))
    }

    /// Remove a message locally and ask the backend to delete it. Nothing is
    /// awaited. Returns `false` if the message was unknown.
    pub fn delete(&mut self, message_id: &MessageId) -> bool {
        let Some(conversation) = self.store.locate(message_id).cloned() else {
            debug!(message = %message_id, "Delete of unknown message ignored");
            return false;
        };
        if self.store.remove(&conversation, message_id).is_none() {
            return false;
        }
        self.outbox.remove(message_id);
        self.read_acks.remove(message_id);
        self.remember_deleted(message_id);

        if let Err(e) = self
            .channel
            .emit(OutboundEvent::DeleteMessage(message_id.clone()))
        {
            warn!(message = %message_id, error = %e, "Delete not sent upstream");
        }

        self.notify(StateChange::Messages(conversation));
        true
    }

    /// Put a failed message back to `pending` and send it again, now if the
    /// channel is up, otherwise on reconnect.
    pub fn retry(&mut self, message_id: &MessageId) -> Result<(), SyncError> {
        let entry = self
            .outbox
            .get_mut(message_id)
            .ok_or_else(|| SyncError::NotFound(message_id.to_string()))?;
        entry.attempts = 0;
        let conversation = entry.conversation.clone();

        let update = self
            .store
            .update_status(&conversation, message_id, MessageStatus::Pending);
        if update.changed() {
            self.notify(StateChange::Messages(conversation));
        }
        info!(message = %message_id, "Manual retry");

        if self.connection.is_connected() {
            self.emit_outbox_entry(message_id);
        }
        Ok(())
    }

    /// Fetch the conversation list inline.
    pub async fn refresh_directory(&mut self) -> RefreshOutcome {
        let outcome = self.directory.refresh(self.backend.as_ref()).await;
        self.notify(StateChange::Directory);
        outcome
    }

    /// Create a conversation inline and select it.
    pub async fn create_conversation(
        &mut self,
        participant: &UserId,
    ) -> Result<Conversation, SyncError> {
        let conversation = self
            .directory
            .create(self.backend.as_ref(), participant)
            .await?;
        self.notify(StateChange::Directory);
        self.select_conversation(conversation.id.clone());
        Ok(conversation)
    }

    /// Search contacts inline. Returns `true` when sample contacts are shown.
    pub async fn search_contacts(&mut self, query: &str) -> bool {
        let using_fallback = self.contacts.refresh(self.backend.as_ref(), query).await;
        self.notify(StateChange::Contacts);
        using_fallback
    }

    // -----------------------------------------------------------------------
    // Channel events
    // -----------------------------------------------------------------------

    pub fn handle_notification(&mut self, notification: ChannelNotification) {
        match notification {
            ChannelNotification::State(state) => self.on_connection_state(state),
            ChannelNotification::Event(event) => self.on_inbound(event),
        }
    }

    fn on_connection_state(&mut self, state: ConnectionState) {
        let previous = std::mem::replace(&mut self.connection, state);
        if previous == state {
            return;
        }
        info!(from = ?previous, to = ?state, "Connection state changed");
        self.notify(StateChange::Connection(state));

        if previous.is_connected() && !state.is_connected() {
            self.fail_outstanding();
            for conversation in self.presence.clear_all() {
                self.notify(StateChange::Typing {
                    conversation,
                    identities: Vec::new(),
                });
            }
        }

        if state.is_connected() {
            self.schedule_resends();
            if let Some(active) = self.session.active_conversation.clone() {
                self.schedule_unread_acks(&active);
            }
        }
    }

    fn on_inbound(&mut self, event: InboundEvent) {
        debug!(event = event.name(), "Routing inbound event");
        match event {
            InboundEvent::Message(message) => self.on_message(message),
            InboundEvent::TypingStart(TypingPayload {
                username,
                conversation_id,
            }) => self.on_typing(conversation_id, &username, true),
            InboundEvent::TypingStop(TypingPayload {
                username,
                conversation_id,
            }) => self.on_typing(conversation_id, &username, false),
            InboundEvent::MessageAck(AckPayload {
                message_id,
                conversation_id,
                status,
            }) => self.apply_ack(conversation_id, &message_id, status),
            InboundEvent::MessageDeleted(DeletedPayload {
                message_id,
                conversation_id,
            }) => self.on_deleted(conversation_id, &message_id),
            InboundEvent::Presence(PresencePayload {
                conversation_id,
                online,
            }) => {
                if self.directory.set_peer_online(&conversation_id, online) {
                    self.notify(StateChange::Directory);
                }
            }
        }
    }

    fn on_message(&mut self, message: Message) {
        if self.deleted.contains(&message.id) {
            debug!(message = %message.id, "Message was deleted locally, dropping");
            return;
        }
        if self.outbox.contains_key(&message.id) || self.is_own_echo(&message) {
            debug!(message = %message.id, "Own message echoed back, treating as sent");
            self.apply_ack(
                Some(message.conversation_id.clone()),
                &message.id,
                MessageStatus::Sent,
            );
            return;
        }

        let conversation = message.conversation_id.clone();
        let id = message.id.clone();
        let preview = message.preview();
        let created_at = message.created_at;
        let sender = message.sender_label().to_string();
        let inbound = self.is_inbound(&message);

        if self.store.append(message) == AppendOutcome::Duplicate {
            return;
        }

        // A message ends that sender's typing.
        if self.presence.clear_typing(&conversation, &sender) {
            self.notify_typing(&conversation);
        }

        self.directory.touch(&conversation, preview, created_at);
        // Our own messages from elsewhere are neither unread nor acknowledged.
        if inbound {
            if self.session.active_conversation.as_ref() == Some(&conversation) {
                self.schedule_read_ack(conversation.clone(), id);
            } else {
                self.directory.increment_unread(&conversation);
            }
        }

        self.notify(StateChange::Messages(conversation));
        self.notify(StateChange::Directory);
    }

    fn is_own_echo(&self, message: &Message) -> bool {
        message.sender_id == self.session.user.id
            && self.store.contains(&message.conversation_id, &message.id)
    }

    fn on_typing(&mut self, conversation: Option<ConversationId>, username: &str, started: bool) {
        let Some(conversation) = conversation.or_else(|| self.session.active_conversation.clone())
        else {
            debug!(username, "Typing event without a conversation ignored");
            return;
        };
        if username == self.session.user.label() {
            return;
        }

        let changed = if started {
            let added = self
                .presence
                .mark_typing(&conversation, username, Instant::now());
            self.spawn_after(self.presence.expiry(), Internal::TypingExpiry);
            added
        } else {
            self.presence.clear_typing(&conversation, username)
        };

        if changed {
            self.notify_typing(&conversation);
        }
    }

    /// Reconcile a delivery status for one of our messages.
    fn apply_ack(
        &mut self,
        conversation: Option<ConversationId>,
        message_id: &MessageId,
        status: MessageStatus,
    ) {
        let Some(conversation) = conversation.or_else(|| self.store.locate(message_id).cloned())
        else {
            debug!(message = %message_id, "Acknowledgment for unknown message");
            return;
        };

        let update = self.store.update_status(&conversation, message_id, status);
        match update {
            StatusUpdate::NotFound => {
                debug!(message = %message_id, "Acknowledgment for unknown message");
                return;
            }
            StatusUpdate::Ignored { current } => {
                debug!(message = %message_id, current = ?current, stale = ?status, "Stale acknowledgment");
            }
            StatusUpdate::Applied { .. } => {}
        }

        if status.rank() >= MessageStatus::Sent.rank() && self.outbox.remove(message_id).is_some()
        {
            debug!(message = %message_id, "Send acknowledged");
        }
        if update.changed() {
            self.notify(StateChange::Messages(conversation));
        }
    }

    fn on_deleted(&mut self, conversation: Option<ConversationId>, message_id: &MessageId) {
        self.remember_deleted(message_id);
        let Some(conversation) = conversation.or_else(|| self.store.locate(message_id).cloned())
        else {
            return;
        };
        if self.store.remove(&conversation, message_id).is_some() {
            self.outbox.remove(message_id);
            self.read_acks.remove(message_id);
            self.notify(StateChange::Messages(conversation));
        }
    }

    // -----------------------------------------------------------------------
    // Internal completions
    // -----------------------------------------------------------------------

    /// Wait for the next timer or backend completion and apply it. Returns
    /// `false` if nothing can arrive anymore.
    pub async fn process_next_completion(&mut self) -> bool {
        match self.internal_rx.recv().await {
            Some(internal) => {
                self.handle_internal(internal);
                true
            }
            None => false,
        }
    }

    fn handle_internal(&mut self, internal: Internal) {
        match internal {
            Internal::ReadAckDue {
                conversation,
                message,
            } => self.send_read_ack(&conversation, &message),
            Internal::RetryDue { message, attempt } => {
                let still_due = self
                    .outbox
                    .get(&message)
                    .is_some_and(|entry| entry.attempts == attempt);
                if still_due && self.connection.is_connected() {
                    self.emit_outbox_entry(&message);
                }
            }
            Internal::TypingExpiry => {
                for conversation in self.presence.sweep(Instant::now()) {
                    self.notify_typing(&conversation);
                }
            }
            Internal::DirectoryFetched(result) => {
                let outcome = self.directory.apply_refresh(result);
                if outcome.using_fallback {
                    self.notify(StateChange::Notice(
                        "Showing sample conversations".to_string(),
                    ));
                }
                self.notify(StateChange::Directory);
            }
            Internal::ConversationCreated(result) => match result {
                Ok(conversation) => {
                    let id = conversation.id.clone();
                    self.directory.insert_front(conversation);
                    self.notify(StateChange::Directory);
                    self.select_conversation(id);
                }
                Err(e) => self.report(&e),
            },
            Internal::ContactsFetched(result) => {
                self.contacts.apply(result);
                self.notify(StateChange::Contacts);
            }
        }
    }

    fn send_read_ack(&mut self, conversation: &ConversationId, message: &MessageId) {
        let still_visible = self.session.active_conversation.as_ref() == Some(conversation)
            && self.store.contains(conversation, message);
        if !still_visible || !self.connection.is_connected() {
            // Scheduled again on the next selection or reconnect.
            self.read_acks.remove(message);
            return;
        }
        match self.channel.emit(OutboundEvent::MarkRead(message.clone())) {
            Ok(()) => debug!(message = %message, "Read acknowledgment sent"),
            Err(e) => {
                debug!(message = %message, error = %e, "Read acknowledgment not sent");
                self.read_acks.remove(message);
            }
        }
    }

    /// Schedule read acknowledgments for every inbound message of the
    /// conversation that has none scheduled or sent.
    fn schedule_unread_acks(&mut self, conversation: &ConversationId) {
        let unacked: Vec<MessageId> = self
            .store
            .list(conversation)
            .iter()
            .filter(|m| self.is_inbound(m) && !self.read_acks.contains(&m.id))
            .map(|m| m.id.clone())
            .collect();
        for id in unacked {
            self.schedule_read_ack(conversation.clone(), id);
        }
    }

    fn schedule_read_ack(&mut self, conversation: ConversationId, message: MessageId) {
        if !self.read_acks.insert(message.clone()) {
            return;
        }
        self.spawn_after(
            self.config.read_ack_delay,
            Internal::ReadAckDue {
                conversation,
                message,
            },
        );
    }

    // -----------------------------------------------------------------------
    // Outbox
    // -----------------------------------------------------------------------

    /// Append an optimistic message, queue it in the outbox and emit it.
    fn dispatch(&mut self, message: Message, event: OutboundEvent) -> MessageId {
        let id = message.id.clone();
        let conversation = message.conversation_id.clone();
        let preview = message.preview();
        let created_at = message.created_at;

        self.store.append(message);
        self.outbox.insert(
            id.clone(),
            OutboxEntry {
                conversation: conversation.clone(),
                event,
                attempts: 0,
            },
        );
        self.emit_outbox_entry(&id);

        self.directory.touch(&conversation, preview, created_at);
        self.notify(StateChange::Messages(conversation));
        self.notify(StateChange::Directory);
        id
    }

    /// Emit an outbox entry. When the channel is down the message stays in
    /// the outbox and goes out on reconnect.
    fn emit_outbox_entry(&mut self, message_id: &MessageId) {
        let Some(entry) = self.outbox.get_mut(message_id) else {
            return;
        };
        match self.channel.emit(entry.event.clone()) {
            Ok(()) => {
                entry.attempts += 1;
                debug!(message = %message_id, attempt = entry.attempts, "Message emitted");
                let conversation = entry.conversation.clone();
                if self
                    .store
                    .update_status(&conversation, message_id, MessageStatus::Pending)
                    .changed()
                {
                    self.notify(StateChange::Messages(conversation));
                }
            }
            Err(e) => {
                debug!(message = %message_id, error = %e, "Message queued until the channel is up");
            }
        }
    }

    /// After a disconnect nothing outstanding will be acknowledged.
    fn fail_outstanding(&mut self) {
        let mut touched = HashSet::new();
        for (id, entry) in &self.outbox {
            if self
                .store
                .update_status(&entry.conversation, id, MessageStatus::Failed)
                .changed()
            {
                touched.insert(entry.conversation.clone());
            }
        }
        if !touched.is_empty() {
            warn!(count = self.outbox.len(), "Channel lost, outstanding messages failed");
        }
        for conversation in touched {
            self.notify(StateChange::Messages(conversation));
        }
    }

    /// Schedule a resend of every outbox entry that still has attempts left.
    fn schedule_resends(&mut self) {
        let base = self.config.retry_base.as_millis() as u64;
        let max = self.config.retry_max.as_millis() as u64;

        let due: Vec<(MessageId, u32)> = self
            .outbox
            .iter()
            .filter(|(_, entry)| entry.attempts < self.config.max_send_attempts)
            .map(|(id, entry)| (id.clone(), entry.attempts))
            .collect();

        for (message, attempt) in due {
            let delay = Duration::from_millis(backoff_delay_ms(attempt, base, max));
            debug!(message = %message, attempt, delay_ms = delay.as_millis() as u64, "Resend scheduled");
            self.spawn_after(delay, Internal::RetryDue { message, attempt });
        }
    }

    // -----------------------------------------------------------------------
    // Event loop
    // -----------------------------------------------------------------------

    /// Drive the coordinator until [`Action::Shutdown`] or until the action
    /// sender is dropped. All mutations happen on this task.
    pub async fn run(
        mut self,
        mut actions: mpsc::Receiver<Action>,
        mut notifications: mpsc::Receiver<ChannelNotification>,
    ) {
        info!(user = %self.session.user.id, "Sync coordinator started");
        let mut channel_open = true;

        loop {
            tokio::select! {
                action = actions.recv() => match action {
                    Some(Action::Shutdown) | None => break,
                    Some(action) => self.handle_action(action),
                },

                notification = notifications.recv(), if channel_open => match notification {
                    Some(notification) => self.handle_notification(notification),
                    None => {
                        warn!("Channel adapter stopped");
                        channel_open = false;
                        self.on_connection_state(ConnectionState::Disconnected);
                    }
                },

                Some(internal) = self.internal_rx.recv() => self.handle_internal(internal),
            }
        }

        self.channel.shutdown().await;
        info!("Sync coordinator stopped");
    }

    /// Apply one user action. Backend calls are started in the background.
    pub fn handle_action(&mut self, action: Action) {
        let result = match action {
            Action::SelectConversation(id) => {
                self.select_conversation(id);
                Ok(())
            }
            Action::SendText(text) => self.send_text(&text).map(drop),
            Action::SendVoice(clip) => self.send_voice(clip).map(drop),
            Action::SendFile(file) => self.send_file(file).map(drop),
            Action::BeginReply(id) => self.begin_reply(&id),
            Action::CancelReply => {
                self.cancel_reply();
                Ok(())
            }
            Action::Forward { message_id, target } => self.forward(&message_id, target).map(drop),
            Action::Delete(id) => {
                self.delete(&id);
                Ok(())
            }
            Action::Retry(id) => self.retry(&id),
            Action::RefreshDirectory => {
                let backend = Arc::clone(&self.backend);
                self.spawn_task(async move {
                    Internal::DirectoryFetched(directory::fetch(backend.as_ref()).await)
                });
                Ok(())
            }
            Action::CreateConversation(participant) => {
                if self.backend.has_credential() {
                    let backend = Arc::clone(&self.backend);
                    self.spawn_task(async move {
                        Internal::ConversationCreated(
                            backend.create_conversation(&participant).await,
                        )
                    });
                    Ok(())
                } else {
                    Err(SyncError::Unauthenticated)
                }
            }
            Action::SearchContacts(query) => {
                let backend = Arc::clone(&self.backend);
                self.spawn_task(async move {
                    Internal::ContactsFetched(contacts::search(backend.as_ref(), &query).await)
                });
                Ok(())
            }
            Action::Shutdown => Ok(()),
        };

        if let Err(e) = result {
            self.report(&e);
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn is_inbound(&self, message: &Message) -> bool {
        message.sender_id != self.session.user.id
    }

    fn remember_deleted(&mut self, message_id: &MessageId) {
        if self.deleted.contains(message_id) {
            return;
        }
        if self.deleted.len() == DELETED_IDS_REMEMBERED {
            self.deleted.pop_front();
        }
        self.deleted.push_back(message_id.clone());
    }

    fn notify_typing(&self, conversation: &ConversationId) {
        self.notify(StateChange::Typing {
            conversation: conversation.clone(),
            identities: self.typing(conversation),
        });
    }

    fn notify(&self, change: StateChange) {
        emit_change(&self.changes, change);
    }

    fn report(&self, error: &SyncError) {
        warn!(error = %error, "Action failed");
        self.notify(StateChange::Notice(error.to_string()));
    }

    fn spawn_after(&self, delay: Duration, internal: Internal) {
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(internal).await;
        });
    }

    fn spawn_task<F>(&self, work: F)
    where
        F: std::future::Future<Output = Internal> + Send + 'static,
    {
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(work.await).await;
        });
    }
}
