use crate::{
    subscribe_channel, ChannelConfig, Error, KeyDirectory, KeyStore, MessageStore, Result,
    Subscription, Timeline,
};
use consult_dm::utils::{fingerprint_b64, public_key_from_b64};
use consult_dm::{DisplayMessage, KeyManager, Message, MessageId, UserId};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Initializing,
    Ready,
    /// Terminal. Opening the conversation failed.
    Failed,
    /// Terminal. The conversation was closed and its feed released.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveStatus {
    Live,
    /// Realtime delivery is off; the reason is suitable for the UI.
    Unavailable(String),
}

impl LiveStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, LiveStatus::Live)
    }
}

/// Opens encrypted two-party conversations against injected backends.
pub struct ConversationChannel {
    directory: Arc<dyn KeyDirectory>,
    store: Arc<dyn MessageStore>,
    config: ChannelConfig,
    key_store: Option<KeyStore>,
}

impl ConversationChannel {
    pub fn new(directory: Arc<dyn KeyDirectory>, store: Arc<dyn MessageStore>) -> Self {
        Self {
            directory,
            store,
            config: ChannelConfig::default(),
            key_store: None,
        }
    }

    /// Build from config; persistent key mode opens the key store in the
    /// config's data directory.
    pub fn with_config(
        directory: Arc<dyn KeyDirectory>,
        store: Arc<dyn MessageStore>,
        config: ChannelConfig,
    ) -> Result<Self> {
        let key_store = config.open_key_store()?;
        Ok(Self {
            directory,
            store,
            config,
            key_store,
        })
    }

    /// Reuse key pairs from `key_store` instead of generating one per open.
    pub fn with_key_store(mut self, key_store: KeyStore) -> Self {
        self.key_store = Some(key_store);
        self
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Open a conversation between `local_user` and `peer_user`.
    ///
    /// Publishes the local key, resolves the peer key, subscribes to inserts
    /// for the local user and loads history. On error every resource acquired
    /// so far is released and nothing is returned.
    pub fn open(&self, local_user: &str, peer_user: &str) -> Result<ConversationHandle> {
        let mut handle = ConversationHandle {
            local: local_user.to_string(),
            peer: peer_user.to_string(),
            keys: KeyManager::new(),
            directory: self.directory.clone(),
            store: self.store.clone(),
            placeholder: self.config.decrypt_failure_placeholder.clone(),
            state: ChannelState::Initializing,
            live: LiveStatus::Unavailable("not subscribed".to_string()),
            peer_public_key: None,
            timeline: Timeline::new(),
            subscription: None,
            inbound: None,
            watchers: Vec::new(),
        };

        let opened = handle
            .initialize(self.key_store.as_ref())
            .and_then(|()| handle.start());
        if let Err(e) = opened {
            tracing::warn!(
                local = %local_user,
                peer = %peer_user,
                error = %e,
                "cannot start secure conversation"
            );
            handle.release(ChannelState::Failed);
            return Err(e);
        }

        Ok(handle)
    }
}

/// One open conversation: its key pair, realtime feed and ordered timeline.
pub struct ConversationHandle {
    local: UserId,
    peer: UserId,
    keys: KeyManager,
    directory: Arc<dyn KeyDirectory>,
    store: Arc<dyn MessageStore>,
    placeholder: String,
    state: ChannelState,
    live: LiveStatus,
    peer_public_key: Option<String>,
    timeline: Timeline,
    subscription: Option<Subscription>,
    inbound: Option<Receiver<Message>>,
    watchers: Vec<Sender<DisplayMessage>>,
}

fn directory_error(e: Error) -> Error {
    match e {
        Error::Directory(_) => e,
        other => Error::Directory(other.to_string()),
    }
}

impl ConversationHandle {
    fn initialize(&mut self, key_store: Option<&KeyStore>) -> Result<()> {
        match key_store {
            Some(store) => self.keys.initialize_with(store.load_or_generate(&self.local)?),
            None => self.keys.initialize(),
        }

        let public_key = self.keys.public_key()?;
        self.directory
            .upsert_public_key(&self.local, &public_key)
            .map_err(directory_error)?;
        tracing::debug!(
            user = %self.local,
            fingerprint = %self.keys.fingerprint()?,
            "published public key"
        );

        let record = self
            .directory
            .get_public_key(&self.peer)
            .map_err(directory_error)?
            .ok_or_else(|| Error::PeerKeyNotFound(self.peer.clone()))?;
        public_key_from_b64(&record.public_key)?;

        self.peer_public_key = Some(record.public_key);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        // Subscribe before loading history; pushes wait in the channel and are
        // merged by id once history is in.
        match subscribe_channel(self.store.as_ref(), &self.local) {
            Ok((subscription, inbound)) => {
                tracing::debug!(
                    subscription = %subscription.id(),
                    user = %self.local,
                    "subscribed to inserts"
                );
                self.subscription = Some(subscription);
                self.inbound = Some(inbound);
                self.live = LiveStatus::Live;
            }
            Err(e) => {
                let e = Error::Subscription(e.to_string());
                tracing::warn!(error = %e, "realtime subscription failed");
                self.live = LiveStatus::Unavailable(
                    "live updates unavailable, reload to see new messages".to_string(),
                );
            }
        }

        let history = self.fetch_history()?;
        self.state = ChannelState::Ready;
        self.process_inbound();
        tracing::debug!(
            local = %self.local,
            peer = %self.peer,
            messages = history.len(),
            "conversation ready"
        );
        Ok(())
    }

    fn release(&mut self, state: ChannelState) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.inbound = None;
        self.watchers.clear();
        self.keys.clear();
        self.state = state;
    }

    fn fetch_history(&mut self) -> Result<Vec<DisplayMessage>> {
        let rows = self
            .store
            .query_messages(&self.local, &self.peer)
            .map_err(|e| Error::HistoryLoad(e.to_string()))?;

        let mut history = Vec::with_capacity(rows.len());
        for row in rows {
            if !row.is_between(&self.local, &self.peer) {
                tracing::warn!(message = %row.id, "dropping row from another conversation");
                continue;
            }
            let displayed = self.display(row);
            self.push(displayed.clone());
            history.push(displayed);
        }
        Ok(history)
    }

    /// Decrypt a stored row for display. Failures are confined to this row.
    ///
    /// Every row of the conversation was sealed between the local key and the
    /// peer key, whichever side sent it.
    fn display(&self, row: Message) -> DisplayMessage {
        let opened = self
            .peer_public_key
            .as_deref()
            .ok_or_else(|| consult_dm::Error::InvalidKey("peer key not resolved".to_string()))
            .and_then(|key| self.keys.decrypt(&row.encrypted_content, key));

        let (content, decrypted) = match opened {
            Ok(plaintext) => (plaintext, true),
            Err(e) if e.is_per_message() => {
                tracing::warn!(
                    message = %row.id,
                    sender = %row.sender_id,
                    error = %e,
                    "failed to decrypt message"
                );
                (self.placeholder.clone(), false)
            }
            Err(e) => {
                tracing::warn!(
                    message = %row.id,
                    error = %e,
                    "cannot open message with conversation keys"
                );
                (self.placeholder.clone(), false)
            }
        };

        DisplayMessage {
            outgoing: row.sender_id == self.local,
            id: row.id,
            sender_id: row.sender_id,
            recipient_id: row.recipient_id,
            content,
            decrypted,
            created_at: row.created_at,
        }
    }

    fn push(&mut self, message: DisplayMessage) -> bool {
        if !self.timeline.insert(message.clone()) {
            return false;
        }
        self.watchers.retain(|watcher| watcher.send(message.clone()).is_ok());
        true
    }

    fn feed_lost(&mut self) {
        self.inbound = None;
        if self.live.is_live() {
            tracing::warn!(user = %self.local, "realtime feed dropped");
            self.live = LiveStatus::Unavailable(
                "live updates unavailable, reload to see new messages".to_string(),
            );
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.state != ChannelState::Ready {
            return Err(Error::NotReady(self.state));
        }
        Ok(())
    }

    /// Re-query the store for this pair and merge the rows into the timeline.
    ///
    /// Returns the full decrypted history, ascending by creation time.
    pub fn load_history(&mut self) -> Result<Vec<DisplayMessage>> {
        self.ensure_ready()?;
        self.fetch_history()
    }

    /// Encrypt and store `plaintext` for the peer.
    ///
    /// Blank input is ignored and returns `Ok(None)`. The message enters the
    /// timeline only after the store has confirmed it; on failure the timeline
    /// is untouched and `Error::Delivery` is returned.
    pub fn send(&mut self, plaintext: &str) -> Result<Option<MessageId>> {
        self.ensure_ready()?;
        let text = plaintext.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let peer_key = self
            .peer_public_key
            .clone()
            .ok_or(Error::NotReady(self.state))?;

        let ciphertext = self.keys.encrypt(text, &peer_key)?;
        let row = self
            .store
            .append_message(&self.local, &self.peer, &ciphertext)
            .map_err(|e| {
                tracing::warn!(peer = %self.peer, error = %e, "message delivery failed");
                match e {
                    Error::Delivery(_) => e,
                    other => Error::Delivery(other.to_string()),
                }
            })?;

        let id = row.id.clone();
        self.push(DisplayMessage {
            id: row.id,
            sender_id: row.sender_id,
            recipient_id: row.recipient_id,
            content: text.to_string(),
            decrypted: true,
            outgoing: true,
            created_at: row.created_at,
        });
        Ok(Some(id))
    }

    /// Apply one realtime insert. Returns whether the timeline changed.
    ///
    /// Rows from other conversations and ids already shown are ignored.
    pub fn on_inbound_message(&mut self, row: Message) -> bool {
        if self.state != ChannelState::Ready
            || !row.is_between(&self.local, &self.peer)
            || self.timeline.contains(&row.id)
        {
            return false;
        }
        let displayed = self.display(row);
        self.push(displayed)
    }

    /// Apply every insert buffered by the realtime feed without blocking.
    /// Returns the number of messages added.
    pub fn process_inbound(&mut self) -> usize {
        let Some(inbound) = self.inbound.clone() else {
            return 0;
        };
        let mut added = 0;
        loop {
            match inbound.try_recv() {
                Ok(row) => {
                    if self.on_inbound_message(row) {
                        added += 1;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.feed_lost();
                    break;
                }
            }
        }
        added
    }

    /// Block up to `timeout` for the next insert, then drain the rest.
    pub fn wait_inbound(&mut self, timeout: Duration) -> usize {
        let Some(inbound) = self.inbound.clone() else {
            return 0;
        };
        match inbound.recv_timeout(timeout) {
            Ok(row) => usize::from(self.on_inbound_message(row)) + self.process_inbound(),
            Err(RecvTimeoutError::Timeout) => 0,
            Err(RecvTimeoutError::Disconnected) => {
                self.feed_lost();
                0
            }
        }
    }

    /// Receive every message added to the timeline from now on.
    pub fn watch(&mut self) -> Receiver<DisplayMessage> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.watchers.push(tx);
        rx
    }

    pub fn messages(&self) -> &[DisplayMessage] {
        self.timeline.messages()
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn live_status(&self) -> &LiveStatus {
        &self.live
    }

    pub fn local_user(&self) -> &str {
        &self.local
    }

    pub fn peer_user(&self) -> &str {
        &self.peer
    }

    pub fn peer_public_key(&self) -> Option<&str> {
        self.peer_public_key.as_deref()
    }

    /// Fingerprint of the peer key, for out-of-band verification.
    pub fn peer_fingerprint(&self) -> Result<String> {
        let key = self
            .peer_public_key
            .as_deref()
            .ok_or(Error::NotReady(self.state))?;
        Ok(fingerprint_b64(key)?)
    }

    pub fn local_public_key(&self) -> Result<String> {
        Ok(self.keys.public_key()?)
    }

    pub fn local_fingerprint(&self) -> Result<String> {
        Ok(self.keys.fingerprint()?)
    }

    /// Tear down the realtime feed and forget the key pair. Idempotent.
    pub fn close(&mut self) {
        if matches!(self.state, ChannelState::Closed | ChannelState::Failed) {
            return;
        }
        self.release(ChannelState::Closed);
        tracing::debug!(local = %self.local, peer = %self.peer, "conversation closed");
    }
}

impl Drop for ConversationHandle {
    fn drop(&mut self) {
        self.close();
    }
}
