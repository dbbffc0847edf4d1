//! Client-side view of matches, requests and the open conversation.
//!
//! A client starts from REST snapshots and then folds in pushed events.
//! Nothing here does I/O; a UI drives it and renders the result.

use std::collections::HashSet;

use uuid::Uuid;

use crate::{chat::Message, notify::ServerEvent, users::{PendingRequests, PublicProfile}};

/// What happened to a pushed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Added to the open transcript.
    Appended,
    /// Already in the open transcript (reconnect or snapshot overlap).
    Duplicate,
    /// Conversation not open; raised as a notification instead.
    Notified,
    /// Our own echo for a conversation that is not open.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub from: Uuid,
    pub message_id: Uuid,
    pub preview: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingState {
    Sending,
    Failed,
}

/// An outgoing message the server has not echoed back yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    pub client_id: String,
    pub partner: Uuid,
    pub content: String,
    pub state: PendingState,
}

#[derive(Debug, Clone)]
struct OpenChat {
    partner: Uuid,
    transcript: Vec<Message>,
    seen: HashSet<Uuid>,
}

const PREVIEW_CHARS: usize = 60;

#[derive(Debug, Clone)]
pub struct ClientState {
    me: Uuid,
    matches: Vec<PublicProfile>,
    received_requests: Vec<PublicProfile>,
    sent_requests: Vec<PublicProfile>,
    open_chat: Option<OpenChat>,
    notifications: Vec<Notification>,
    pending: Vec<PendingMessage>,
    next_client_id: u64,
}

impl ClientState {
    pub fn new(me: Uuid) -> Self {
        ClientState {
            me,
            matches: Vec::new(),
            received_requests: Vec::new(),
            sent_requests: Vec::new(),
            open_chat: None,
            notifications: Vec::new(),
            pending: Vec::new(),
            next_client_id: 0,
        }
    }

    pub fn matches(&self) -> &[PublicProfile] {
        &self.matches
    }

    pub fn is_matched(&self, id: Uuid) -> bool {
        self.matches.iter().any(|p| p.id == id)
    }

    pub fn received_requests(&self) -> &[PublicProfile] {
        &self.received_requests
    }

    pub fn sent_requests(&self) -> &[PublicProfile] {
        &self.sent_requests
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn pending(&self) -> &[PendingMessage] {
        &self.pending
    }

    /// Replaces the match list with the `/api/matches` snapshot.
    pub fn load_matches(&mut self, snapshot: Vec<PublicProfile>) {
        let mut seen = HashSet::new();
        self.matches = snapshot.into_iter().filter(|p| seen.insert(p.id)).collect();
        let matched = &self.matches;
        self.received_requests.retain(|p| !matched.iter().any(|m| m.id == p.id));
        self.sent_requests.retain(|p| !matched.iter().any(|m| m.id == p.id));
    }

    /// Replaces both request lists with the `/api/requests` snapshot.
    pub fn load_requests(&mut self, snapshot: PendingRequests) {
        self.received_requests = snapshot.received;
        self.sent_requests = snapshot.sent;
    }

    /// Prepends a pushed match unless it is already known. Returns whether
    /// the list changed.
    pub fn on_match_found(&mut self, profile: PublicProfile) -> bool {
        self.received_requests.retain(|p| p.id != profile.id);
        self.sent_requests.retain(|p| p.id != profile.id);
        if self.is_matched(profile.id) {
            return false;
        }
        self.matches.insert(0, profile);
        true
    }

    /// Forgets a dissolved match: drops the partner, closes their chat and
    /// discards anything still queued for them.
    pub fn on_unmatched(&mut self, partner: Uuid) -> bool {
        let before = self.matches.len();
        self.matches.retain(|p| p.id != partner);
        self.received_requests.retain(|p| p.id != partner);
        self.sent_requests.retain(|p| p.id != partner);
        self.pending.retain(|p| p.partner != partner);
        self.notifications.retain(|n| n.from != partner);
        if self.open_partner() == Some(partner) {
            self.close_chat();
        }
        self.matches.len() != before
    }

    /// Folds in the result of our own right swipe.
    pub fn on_swipe_result(&mut self, target: PublicProfile, matched: bool) {
        if matched {
            self.on_match_found(target);
        } else if !self.sent_requests.iter().any(|p| p.id == target.id) {
            self.sent_requests.insert(0, target);
        }
    }

    pub fn open_chat(&mut self, partner: Uuid, history: Vec<Message>) {
        let mut seen = HashSet::new();
        let transcript = history.into_iter().filter(|m| seen.insert(m.id)).collect();
        self.notifications.retain(|n| n.from != partner);
        self.open_chat = Some(OpenChat { partner, transcript, seen });
    }

    pub fn close_chat(&mut self) {
        self.open_chat = None;
    }

    pub fn open_partner(&self) -> Option<Uuid> {
        self.open_chat.as_ref().map(|chat| chat.partner)
    }

    pub fn transcript(&self) -> &[Message] {
        self.open_chat.as_ref().map(|chat| chat.transcript.as_slice()).unwrap_or_default()
    }

    pub fn on_receive_message(&mut self, message: Message) -> Delivery {
        let partner = message.counterpart(self.me);
        let own = message.sender_id == self.me;

        if own {
            if let Some(i) = self
                .pending
                .iter()
                .position(|p| p.state == PendingState::Sending && p.partner == partner && p.content == message.content)
            {
                self.pending.remove(i);
            }
        }

        match &mut self.open_chat {
            Some(chat) if chat.partner == partner => {
                if chat.seen.insert(message.id) {
                    chat.transcript.push(message);
                    Delivery::Appended
                } else {
                    Delivery::Duplicate
                }
            }
            _ if own => Delivery::Skipped,
            _ => {
                self.notifications.push(Notification {
                    from: partner,
                    message_id: message.id,
                    preview: message.content.chars().take(PREVIEW_CHARS).collect(),
                });
                Delivery::Notified
            }
        }
    }

    /// Applies any pushed event. Returns `None` for events that are not
    /// about messages.
    pub fn apply(&mut self, event: ServerEvent) -> Option<Delivery> {
        match event {
            ServerEvent::MatchFound(profile) => {
                self.on_match_found(profile);
                None
            }
            ServerEvent::Unmatched(partner) => {
                self.on_unmatched(partner);
                None
            }
            ServerEvent::ReceiveMessage(message) => Some(self.on_receive_message(message)),
            ServerEvent::SendFailed(failure) => {
                if let Some(client_id) = failure.client_id {
                    self.on_send_failed(&client_id);
                }
                None
            }
            ServerEvent::RoomJoined(_) | ServerEvent::Error(_) => None,
        }
    }

    /// Records an outgoing message and returns the id to send as `clientId`.
    pub fn begin_send(&mut self, partner: Uuid, content: impl Into<String>) -> String {
        self.next_client_id += 1;
        let client_id = format!("local-{}", self.next_client_id);
        self.pending.push(PendingMessage {
            client_id: client_id.clone(),
            partner,
            content: content.into(),
            state: PendingState::Sending,
        });
        client_id
    }

    /// Keeps the content around so the user can retry without retyping.
    pub fn on_send_failed(&mut self, client_id: &str) -> bool {
        match self.pending.iter_mut().find(|p| p.client_id == client_id) {
            Some(pending) => {
                pending.state = PendingState::Failed;
                true
            }
            None => false,
        }
    }

    /// Moves a failed message back to sending and returns what to resend.
    pub fn retry(&mut self, client_id: &str) -> Option<(Uuid, String)> {
        let pending = self
            .pending
            .iter_mut()
            .find(|p| p.client_id == client_id && p.state == PendingState::Failed)?;
        pending.state = PendingState::Sending;
        Some((pending.partner, pending.content.clone()))
    }

    pub fn discard(&mut self, client_id: &str) {
        self.pending.retain(|p| p.client_id != client_id);
    }
}
