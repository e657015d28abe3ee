//! Transcript and the chat send pipeline.

use crate::api::{ChatReply, ChatRequest, PatientInfo, SharedBackend};
use crate::auth::UserIdentity;
use crate::error::{ClientError, ClientResult, CONNECTIVITY_FAILURE};
use crate::identity::ConversationIdentity;
use chrono::{DateTime, Utc};
use std::cell::Cell;
use std::collections::VecDeque;
use tokio::sync::mpsc;

/// Author of a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Bot,
}

/// One turn in the conversation
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Ordered, bounded message list plus its scroll position.
///
/// `scroll_offset` counts lines up from the newest message; 0 means pinned to the bottom.
/// It never exceeds the overflow recorded by the last render.
#[derive(Debug, Clone)]
pub struct Transcript {
    messages: VecDeque<Message>,
    max_messages: usize,
    scroll_offset: usize,
    max_scroll: Cell<usize>,
}

impl Transcript {
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            max_messages: max_messages.max(1),
            scroll_offset: 0,
            max_scroll: Cell::new(0),
        }
    }

    pub fn push(&mut self, role: Role, text: String) {
        self.messages.push_back(Message {
            role,
            text,
            timestamp: Utc::now(),
        });

        if self.messages.len() > self.max_messages {
            self.messages.pop_front();
        }

        self.scroll_to_bottom();
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.back()
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    /// Called by the view with the wrapped line count and visible height
    pub fn record_viewport(&self, total_lines: usize, height: usize) {
        self.max_scroll.set(total_lines.saturating_sub(height));
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = self
            .scroll_offset
            .saturating_add(lines)
            .min(self.max_scroll.get());
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self
            .scroll_offset
            .min(self.max_scroll.get())
            .saturating_sub(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
    }
}

/// Text being composed, with a cursor measured in chars
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputBuffer {
    content: String,
    cursor: usize,
}

impl InputBuffer {
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Replace the whole buffer
    pub fn set(&mut self, text: String) {
        self.cursor = text.chars().count();
        self.content = text;
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.cursor = 0;
    }

    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.content.insert(at, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        let at = self.byte_index(self.cursor);
        self.content.remove(at);
        true
    }

    pub fn delete(&mut self) -> bool {
        if self.cursor >= self.content.chars().count() {
            return false;
        }
        let at = self.byte_index(self.cursor);
        self.content.remove(at);
        true
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.content.chars().count());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.content.chars().count();
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.content.len())
    }
}

/// Owns the transcript for one conversation identity and runs the single send path.
///
/// Requests run as spawned tasks; their outcomes are appended by
/// [`process_replies`](Self::process_replies) or [`next_reply`](Self::next_reply)
/// in arrival order. Overlapping sends are allowed, so two bot replies may land
/// in a different order than their user messages.
pub struct ConversationController {
    backend: SharedBackend,
    thread: ConversationIdentity,
    user: Option<UserIdentity>,
    transcript: Transcript,
    input: InputBuffer,
    patient: Option<PatientInfo>,
    pending: usize,
    reply_tx: mpsc::UnboundedSender<ClientResult<ChatReply>>,
    reply_rx: mpsc::UnboundedReceiver<ClientResult<ChatReply>>,
}

impl ConversationController {
    pub fn new(
        backend: SharedBackend,
        thread: ConversationIdentity,
        user: Option<UserIdentity>,
        max_messages: usize,
    ) -> Self {
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            thread,
            user,
            transcript: Transcript::new(max_messages),
            input: InputBuffer::default(),
            patient: None,
            pending: 0,
            reply_tx,
            reply_rx,
        }
    }

    pub fn thread(&self) -> &ConversationIdentity {
        &self.thread
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        self.user.as_ref()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    pub fn input(&self) -> &InputBuffer {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputBuffer {
        &mut self.input
    }

    /// Overwrite the input buffer (speech results land here)
    pub fn set_input(&mut self, text: String) {
        self.input.set(text);
    }

    /// Latest patient details reported by the server for this thread
    pub fn patient(&self) -> Option<&PatientInfo> {
        self.patient.as_ref()
    }

    /// Requests sent but not yet answered
    pub fn pending_requests(&self) -> usize {
        self.pending
    }

    /// Send whatever is in the input buffer. Keyboard and speech both end here.
    pub fn submit_input(&mut self) -> bool {
        let text = self.input.content().to_string();
        self.send_message(&text)
    }

    /// Echo `raw` into the transcript and dispatch it.
    ///
    /// Whitespace-only input is ignored: no transcript entry, no request.
    /// Returns whether a request was dispatched.
    pub fn send_message(&mut self, raw: &str) -> bool {
        let text = raw.trim();
        if text.is_empty() {
            return false;
        }

        self.transcript.push(Role::User, text.to_string());
        self.input.clear();

        let request = ChatRequest {
            message: text.to_string(),
            thread_id: self.thread.as_str().to_string(),
            user_id: self.user.as_ref().map(|user| user.id.clone()),
        };
        let token = self.user.as_ref().map(|user| user.token.clone());
        let backend = self.backend.clone();
        let reply_tx = self.reply_tx.clone();

        self.pending += 1;
        tracing::debug!(thread_id = %request.thread_id, pending = self.pending, "sending chat message");

        tokio::spawn(async move {
            let result = backend.chat(&request, token.as_deref()).await;
            let _ = reply_tx.send(result);
        });

        true
    }

    /// Append every reply that has already arrived. Returns how many were applied.
    pub fn process_replies(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(result) = self.reply_rx.try_recv() {
            self.apply_reply(result);
            applied += 1;
        }
        applied
    }

    /// Wait for the next reply and append it. Returns false when nothing is in flight.
    pub async fn next_reply(&mut self) -> bool {
        if self.pending == 0 {
            return false;
        }
        match self.reply_rx.recv().await {
            Some(result) => {
                self.apply_reply(result);
                true
            }
            None => false,
        }
    }

    fn apply_reply(&mut self, result: ClientResult<ChatReply>) {
        self.pending = self.pending.saturating_sub(1);

        let text = match result {
            Ok(reply) => {
                if let Some(patient) = reply.patient {
                    self.patient = Some(patient);
                }
                reply.text
            }
            Err(ClientError::Rejected(message)) => {
                tracing::info!(thread_id = %self.thread, error = %message, "server reported an error");
                format!("Error: {}", message)
            }
            Err(err) => {
                tracing::warn!(thread_id = %self.thread, error = %err, "chat request failed");
                CONNECTIVITY_FAILURE.to_string()
            }
        };

        self.transcript.push(Role::Bot, text);
    }
}
