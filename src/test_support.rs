//! Scripted collaborators for unit tests.

use crate::api::{AuthGrant, ChatBackend, ChatReply, ChatRequest, Credentials, HistorySessionSummary};
use crate::error::{ClientError, ClientResult};
use crate::speech::{SpeechEvent, SpeechRecognizer};
use crate::storage::{KeyValueStore, MemoryStore};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Backend answering from queued results and recording every call.
///
/// Chat falls back to echoing `re: <message>` once its queue is drained.
#[derive(Default)]
pub struct ScriptedBackend {
    chat_results: Mutex<VecDeque<ClientResult<ChatReply>>>,
    auth_results: Mutex<VecDeque<ClientResult<AuthGrant>>>,
    session_results: Mutex<VecDeque<ClientResult<Vec<HistorySessionSummary>>>>,
    pub chat_calls: Mutex<Vec<(ChatRequest, Option<String>)>>,
    pub auth_calls: Mutex<Vec<(&'static str, String)>>,
    pub session_calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_chat(&self, result: ClientResult<ChatReply>) {
        self.chat_results.lock().unwrap().push_back(result);
    }

    pub fn push_reply(&self, text: &str) {
        self.push_chat(Ok(ChatReply {
            text: text.to_string(),
            patient: None,
        }));
    }

    pub fn push_auth(&self, result: ClientResult<AuthGrant>) {
        self.auth_results.lock().unwrap().push_back(result);
    }

    pub fn push_sessions(&self, result: ClientResult<Vec<HistorySessionSummary>>) {
        self.session_results.lock().unwrap().push_back(result);
    }

    pub fn chat_count(&self) -> usize {
        self.chat_calls.lock().unwrap().len()
    }

    pub fn auth_count(&self) -> usize {
        self.auth_calls.lock().unwrap().len()
    }

    pub fn session_count(&self) -> usize {
        self.session_calls.lock().unwrap().len()
    }

    fn next_auth(&self) -> ClientResult<AuthGrant> {
        self.auth_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::transport("no scripted auth result")))
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn chat(&self, request: &ChatRequest, token: Option<&str>) -> ClientResult<ChatReply> {
        self.chat_calls
            .lock()
            .unwrap()
            .push((request.clone(), token.map(str::to_string)));
        let scripted = self.chat_results.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(ChatReply {
                text: format!("re: {}", request.message),
                patient: None,
            })
        })
    }

    async fn login(&self, credentials: &Credentials) -> ClientResult<AuthGrant> {
        self.auth_calls
            .lock()
            .unwrap()
            .push(("login", credentials.username.clone()));
        self.next_auth()
    }

    async fn register(&self, credentials: &Credentials) -> ClientResult<AuthGrant> {
        self.auth_calls
            .lock()
            .unwrap()
            .push(("register", credentials.username.clone()));
        self.next_auth()
    }

    async fn sessions(
        &self,
        user_id: &str,
        _token: Option<&str>,
    ) -> ClientResult<Vec<HistorySessionSummary>> {
        self.session_calls.lock().unwrap().push(user_id.to_string());
        self.session_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Recognizer that replays a fixed event script on every start
#[derive(Clone, Default)]
pub struct ScriptedRecognizer {
    script: Vec<SpeechEvent>,
    pub starts: Arc<Mutex<Vec<bool>>>,
    pub stops: Arc<Mutex<usize>>,
    senders: Arc<Mutex<Vec<mpsc::UnboundedSender<SpeechEvent>>>>,
}

impl ScriptedRecognizer {
    pub fn new(script: Vec<SpeechEvent>) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    /// Push an extra event into the most recent session
    pub fn emit(&self, event: SpeechEvent) {
        if let Some(tx) = self.senders.lock().unwrap().last() {
            let _ = tx.send(event);
        }
    }
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn start(&mut self, single_utterance: bool) -> anyhow::Result<mpsc::UnboundedReceiver<SpeechEvent>> {
        self.starts.lock().unwrap().push(single_utterance);
        let (tx, rx) = mpsc::unbounded_channel();
        for event in &self.script {
            let _ = tx.send(event.clone());
        }
        self.senders.lock().unwrap().push(tx);
        Ok(rx)
    }

    fn stop(&mut self) {
        *self.stops.lock().unwrap() += 1;
    }
}

/// Memory store whose writes to one key fail while `failing` is set
pub struct FlakyStore {
    inner: MemoryStore,
    key: &'static str,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn new(key: &'static str) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::new(),
            key,
            failing: AtomicBool::new(false),
        })
    }

    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        if key == self.key && self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("disk full");
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.inner.remove(key)
    }
}

pub fn grant(user_id: &str) -> AuthGrant {
    AuthGrant {
        user_id: user_id.to_string(),
        token: format!("token-{}", user_id),
    }
}
