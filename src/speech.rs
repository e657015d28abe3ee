//! Optional speech input. Produces text for the conversation's single send path.

use crate::config::SpeechConfig;
use crate::conversation::ConversationController;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};

/// Placeholder shown in the composer while listening
pub const LISTENING_HINT: &str = "Listening... describe the question out loud";

/// Events emitted by a recognizer session
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    /// Recognized utterance, best alternative first
    Result { alternatives: Vec<String> },
    /// Recognition failed; an `End` still follows
    Error(String),
    /// Session finished
    End,
}

/// Host speech-recognition facility
pub trait SpeechRecognizer: Send {
    fn start(&mut self, single_utterance: bool) -> Result<mpsc::UnboundedReceiver<SpeechEvent>>;
    fn stop(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechState {
    Idle,
    Listening,
}

/// Drives one recognizer through idle -> listening -> idle
pub struct SpeechInputController {
    recognizer: Box<dyn SpeechRecognizer>,
    state: SpeechState,
    events: Option<mpsc::UnboundedReceiver<SpeechEvent>>,
    captured: bool,
}

impl SpeechInputController {
    pub fn new(recognizer: Box<dyn SpeechRecognizer>) -> Self {
        Self {
            recognizer,
            state: SpeechState::Idle,
            events: None,
            captured: false,
        }
    }

    pub fn state(&self) -> SpeechState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        self.state == SpeechState::Listening
    }

    /// Composer placeholder override while recording
    pub fn placeholder(&self) -> Option<&'static str> {
        self.is_listening().then_some(LISTENING_HINT)
    }

    /// Start listening, or stop without sending
    pub fn toggle(&mut self) {
        match self.state {
            SpeechState::Idle => match self.recognizer.start(true) {
                Ok(events) => {
                    self.events = Some(events);
                    self.captured = false;
                    self.state = SpeechState::Listening;
                    tracing::debug!("speech capture started");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "speech capture could not start");
                }
            },
            SpeechState::Listening => {
                self.recognizer.stop();
                self.finish();
                tracing::debug!("speech capture stopped by user");
            }
        }
    }

    /// Drain recognizer events. On end of capture, a non-empty captured
    /// transcript is sent through [`ConversationController::submit_input`].
    /// Returns whether anything changed.
    pub fn poll(&mut self, conversation: &mut ConversationController) -> bool {
        let mut changed = false;

        loop {
            let Some(events) = self.events.as_mut() else {
                break;
            };
            let event = match events.try_recv() {
                Ok(event) => event,
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => SpeechEvent::End,
            };
            changed = true;

            match event {
                SpeechEvent::Result { alternatives } => {
                    if let Some(best) = alternatives.into_iter().next() {
                        conversation.set_input(best);
                        self.captured = true;
                    }
                }
                SpeechEvent::Error(message) => {
                    tracing::warn!(error = %message, "speech recognition failed");
                }
                SpeechEvent::End => {
                    let send = self.captured && !conversation.input().content().trim().is_empty();
                    self.finish();
                    if send {
                        conversation.submit_input();
                    }
                }
            }
        }

        changed
    }

    fn finish(&mut self) {
        self.state = SpeechState::Idle;
        self.events = None;
        self.captured = false;
    }
}

/// Speech support as detected on this host
pub enum SpeechCapability {
    Available(SpeechInputController),
    Unavailable,
}

impl SpeechCapability {
    /// Available only when a recognizer program is configured and can be found
    pub fn detect(config: &SpeechConfig) -> Self {
        let Some(command) = config.command.as_deref() else {
            return SpeechCapability::Unavailable;
        };

        match resolve_program(command) {
            Some(program) => {
                tracing::info!(program = %program.display(), "speech input available");
                SpeechCapability::Available(SpeechInputController::new(Box::new(
                    CommandRecognizer::new(program, config.args.clone()),
                )))
            }
            None => {
                tracing::info!(command, "speech recognizer not found; speech input disabled");
                SpeechCapability::Unavailable
            }
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, SpeechCapability::Available(_))
    }

    pub fn controller(&self) -> Option<&SpeechInputController> {
        match self {
            SpeechCapability::Available(controller) => Some(controller),
            SpeechCapability::Unavailable => None,
        }
    }

    pub fn controller_mut(&mut self) -> Option<&mut SpeechInputController> {
        match self {
            SpeechCapability::Available(controller) => Some(controller),
            SpeechCapability::Unavailable => None,
        }
    }
}

fn resolve_program(command: &str) -> Option<PathBuf> {
    let candidate = Path::new(command);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(command))
        .find(|path| path.is_file())
}

/// Runs an external recognizer; every stdout line is one utterance
pub struct CommandRecognizer {
    program: PathBuf,
    args: Vec<String>,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl CommandRecognizer {
    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self {
            program,
            args,
            stop_tx: None,
        }
    }
}

impl SpeechRecognizer for CommandRecognizer {
    fn start(&mut self, single_utterance: bool) -> Result<mpsc::UnboundedReceiver<SpeechEvent>> {
        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", self.program.display()))?;
        let stdout = child
            .stdout
            .take()
            .context("Recognizer stdout was not captured")?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (stop_tx, mut stop_rx) = oneshot::channel();
        self.stop_tx = Some(stop_tx);

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        let _ = child.kill().await;
                        break;
                    }
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            if line.trim().is_empty() {
                                continue;
                            }
                            let _ = tx.send(SpeechEvent::Result { alternatives: vec![line] });
                            if single_utterance {
                                let _ = child.kill().await;
                                break;
                            }
                        }
                        Ok(None) => {
                            match child.wait().await {
                                Ok(status) if !status.success() => {
                                    let _ = tx.send(SpeechEvent::Error(format!("recognizer exited with {}", status)));
                                }
                                Err(err) => {
                                    let _ = tx.send(SpeechEvent::Error(err.to_string()));
                                }
                                _ => {}
                            }
                            break;
                        }
                        Err(err) => {
                            let _ = tx.send(SpeechEvent::Error(err.to_string()));
                            break;
                        }
                    }
                }
            }
            let _ = tx.send(SpeechEvent::End);
        });

        Ok(rx)
    }

    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use crate::identity::ConversationIdentity;
    use crate::identity::IdentityManager;
    use crate::storage::MemoryStore;
    use crate::test_support::{ScriptedBackend, ScriptedRecognizer};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn conversation(backend: &Arc<ScriptedBackend>) -> ConversationController {
        let thread: ConversationIdentity = IdentityManager::new(MemoryStore::shared())
            .get_or_create()
            .unwrap();
        ConversationController::new(backend.clone(), thread, None, 100)
    }

    fn utterance(text: &str) -> SpeechEvent {
        SpeechEvent::Result {
            alternatives: vec![text.to_string(), "alternative".to_string()],
        }
    }

    #[tokio::test]
    async fn completed_capture_sends_exactly_once() {
        let backend = ScriptedBackend::new();
        let mut conversation = conversation(&backend);
        let recognizer = ScriptedRecognizer::new(vec![utterance("my chest hurts"), SpeechEvent::End]);
        let starts = recognizer.starts.clone();
        let mut speech = SpeechInputController::new(Box::new(recognizer));

        speech.toggle();
        assert!(speech.is_listening());
        assert_eq!(speech.placeholder(), Some(LISTENING_HINT));
        assert_eq!(*starts.lock().unwrap(), vec![true]);

        assert!(speech.poll(&mut conversation));
        assert!(!speech.is_listening());
        assert_eq!(speech.placeholder(), None);

        assert!(conversation.next_reply().await);
        assert_eq!(backend.chat_count(), 1);
        assert_eq!(backend.chat_calls.lock().unwrap()[0].0.message, "my chest hurts");
        let first = conversation.transcript().messages().next().unwrap();
        assert_eq!((first.role, first.text.as_str()), (Role::User, "my chest hurts"));

        assert!(!speech.poll(&mut conversation));
        assert_eq!(conversation.pending_requests(), 0);
    }

    #[tokio::test]
    async fn result_overwrites_typed_text() {
        let backend = ScriptedBackend::new();
        let mut conversation = conversation(&backend);
        conversation.set_input("half typed".to_string());
        let mut speech =
            SpeechInputController::new(Box::new(ScriptedRecognizer::new(vec![utterance("fever")])));

        speech.toggle();
        speech.poll(&mut conversation);

        assert_eq!(conversation.input().content(), "fever");
        assert!(speech.is_listening());
        assert_eq!(backend.chat_count(), 0);
    }

    #[tokio::test]
    async fn explicit_stop_does_not_send() {
        let backend = ScriptedBackend::new();
        let mut conversation = conversation(&backend);
        let recognizer = ScriptedRecognizer::new(vec![utterance("dizzy")]);
        let stops = recognizer.stops.clone();
        let late = recognizer.clone();
        let mut speech = SpeechInputController::new(Box::new(recognizer));

        speech.toggle();
        speech.poll(&mut conversation);
        speech.toggle();
        late.emit(SpeechEvent::End);
        speech.poll(&mut conversation);

        assert_eq!(*stops.lock().unwrap(), 1);
        assert!(!speech.is_listening());
        assert_eq!(conversation.input().content(), "dizzy");
        assert!(conversation.transcript().is_empty());
        assert_eq!(backend.chat_count(), 0);
    }

    #[tokio::test]
    async fn end_without_result_sends_nothing() {
        let backend = ScriptedBackend::new();
        let mut conversation = conversation(&backend);
        conversation.set_input("typed but not spoken".to_string());
        let mut speech = SpeechInputController::new(Box::new(ScriptedRecognizer::new(vec![
            SpeechEvent::Error("no-speech".to_string()),
            SpeechEvent::End,
        ])));

        speech.toggle();
        speech.poll(&mut conversation);

        assert!(!speech.is_listening());
        assert!(conversation.transcript().is_empty());
        assert_eq!(backend.chat_count(), 0);
    }

    #[test]
    fn unconfigured_speech_is_unavailable() {
        let capability = SpeechCapability::detect(&SpeechConfig::default());
        assert!(!capability.is_available());
        assert!(capability.controller().is_none());
    }

    #[test]
    fn missing_program_is_unavailable() {
        let config = SpeechConfig {
            command: Some("/nonexistent/wardroom-listen".to_string()),
            args: Vec::new(),
        };
        assert!(!SpeechCapability::detect(&config).is_available());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_recognizer_reads_one_utterance() {
        let mut recognizer = CommandRecognizer::new(
            PathBuf::from("/bin/sh"),
            vec!["-c".to_string(), "echo 'shortness of breath'; echo second".to_string()],
        );

        let mut events = recognizer.start(true).unwrap();
        let mut received = Vec::new();
        while let Some(event) = events.recv().await {
            received.push(event);
        }

        assert_eq!(
            received,
            vec![
                SpeechEvent::Result {
                    alternatives: vec!["shortness of breath".to_string()]
                },
                SpeechEvent::End,
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_recognizer_keeps_utterance_verbatim() {
        let mut recognizer = CommandRecognizer::new(
            PathBuf::from("/bin/sh"),
            vec!["-c".to_string(), "printf '\\n   \\n  fever, chills \\n'".to_string()],
        );

        let mut events = recognizer.start(true).unwrap();
        let first = events.recv().await;

        assert_eq!(
            first,
            Some(SpeechEvent::Result {
                alternatives: vec!["  fever, chills ".to_string()]
            })
        );
    }
}
