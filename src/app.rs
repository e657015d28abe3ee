//! Application state: which screen is showing and the state objects behind it.
//!
//! Everything that depends on the signed-in user or the conversation id is
//! owned by [`Screen`] and rebuilt by [`App::reinitialize`], so logout and
//! "new case" cannot leave stale identities reachable.

use crate::api::SharedBackend;
use crate::auth::{inline_error, AuthForm, AuthSessionManager, UserIdentity};
use crate::config::{Config, ThreadStorage};
use crate::conversation::ConversationController;
use crate::error::{ClientError, ClientResult};
use crate::history::HistoryPanel;
use crate::identity::IdentityManager;
use crate::speech::SpeechCapability;
use crate::storage::StorageTiers;
use crate::ui::conversation::{get_help_text, ComposerResult, ConversationComposer, SlashCommand};
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::oneshot;

/// Builds the speech capability for each new conversation screen
pub type SpeechFactory = Box<dyn Fn() -> SpeechCapability + Send>;

const SCROLL_STEP: usize = 5;

/// State behind the conversation screen; exists only while a user is signed in
pub struct ConversationScreen {
    pub conversation: ConversationController,
    pub history: HistoryPanel,
    pub speech: SpeechCapability,
    pub composer: ConversationComposer,
}

pub enum Screen {
    Auth(AuthForm),
    Conversation(Box<ConversationScreen>),
}

pub struct App {
    backend: SharedBackend,
    identity: IdentityManager,
    auth: AuthSessionManager,
    transcript_limit: usize,
    speech_factory: SpeechFactory,
    screen: Screen,
    auth_pending: Option<oneshot::Receiver<ClientResult<UserIdentity>>>,
    notice: Option<String>,
    should_quit: bool,
}

impl App {
    pub fn new(
        config: &Config,
        backend: SharedBackend,
        tiers: StorageTiers,
        speech_factory: SpeechFactory,
    ) -> Self {
        let thread_store = match config.thread_storage {
            ThreadStorage::Tab => tiers.tab.clone(),
            ThreadStorage::Durable => tiers.durable.clone(),
        };

        let mut app = Self {
            identity: IdentityManager::new(thread_store),
            auth: AuthSessionManager::new(backend.clone(), tiers.durable),
            backend,
            transcript_limit: config.ui.transcript_limit,
            speech_factory,
            screen: Screen::Auth(AuthForm::default()),
            auth_pending: None,
            notice: None,
            should_quit: false,
        };
        app.reinitialize();
        app
    }

    /// Rebuild every owned state object from storage.
    ///
    /// A stored user goes straight to the conversation screen without contacting the server.
    /// The previous screen is always replaced; if no conversation id can be obtained the
    /// user lands on a fresh auth form that shows why.
    pub fn reinitialize(&mut self) {
        self.auth_pending = None;
        self.notice = None;

        self.screen = match self.auth.restore() {
            Some(user) => match self.identity.get_or_create() {
                Ok(thread) => {
                    tracing::info!(user_id = %user.id, thread_id = %thread, "opening conversation");
                    let speech = (self.speech_factory)();
                    Screen::Conversation(Box::new(ConversationScreen {
                        composer: ConversationComposer::new(speech.is_available()),
                        conversation: ConversationController::new(
                            self.backend.clone(),
                            thread,
                            Some(user),
                            self.transcript_limit,
                        ),
                        history: HistoryPanel::new(self.backend.clone()),
                        speech,
                    }))
                }
                Err(err) => {
                    tracing::error!(user_id = %user.id, error = %err, "could not open conversation");
                    Screen::Auth(AuthForm {
                        error: Some(format!("Could not start a conversation: {:#}", err)),
                        ..AuthForm::default()
                    })
                }
            },
            None => Screen::Auth(AuthForm::default()),
        };
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut Screen {
        &mut self.screen
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Validate the form and start login/register in the background
    pub fn submit_auth(&mut self) {
        let Screen::Auth(form) = &mut self.screen else {
            return;
        };
        if form.submitting {
            return;
        }

        let credentials = match form.credentials() {
            Ok(credentials) => credentials,
            Err(err) => {
                form.error = Some(inline_error(&err));
                return;
            }
        };

        form.error = None;
        form.submitting = true;
        let action = form.action;
        let auth = self.auth.clone();
        let (tx, rx) = oneshot::channel();
        self.auth_pending = Some(rx);
        tokio::spawn(async move {
            let _ = tx.send(auth.authenticate(action, credentials).await);
        });
    }

    /// Apply background completions. Returns whether anything changed.
    pub fn poll(&mut self) -> bool {
        if let Some(rx) = self.auth_pending.as_mut() {
            match rx.try_recv() {
                Ok(result) => {
                    self.auth_pending = None;
                    self.finish_auth(result);
                    return true;
                }
                Err(oneshot::error::TryRecvError::Empty) => {}
                Err(oneshot::error::TryRecvError::Closed) => {
                    self.auth_pending = None;
                    self.finish_auth(Err(ClientError::transport("auth task dropped")));
                    return true;
                }
            }
        }

        let Screen::Conversation(screen) = &mut self.screen else {
            return false;
        };
        let ConversationScreen {
            conversation,
            history,
            speech,
            ..
        } = &mut **screen;

        let mut changed = conversation.process_replies() > 0;
        changed |= history.poll();
        if let Some(speech) = speech.controller_mut() {
            changed |= speech.poll(conversation);
        }
        changed
    }

    /// Wait for an in-flight login/register and apply it
    pub async fn wait_for_auth(&mut self) {
        if let Some(rx) = self.auth_pending.take() {
            let result = rx.await.unwrap_or_else(|_| {
                Err(ClientError::transport("auth task dropped"))
            });
            self.finish_auth(result);
        }
    }

    fn finish_auth(&mut self, result: ClientResult<UserIdentity>) {
        match result {
            Ok(_) => self.reinitialize(),
            Err(err) => {
                if let Screen::Auth(form) = &mut self.screen {
                    form.submitting = false;
                    form.error = Some(inline_error(&err));
                }
            }
        }
    }

    /// Sign out and return to a fresh auth screen.
    ///
    /// The screen is rebuilt even if the stored record could not be removed.
    pub fn logout(&mut self) -> Result<()> {
        let removed = self.auth.logout();
        self.reinitialize();
        removed
    }

    /// Discard the current conversation id and start a new case.
    ///
    /// The old controller is dropped even when storage fails.
    pub fn new_session(&mut self) -> Result<()> {
        let reset = self.identity.reset();
        self.reinitialize();
        reset
    }

    pub fn run_command(&mut self, command: SlashCommand) -> Result<()> {
        match command {
            SlashCommand::New => self.new_session()?,
            SlashCommand::Logout => self.logout()?,
            SlashCommand::Quit => self.should_quit = true,
            SlashCommand::Help => {
                let speech_available = match &self.screen {
                    Screen::Conversation(screen) => screen.speech.is_available(),
                    Screen::Auth(_) => false,
                };
                self.notice = Some(get_help_text(speech_available));
            }
            SlashCommand::History => {
                if let Screen::Conversation(screen) = &mut self.screen {
                    let ConversationScreen {
                        conversation,
                        history,
                        ..
                    } = &mut **screen;
                    history.toggle(conversation.user());
                }
            }
            SlashCommand::Mic => {
                if let Screen::Conversation(screen) = &mut self.screen {
                    if let Some(speech) = screen.speech.controller_mut() {
                        speech.toggle();
                    }
                }
            }
        }
        Ok(())
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        if self.notice.take().is_some() {
            return;
        }

        let outcome = match &mut self.screen {
            Screen::Auth(form) => Self::auth_key(form, key),
            Screen::Conversation(screen) => Self::conversation_key(screen, key),
        };

        let result = match outcome {
            KeyOutcome::Nothing => Ok(()),
            KeyOutcome::SubmitAuth => {
                self.submit_auth();
                Ok(())
            }
            KeyOutcome::Command(command) => self.run_command(command),
        };
        if let Err(err) = result {
            tracing::error!(error = %err, "command failed");
            self.notice = Some(format!("Something went wrong: {:#}", err));
        }
    }

    fn auth_key(form: &mut AuthForm, key: KeyEvent) -> KeyOutcome {
        match key.code {
            KeyCode::Esc => return KeyOutcome::Command(SlashCommand::Quit),
            KeyCode::Enter => return KeyOutcome::SubmitAuth,
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => form.next_field(),
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => form.toggle_action(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Char(c) if !form.submitting => form.push_char(c),
            _ => {}
        }
        KeyOutcome::Nothing
    }

    fn conversation_key(screen: &mut ConversationScreen, key: KeyEvent) -> KeyOutcome {
        match key.code {
            KeyCode::F(2) => return KeyOutcome::Command(SlashCommand::History),
            KeyCode::F(3) => return KeyOutcome::Command(SlashCommand::Mic),
            KeyCode::PageUp => {
                screen.conversation.transcript_mut().scroll_up(SCROLL_STEP);
                return KeyOutcome::Nothing;
            }
            KeyCode::PageDown => {
                screen.conversation.transcript_mut().scroll_down(SCROLL_STEP);
                return KeyOutcome::Nothing;
            }
            KeyCode::Esc if screen.history.is_open() && !screen.composer.palette_open() => {
                return KeyOutcome::Command(SlashCommand::History);
            }
            _ => {}
        }

        match screen.composer.handle_key(key, screen.conversation.input_mut()) {
            ComposerResult::Submit => {
                screen.conversation.submit_input();
                KeyOutcome::Nothing
            }
            ComposerResult::Command(command) => KeyOutcome::Command(command),
            ComposerResult::None => KeyOutcome::Nothing,
        }
    }
}

enum KeyOutcome {
    Nothing,
    SubmitAuth,
    Command(SlashCommand),
}
