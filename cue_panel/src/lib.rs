//! Live cue panel for a StageCue controller.
//!
//! [`CuePanel`] owns one connection to the controller, mirrors pushed cue
//! state into a [`CueBoard`], and turns user input into trigger, release and
//! rename actions.

pub mod app_state;
pub mod board;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod gesture;
pub mod ws_actor;

pub use board::{CueBoard, CueCard, LinkStatus};
pub use config::PanelConfig;
pub use error::PanelError;
pub use gesture::{Gesture, Key, RawInput};
pub use ws_actor::{Connection, Connector, WsConnector};

use crate::app_state::{AppState, UiCommand};
use crate::ws_actor::ActorConfig;
use cue_protocol::{ClientAction, CueIndex};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

/// Input the UI layer feeds into the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    Input(RawInput),
    Edit { cue: CueIndex, text: String },
    Focus { cue: CueIndex },
    Blur { cue: CueIndex },
    Change { cue: CueIndex },
}

pub struct CuePanel {
    state: Arc<AppState>,
    task: Option<JoinHandle<()>>,
}

impl CuePanel {
    /// Binds the board from `config.layout` and starts connecting. Must be
    /// called from within a tokio runtime.
    pub fn start<C: Connector>(config: &PanelConfig, connector: C) -> Self {
        let (tx, rx) = mpsc::channel(config::COMMAND_CAP);
        let board = CueBoard::bind(config.layout.iter().map(|(i, l)| (*i, l.as_str())));
        let state = Arc::new(AppState::new(tx, board));

        let actor_state = Arc::clone(&state);
        let actor_config = ActorConfig {
            url: config.socket_url.clone(),
            reconnect_delay: config.reconnect_delay,
        };
        let task = tokio::spawn(async move {
            ws_actor::run(rx, actor_state, connector, actor_config).await;
        });

        Self {
            state,
            task: Some(task),
        }
    }

    /// Drops the current connection, if any, and connects again right away.
    pub fn connect(&self) {
        let _ = self.state.tx.try_send(UiCommand::Connect);
    }

    /// Queues `action` for the open connection. Returns `false` when it was
    /// dropped because the panel is not connected.
    pub fn send(&self, action: ClientAction) -> bool {
        if !self.state.status().is_open() {
            debug!(action = action.name(), "not connected, dropping action");
            return false;
        }
        self.state.tx.try_send(UiCommand::Send(action)).is_ok()
    }

    pub fn handle(&self, event: PanelEvent) {
        let action = match event {
            PanelEvent::Input(input) => {
                let Some(text) = self.state.board().input_text(input.cue()) else {
                    debug!(cue = input.cue(), "input on unbound cue");
                    return;
                };
                let gesture = self.state.gestures().translate(input);
                match gesture {
                    Some(Gesture::Start(cue)) => Some(ClientAction::trigger(cue, text)),
                    Some(Gesture::End(cue)) => Some(ClientAction::release(cue)),
                    None => None,
                }
            }
            PanelEvent::Edit { cue, text } => {
                self.state.update_board(|b| b.edit(cue, &text));
                None
            }
            PanelEvent::Focus { cue } => self.edit_focus(|b| b.focus(cue)),
            PanelEvent::Blur { cue } => self.edit_focus(|b| b.blur(cue)),
            PanelEvent::Change { cue } => self.edit_focus(|b| b.commit(cue)),
        };

        if let Some(action) = action {
            self.send(action);
        }
    }

    fn edit_focus(
        &self,
        f: impl FnOnce(&mut CueBoard) -> Option<ClientAction>,
    ) -> Option<ClientAction> {
        let mut action = None;
        self.state.update_board(|b| {
            action = f(b);
            true
        });
        action
    }

    pub fn status(&self) -> LinkStatus {
        self.state.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<LinkStatus> {
        self.state.subscribe_status()
    }

    /// Ticks whenever anything on the board changes.
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.state.subscribe_revisions()
    }

    pub fn board(&self) -> CueBoard {
        self.state.board().clone()
    }

    pub fn reconnects_scheduled(&self) -> u64 {
        self.state.reconnects_scheduled()
    }

    /// Closes the connection, cancels any pending reconnect and waits for the
    /// connection task to finish.
    pub async fn stop(mut self) {
        let _ = self.state.tx.send(UiCommand::Stop).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for CuePanel {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
