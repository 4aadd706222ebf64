use crate::app_state::{AppState, UiCommand};
use crate::board::LinkStatus;
use crate::error::PanelError;
use async_trait::async_trait;
use cue_protocol::{ClientAction, ServerMessage};
use futures_util::{future, Sink, SinkExt, Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

pub type FrameSink = Pin<Box<dyn Sink<String, Error = PanelError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, PanelError>> + Send>>;

/// One open controller connection, as text frames in both directions.
pub struct Connection {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Opens connections to the controller.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &Url) -> Result<Connection, PanelError>;
}

/// WebSocket connector used outside of tests.
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<Connection, PanelError> {
        let (socket, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
        let (write, read) = socket.split();

        let sink = write
            .sink_map_err(PanelError::from)
            .with(|text: String| future::ready(Ok::<_, PanelError>(Message::Text(text.into()))));
        let stream = read.filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(_)) => Some(Err(PanelError::Closed)),
                Ok(_) => None,
                Err(e) => Some(Err(PanelError::from(e))),
            })
        });

        Ok(Connection {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

pub struct ActorConfig {
    pub url: Url,
    pub reconnect_delay: Duration,
}

enum Outcome {
    Closed,
    Reconnect,
    Stop,
}

pub async fn run<C: Connector>(
    mut rx: mpsc::Receiver<UiCommand>,
    state: Arc<AppState>,
    connector: C,
    config: ActorConfig,
) {
    let mut generation: u64 = 0;

    loop {
        generation += 1;
        state.set_status(LinkStatus::Connecting);
        debug!(generation, url = %config.url, "opening controller connection");

        let outcome = match open(&connector, &config.url, &mut rx).await {
            None => Outcome::Stop,
            Some(Ok(conn)) => {
                info!(generation, url = %config.url, "connected to controller");
                state.set_status(LinkStatus::Connected);
                drive(conn, &mut rx, &state, generation).await
            }
            Some(Err(e)) => {
                warn!(generation, error = %e, "controller connection failed");
                Outcome::Closed
            }
        };

        match outcome {
            Outcome::Stop => break,
            Outcome::Reconnect => continue,
            Outcome::Closed => {}
        }

        state.set_status(LinkStatus::Reconnecting);
        let scheduled = state.note_reconnect_scheduled();
        info!(
            generation,
            delay_ms = config.reconnect_delay.as_millis() as u64,
            scheduled,
            "reconnect scheduled"
        );
        if !wait_reconnect(config.reconnect_delay, &mut rx).await {
            break;
        }
    }

    state.set_status(LinkStatus::Stopped);
    debug!(generation, "connection actor stopped");
}

/// Connects while still serving commands. `None` means stop was requested.
async fn open<C: Connector>(
    connector: &C,
    url: &Url,
    rx: &mut mpsc::Receiver<UiCommand>,
) -> Option<Result<Connection, PanelError>> {
    let mut connecting = connector.connect(url);
    loop {
        tokio::select! {
            res = &mut connecting => return Some(res),
            cmd = rx.recv() => match cmd {
                Some(UiCommand::Connect) => {}
                Some(UiCommand::Send(action)) => drop_action(&action),
                Some(UiCommand::Stop) | None => return None,
            }
        }
    }
}

/// Sleeps out the single pending reconnect timer. `Connect` cuts it short.
async fn wait_reconnect(delay: Duration, rx: &mut mpsc::Receiver<UiCommand>) -> bool {
    let timer = tokio::time::sleep(delay);
    tokio::pin!(timer);
    loop {
        tokio::select! {
            _ = &mut timer => return true,
            cmd = rx.recv() => match cmd {
                Some(UiCommand::Connect) => {
                    debug!("reconnect timer cancelled by connect");
                    return true;
                }
                Some(UiCommand::Send(action)) => drop_action(&action),
                Some(UiCommand::Stop) | None => return false,
            }
        }
    }
}

async fn drive(
    conn: Connection,
    rx: &mut mpsc::Receiver<UiCommand>,
    state: &AppState,
    generation: u64,
) -> Outcome {
    let Connection {
        mut sink,
        mut stream,
    } = conn;

    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(UiCommand::Send(action)) => {
                    if let Err(e) = send_action(&mut sink, &action).await {
                        warn!(generation, error = %e, action = action.name(), "send failed");
                        return Outcome::Closed;
                    }
                }
                Some(UiCommand::Connect) => {
                    let _ = sink.close().await;
                    return Outcome::Reconnect;
                }
                Some(UiCommand::Stop) | None => {
                    let _ = sink.close().await;
                    return Outcome::Stop;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(text)) => on_message(state, &text),
                Some(Err(e)) => {
                    info!(generation, error = %e, "controller connection closed");
                    return Outcome::Closed;
                }
                None => {
                    info!(generation, "controller connection ended");
                    return Outcome::Closed;
                }
            }
        }
    }
}

async fn send_action(sink: &mut FrameSink, action: &ClientAction) -> Result<(), PanelError> {
    let payload = serde_json::to_string(action)?;
    debug!(%payload, "sending action");
    sink.send(payload).await
}

fn drop_action(action: &ClientAction) {
    debug!(action = action.name(), cue = ?action.cue(), "not connected, dropping action");
}

/// Decodes one controller frame and applies it to the board.
pub fn on_message(state: &AppState, raw: &str) {
    let msg: ServerMessage = match serde_json::from_str(raw) {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, payload = raw, "invalid controller message");
            return;
        }
    };

    match &msg {
        ServerMessage::Ack { ok: false, .. } => {
            warn!(payload = raw, "controller rejected action");
        }
        ServerMessage::Ack { .. } => {}
        ServerMessage::Unknown => {
            debug!(payload = raw, "unknown controller message");
        }
        ServerMessage::Init { .. } | ServerMessage::Cue(_) | ServerMessage::Snapshot { .. } => {
            state.update_board(|board| board.apply_message(&msg));
        }
    }
}
