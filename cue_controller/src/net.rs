use crate::error::ControllerError;
use crate::protocol::{
    ClientAction, ClientId, InboundMsg, OutboundMsg, ServerMessage, MAX_MESSAGE_SIZE,
    SOCKET_PATH,
};
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use std::collections::BTreeMap;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;
use tungstenite::protocol::Message;

const KNOWN_ACTIONS: &[&str] = &["trigger", "release", "rename", "ping"];
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);
const READ_TIMEOUT: Duration = Duration::from_millis(10);

type Handshaken = (tungstenite::WebSocket<TcpStream>, SocketAddr);

struct ActiveClient {
    ws: tungstenite::WebSocket<TcpStream>,
    socket_addr: SocketAddr,
}

pub struct NetworkThread {
    listen_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl NetworkThread {
    pub fn spawn_with_addr(
        addr: &str,
        in_tx: Sender<InboundMsg>,
        out_rx: Receiver<OutboundMsg>,
    ) -> Result<Self, ControllerError> {
        let listener = TcpListener::bind(addr).map_err(|source| ControllerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        listener.set_nonblocking(true)?;
        let listen_addr = listener.local_addr()?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_for_thread = Arc::clone(&shutdown);

        let join_handle =
            thread::spawn(move || run_server(listener, in_tx, out_rx, shutdown_for_thread));
        info!(%listen_addr, "controller listening");

        Ok(Self {
            listen_addr,
            shutdown,
            join_handle: Mutex::new(Some(join_handle)),
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Ok(mut h) = self.join_handle.lock() {
            if let Some(h) = h.take() {
                let _ = h.join();
            }
        }
    }
}

impl Drop for NetworkThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_server(
    listener: TcpListener,
    in_tx: Sender<InboundMsg>,
    out_rx: Receiver<OutboundMsg>,
    shutdown: Arc<AtomicBool>,
) {
    let mut clients: BTreeMap<ClientId, ActiveClient> = BTreeMap::new();
    let mut next_id: ClientId = 1;
    let (ready_tx, ready_rx) = unbounded::<Handshaken>();

    while !shutdown.load(Ordering::Relaxed) {
        loop {
            match listener.accept() {
                Ok((stream, socket_addr)) => {
                    let ready_tx = ready_tx.clone();
                    thread::spawn(move || handshake(stream, socket_addr, ready_tx));
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!(error = %e, "ws accept failed");
                    break;
                }
            }
        }

        while let Ok((mut ws, socket_addr)) = ready_rx.try_recv() {
            let client = next_id;
            next_id += 1;
            info!(client, %socket_addr, "panel connected");

            if in_tx
                .try_send(InboundMsg::ClientConnected {
                    client,
                    socket_addr,
                })
                .is_err()
            {
                let _ = send_server_message(
                    &mut ws,
                    &ServerMessage::ack("connect", false, Some("server busy")),
                );
                let _ = ws.close(None);
                continue;
            }

            clients.insert(client, ActiveClient { ws, socket_addr });
        }

        let mut dropped: Vec<ClientId> = Vec::new();

        // Outbound: drain queued messages.
        loop {
            match out_rx.try_recv() {
                Ok(OutboundMsg::To { client, msg }) => {
                    if let Some(active) = clients.get_mut(&client) {
                        if send_server_message(&mut active.ws, &msg).is_err() {
                            dropped.push(client);
                        }
                    }
                }
                Ok(OutboundMsg::Broadcast { msg }) => {
                    for (id, active) in clients.iter_mut() {
                        if send_server_message(&mut active.ws, &msg).is_err() {
                            dropped.push(*id);
                        }
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return,
            }
        }

        // Inbound: at most one message per client per loop (read timeouts keep it moving).
        for (id, active) in clients.iter_mut() {
            if dropped.contains(id) {
                continue;
            }
            match active.ws.read() {
                Ok(msg) => {
                    if handle_inbound(&in_tx, *id, active, msg).is_err() {
                        dropped.push(*id);
                    }
                }
                Err(tungstenite::Error::Io(e))
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(_) => dropped.push(*id),
            }
        }

        for id in dropped {
            if let Some(mut active) = clients.remove(&id) {
                let _ = active.ws.close(None);
                let _ = active.ws.flush();
                info!(client = id, socket_addr = %active.socket_addr, "panel disconnected");
                let _ = in_tx.try_send(InboundMsg::ClientDisconnected { client: id });
            }
        }

        if clients.is_empty() {
            thread::sleep(Duration::from_millis(10));
        }
    }

    for (_, mut active) in clients {
        let _ = active.ws.close(None);
        let _ = active.ws.flush();
    }
}

/// Upgrades one accepted stream off the server loop, so a slow client cannot
/// stall the panels already connected.
fn handshake(stream: TcpStream, socket_addr: SocketAddr, ready_tx: Sender<Handshaken>) {
    let _ = stream.set_nonblocking(false);
    let _ = stream.set_nodelay(true);
    let _ = stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT));
    let _ = stream.set_write_timeout(Some(Duration::from_millis(200)));

    match tungstenite::accept_hdr(stream, check_path) {
        Ok(ws) => {
            let _ = ws.get_ref().set_read_timeout(Some(READ_TIMEOUT));
            let _ = ready_tx.send((ws, socket_addr));
        }
        Err(e) => warn!(%socket_addr, error = %e, "ws handshake failed"),
    }
}

fn check_path(req: &Request, resp: Response) -> Result<Response, ErrorResponse> {
    if req.uri().path() == SOCKET_PATH {
        return Ok(resp);
    }
    let mut not_found = ErrorResponse::new(Some("Not found".to_string()));
    *not_found.status_mut() = StatusCode::NOT_FOUND;
    Err(not_found)
}

fn handle_inbound(
    in_tx: &Sender<InboundMsg>,
    client: ClientId,
    active: &mut ActiveClient,
    msg: Message,
) -> Result<(), ()> {
    let text = match msg {
        Message::Text(s) => s,
        Message::Binary(_) => {
            reject(active, "unsupported frame");
            return Ok(());
        }
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => return Ok(()),
        Message::Close(_) => return Err(()),
    };

    if text.len() > MAX_MESSAGE_SIZE {
        reject(active, "payload too large");
        return Ok(());
    }

    let action = match parse_action(&text) {
        Ok(a) => a,
        Err(detail) => {
            debug!(client, payload = %text, %detail, "rejecting panel message");
            reject(active, &detail);
            return Ok(());
        }
    };

    if in_tx
        .try_send(InboundMsg::Action {
            client,
            action: action.clone(),
        })
        .is_err()
    {
        let _ = send_server_message(
            &mut active.ws,
            &ServerMessage::ack(action.name(), false, Some("server busy")),
        );
    }

    Ok(())
}

/// Decodes a panel frame, naming what is wrong with it on failure.
pub fn parse_action(text: &str) -> Result<ClientAction, String> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    let Some(kind) = value.get("type").and_then(serde_json::Value::as_str) else {
        return Err("missing type".to_string());
    };
    if !KNOWN_ACTIONS.contains(&kind) {
        return Err("unknown type".to_string());
    }
    serde_json::from_value(value).map_err(|e| e.to_string())
}

fn reject(active: &mut ActiveClient, detail: &str) {
    let _ = send_server_message(&mut active.ws, &ServerMessage::ack("parse", false, Some(detail)));
}

fn send_server_message(
    ws: &mut tungstenite::WebSocket<TcpStream>,
    msg: &ServerMessage,
) -> Result<(), ()> {
    let payload = serde_json::to_string(msg).map_err(|_| ())?;
    ws.send(Message::Text(payload.into())).map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_action_names_the_problem() {
        assert!(!parse_action("{oops").unwrap_err().is_empty());
        assert_eq!(parse_action(r#"{"cue":1}"#).unwrap_err(), "missing type");
        assert_eq!(
            parse_action(r#"{"type":"explode","cue":1}"#).unwrap_err(),
            "unknown type"
        );
        assert_eq!(
            parse_action(r#"{"type":"release","cue":2}"#).unwrap(),
            ClientAction::release(2)
        );
    }

    #[test]
    fn trigger_without_text_is_accepted() {
        assert_eq!(
            parse_action(r#"{"type":"trigger","cue":0}"#).unwrap(),
            ClientAction::Trigger { cue: 0, text: None }
        );
    }
}
