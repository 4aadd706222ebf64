//! Reference StageCue controller: serves the `/ws` cue protocol over a
//! WebSocket listener and keeps the authoritative cue state.

mod error;
mod main_loop;
mod net;
mod protocol;

pub use crate::error::ControllerError;
pub use crate::main_loop::{default_labels, ControllerConfig, MainLoop, DEFAULT_CUE_COUNT};
pub use crate::net::{parse_action, NetworkThread};
pub use crate::protocol::{
    ClientId, InboundMsg, OutboundMsg, INBOUND_CAP, MAX_MESSAGE_SIZE, OUTBOUND_CAP, SOCKET_PATH,
};

use crossbeam_channel::bounded;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Network thread plus a thread ticking the main loop.
pub struct Controller {
    net: NetworkThread,
    shutdown: Arc<AtomicBool>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Controller {
    pub fn spawn(addr: &str, config: ControllerConfig) -> Result<Self, ControllerError> {
        let (in_tx, in_rx) = bounded(INBOUND_CAP);
        let (out_tx, out_rx) = bounded(OUTBOUND_CAP);

        let net = NetworkThread::spawn_with_addr(addr, in_tx, out_rx)?;
        let mut main_loop = MainLoop::new(in_rx, out_tx, config);

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_for_thread = Arc::clone(&shutdown);
        let ticker = thread::spawn(move || {
            while !shutdown_for_thread.load(Ordering::Relaxed) {
                main_loop.tick();
                thread::sleep(TICK_INTERVAL);
            }
        });

        Ok(Self {
            net,
            shutdown,
            ticker: Mutex::new(Some(ticker)),
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.net.listen_addr()
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Ok(mut h) = self.ticker.lock() {
            if let Some(h) = h.take() {
                let _ = h.join();
            }
        }
        self.net.shutdown();
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shutdown();
    }
}
