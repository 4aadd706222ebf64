use crate::board::{CueBoard, LinkStatus};
use crate::gesture::GestureAdapter;
use cue_protocol::ClientAction;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};

pub struct AppState {
    pub tx: mpsc::Sender<UiCommand>,
    pub board: Mutex<CueBoard>,
    pub gestures: Mutex<GestureAdapter>,
    status: watch::Sender<LinkStatus>,
    revision: watch::Sender<u64>,
    reconnects: AtomicU64,
}

pub enum UiCommand {
    Connect,
    Stop,
    Send(ClientAction),
}

impl AppState {
    pub fn new(tx: mpsc::Sender<UiCommand>, board: CueBoard) -> Self {
        let (status, _) = watch::channel(board.status());
        let (revision, _) = watch::channel(0);
        Self {
            tx,
            board: Mutex::new(board),
            gestures: Mutex::new(GestureAdapter::new()),
            status,
            revision,
            reconnects: AtomicU64::new(0),
        }
    }

    pub fn board(&self) -> MutexGuard<'_, CueBoard> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn gestures(&self) -> MutexGuard<'_, GestureAdapter> {
        self.gestures.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> LinkStatus {
        *self.status.borrow()
    }

    pub fn set_status(&self, status: LinkStatus) {
        self.board().set_status(status);
        self.status.send_replace(status);
        self.touch();
    }

    /// Runs `f` on the board and publishes a new revision if it reports a change.
    pub fn update_board(&self, f: impl FnOnce(&mut CueBoard) -> bool) -> bool {
        let (changed, status) = {
            let mut board = self.board();
            let changed = f(&mut board);
            (changed, board.status())
        };
        if changed {
            self.status.send_if_modified(|s| {
                let modified = *s != status;
                *s = status;
                modified
            });
            self.touch();
        }
        changed
    }

    pub fn subscribe_status(&self) -> watch::Receiver<LinkStatus> {
        self.status.subscribe()
    }

    pub fn subscribe_revisions(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn note_reconnect_scheduled(&self) -> u64 {
        self.reconnects.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn reconnects_scheduled(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    fn touch(&self) {
        self.revision.send_modify(|r| *r = r.wrapping_add(1));
    }
}
