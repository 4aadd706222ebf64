use crate::error::ControllerError;
use crate::protocol::{
    ClientAction, ClientId, CueIndex, CueState, InboundMsg, OutboundMsg, ServerMessage, WifiInfo,
};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_CUE_COUNT: usize = 3;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Label each cue falls back to when renamed to an empty string.
    pub default_labels: Vec<String>,
    pub wifi: WifiInfo,
    /// Active cues are released after this long, if set.
    pub auto_release: Option<Duration>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            default_labels: default_labels(DEFAULT_CUE_COUNT),
            wifi: WifiInfo {
                mode: Some("ap".to_string()),
                ip: Some("192.168.4.1".to_string()),
            },
            auto_release: None,
        }
    }
}

impl ControllerConfig {
    pub fn with_cue_count(mut self, count: usize) -> Result<Self, ControllerError> {
        if count == 0 || count > u8::MAX as usize {
            return Err(ControllerError::Config(format!(
                "cue count must be within 1..=255, got {count}"
            )));
        }
        self.default_labels = default_labels(count);
        Ok(self)
    }
}

pub fn default_labels(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("Cue {i}")).collect()
}

#[derive(Debug, Clone)]
struct CueSlot {
    text: String,
    active: bool,
    last_change: Option<Instant>,
}

pub struct MainLoop {
    inbound_rx: Receiver<InboundMsg>,
    outbound_tx: Sender<OutboundMsg>,
    config: ControllerConfig,
    cues: Vec<CueSlot>,
    started: Instant,
}

impl MainLoop {
    pub fn new(
        inbound_rx: Receiver<InboundMsg>,
        outbound_tx: Sender<OutboundMsg>,
        config: ControllerConfig,
    ) -> Self {
        let cues = config
            .default_labels
            .iter()
            .map(|label| CueSlot {
                text: label.clone(),
                active: false,
                last_change: None,
            })
            .collect();
        Self {
            inbound_rx,
            outbound_tx,
            config,
            cues,
            started: Instant::now(),
        }
    }

    pub fn cue_count(&self) -> usize {
        self.cues.len()
    }

    pub fn tick(&mut self) {
        loop {
            match self.inbound_rx.try_recv() {
                Ok(InboundMsg::ClientConnected {
                    client,
                    socket_addr,
                }) => {
                    debug!(client, %socket_addr, "sending initial state");
                    self.send_to(client, self.init_message());
                }
                Ok(InboundMsg::ClientDisconnected { client }) => {
                    debug!(client, "panel gone");
                }
                Ok(InboundMsg::Action { client, action }) => self.apply_action(client, action),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        self.auto_release();
    }

    pub fn cue_state(&self, index: CueIndex) -> Option<CueState> {
        let slot = self.cues.get(index as usize)?;
        Some(CueState {
            index,
            text: Some(slot.text.clone()),
            active: slot.active,
            updated_at: slot.last_change.map(|t| self.millis_at(t)),
        })
    }

    pub fn snapshot(&self) -> Vec<CueState> {
        (0..self.cues.len() as CueIndex)
            .filter_map(|i| self.cue_state(i))
            .collect()
    }

    /// Pushes the full cue list to every panel.
    pub fn broadcast_snapshot(&mut self) {
        let cues = self.snapshot();
        self.broadcast(ServerMessage::Snapshot { cues });
    }

    /// Local trigger, as from a hardware button.
    pub fn trigger(&mut self, index: CueIndex) -> bool {
        self.set_active(index, true)
    }

    pub fn release(&mut self, index: CueIndex) -> bool {
        self.set_active(index, false)
    }

    fn init_message(&self) -> ServerMessage {
        let cues = self
            .cues
            .iter()
            .enumerate()
            .map(|(i, slot)| CueState::new(i as CueIndex, slot.text.clone(), slot.active))
            .collect();
        ServerMessage::Init {
            cues,
            wifi: Some(self.config.wifi.clone()),
        }
    }

    fn apply_action(&mut self, client: ClientId, action: ClientAction) {
        let name = action.name();
        if let Some(index) = action.cue() {
            if index as usize >= self.cues.len() {
                warn!(client, action = name, index, "invalid cue index");
                self.send_to(client, ServerMessage::ack(name, false, Some("invalid cue index")));
                return;
            }
        }

        match action {
            ClientAction::Trigger { cue, text } => {
                let renamed = text.map(|t| self.set_text(cue, &t)).unwrap_or(false);
                let changed = self.set_active(cue, true);
                if renamed && !changed {
                    self.publish(cue);
                }
                self.send_to(client, ServerMessage::ack(name, true, None));
            }
            ClientAction::Release { cue } => {
                self.set_active(cue, false);
                self.send_to(client, ServerMessage::ack(name, true, None));
            }
            ClientAction::Rename { cue, text } => {
                self.set_text(cue, &text);
                self.send_to(client, ServerMessage::ack(name, true, None));
                self.publish(cue);
            }
            ClientAction::Ping => self.send_to(client, ServerMessage::ack(name, true, None)),
        }
    }

    /// Sets a cue label; an empty label restores the default. Returns whether it changed.
    fn set_text(&mut self, index: CueIndex, text: &str) -> bool {
        let Some(default) = self.config.default_labels.get(index as usize) else {
            return false;
        };
        let text = if text.is_empty() { default.clone() } else { text.to_string() };
        let Some(slot) = self.cues.get_mut(index as usize) else {
            return false;
        };
        if slot.text == text {
            return false;
        }
        info!(index, %text, "cue renamed");
        slot.text = text;
        true
    }

    /// Flips a cue and publishes it. Unchanged states are not re-published.
    fn set_active(&mut self, index: CueIndex, active: bool) -> bool {
        let Some(slot) = self.cues.get_mut(index as usize) else {
            return false;
        };
        if slot.active == active && slot.last_change.is_some() {
            return false;
        }
        slot.active = active;
        slot.last_change = Some(Instant::now());
        info!(index, active, "cue state changed");
        self.publish(index);
        true
    }

    fn auto_release(&mut self) {
        let Some(after) = self.config.auto_release else {
            return;
        };
        let expired: Vec<CueIndex> = self
            .cues
            .iter()
            .enumerate()
            .filter(|(_, s)| s.active && s.last_change.is_some_and(|t| t.elapsed() >= after))
            .map(|(i, _)| i as CueIndex)
            .collect();
        for index in expired {
            debug!(index, "auto release");
            self.set_active(index, false);
        }
    }

    fn publish(&mut self, index: CueIndex) {
        if let Some(state) = self.cue_state(index) {
            self.broadcast(ServerMessage::Cue(state));
        }
    }

    fn millis_at(&self, t: Instant) -> u64 {
        t.saturating_duration_since(self.started).as_millis() as u64
    }

    fn send_to(&mut self, client: ClientId, msg: ServerMessage) {
        let _ = self.outbound_tx.try_send(OutboundMsg::To { client, msg });
    }

    fn broadcast(&mut self, msg: ServerMessage) {
        // Non-blocking best-effort; a full queue drops the update.
        let _ = self.outbound_tx.try_send(OutboundMsg::Broadcast { msg });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{INBOUND_CAP, OUTBOUND_CAP};
    use crossbeam_channel::bounded;

    struct Rig {
        in_tx: Sender<InboundMsg>,
        out_rx: Receiver<OutboundMsg>,
        main_loop: MainLoop,
    }

    fn rig(config: ControllerConfig) -> Rig {
        let (in_tx, in_rx) = bounded(INBOUND_CAP);
        let (out_tx, out_rx) = bounded(OUTBOUND_CAP);
        Rig {
            in_tx,
            out_rx,
            main_loop: MainLoop::new(in_rx, out_tx, config),
        }
    }

    impl Rig {
        fn act(&mut self, action: ClientAction) -> Vec<OutboundMsg> {
            self.in_tx
                .send(InboundMsg::Action { client: 7, action })
                .unwrap();
            self.main_loop.tick();
            self.out_rx.try_iter().collect()
        }
    }

    fn acks(out: &[OutboundMsg]) -> Vec<(bool, Option<String>)> {
        out.iter()
            .filter_map(|m| match m {
                OutboundMsg::To {
                    msg: ServerMessage::Ack { ok, detail, .. },
                    ..
                } => Some((*ok, detail.clone())),
                _ => None,
            })
            .collect()
    }

    fn broadcast_cues(out: &[OutboundMsg]) -> Vec<CueState> {
        out.iter()
            .filter_map(|m| match m {
                OutboundMsg::Broadcast {
                    msg: ServerMessage::Cue(state),
                } => Some(state.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn connect_gets_init_with_wifi() {
        let mut r = rig(ControllerConfig::default());
        r.in_tx
            .send(InboundMsg::ClientConnected {
                client: 1,
                socket_addr: "127.0.0.1:5000".parse().unwrap(),
            })
            .unwrap();
        r.main_loop.tick();

        let out: Vec<OutboundMsg> = r.out_rx.try_iter().collect();
        match out.as_slice() {
            [OutboundMsg::To {
                client: 1,
                msg: ServerMessage::Init { cues, wifi },
            }] => {
                assert_eq!(cues.len(), 3);
                assert_eq!(cues[0], CueState::new(0, "Cue 1", false));
                assert_eq!(wifi.as_ref().unwrap().mode.as_deref(), Some("ap"));
            }
            _ => panic!("expected a single init"),
        }
    }

    #[test]
    fn trigger_renames_activates_and_acks() {
        let mut r = rig(ControllerConfig::default());
        let out = r.act(ClientAction::trigger(1, "Intro"));

        let cues = broadcast_cues(&out);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text.as_deref(), Some("Intro"));
        assert!(cues[0].active);
        assert!(cues[0].updated_at.is_some());
        assert_eq!(acks(&out), vec![(true, None)]);

        // same trigger again changes nothing and publishes nothing
        let out = r.act(ClientAction::trigger(1, "Intro"));
        assert!(broadcast_cues(&out).is_empty());
        assert_eq!(acks(&out), vec![(true, None)]);
    }

    #[test]
    fn release_publishes_only_on_change() {
        let mut r = rig(ControllerConfig::default());
        r.act(ClientAction::trigger(0, "Go"));
        let out = r.act(ClientAction::release(0));
        assert_eq!(broadcast_cues(&out).len(), 1);
        assert!(!broadcast_cues(&out)[0].active);

        let out = r.act(ClientAction::release(0));
        assert!(broadcast_cues(&out).is_empty());
    }

    #[test]
    fn empty_rename_restores_default_label() {
        let mut r = rig(ControllerConfig::default());
        r.act(ClientAction::rename(2, "Fog"));
        assert_eq!(r.main_loop.cue_state(2).unwrap().text.as_deref(), Some("Fog"));

        let out = r.act(ClientAction::rename(2, ""));
        assert_eq!(broadcast_cues(&out)[0].text.as_deref(), Some("Cue 3"));
    }

    #[test]
    fn trigger_text_follows_rename_rules() {
        let mut r = rig(ControllerConfig::default());
        r.act(ClientAction::trigger(0, "Go"));

        let out = r.act(ClientAction::Trigger { cue: 0, text: None });
        assert!(broadcast_cues(&out).is_empty());
        assert_eq!(r.main_loop.cue_state(0).unwrap().text.as_deref(), Some("Go"));

        let out = r.act(ClientAction::trigger(0, ""));
        let cues = broadcast_cues(&out);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text.as_deref(), Some("Cue 1"));
        assert!(cues[0].active);
    }

    #[test]
    fn invalid_index_is_rejected() {
        let mut r = rig(ControllerConfig::default());
        let out = r.act(ClientAction::release(9));
        assert_eq!(acks(&out), vec![(false, Some("invalid cue index".to_string()))]);
        assert!(broadcast_cues(&out).is_empty());
    }

    #[test]
    fn auto_release_expires_active_cues() {
        let mut r = rig(ControllerConfig {
            auto_release: Some(Duration::ZERO),
            ..ControllerConfig::default()
        });
        let out = r.act(ClientAction::trigger(0, "Go"));
        let cues = broadcast_cues(&out);
        assert_eq!(cues.len(), 2);
        assert!(cues[0].active);
        assert!(!cues[1].active);
    }

    #[test]
    fn snapshot_covers_every_cue() {
        let mut r = rig(ControllerConfig::default().with_cue_count(4).unwrap());
        r.main_loop.trigger(3);
        let _ = r.out_rx.try_iter().count();

        r.main_loop.broadcast_snapshot();
        match r.out_rx.try_recv().unwrap() {
            OutboundMsg::Broadcast {
                msg: ServerMessage::Snapshot { cues },
            } => {
                assert_eq!(cues.len(), 4);
                assert!(cues[3].active);
                assert_eq!(cues[3].text.as_deref(), Some("Cue 4"));
            }
            _ => panic!("expected snapshot broadcast"),
        }
    }

    #[test]
    fn cue_count_is_bounded() {
        assert!(ControllerConfig::default().with_cue_count(0).is_err());
        assert!(ControllerConfig::default().with_cue_count(256).is_err());
    }
}
