use cue_protocol::{ClientAction, CueIndex, CueState, ServerMessage, WifiInfo};
use std::collections::BTreeMap;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Connecting,
    Connected,
    /// Connected and the initial snapshot has been applied.
    Ready,
    Reconnecting,
    Stopped,
}

impl LinkStatus {
    pub fn is_open(self) -> bool {
        matches!(self, LinkStatus::Connected | LinkStatus::Ready)
    }

    pub fn line(self) -> &'static str {
        match self {
            LinkStatus::Connecting => "connecting to controller...",
            LinkStatus::Connected | LinkStatus::Ready => "connected to controller",
            LinkStatus::Reconnecting => "disconnected, reconnecting...",
            LinkStatus::Stopped => "stopped",
        }
    }
}

/// UI handles of one cue: its text input and its active marker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CueCard {
    text: String,
    baseline: String,
    active: bool,
    focused: bool,
    /// Text pushed while the input was focused, applied on blur.
    held_text: Option<String>,
}

impl CueCard {
    fn new(label: &str) -> Self {
        Self {
            text: label.to_string(),
            baseline: label.trim().to_string(),
            active: false,
            focused: false,
            held_text: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Last value known to match the controller.
    pub fn baseline(&self) -> &str {
        &self.baseline
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueBoard {
    cards: BTreeMap<CueIndex, CueCard>,
    status: LinkStatus,
    network: Option<String>,
}

impl CueBoard {
    /// Binds the board once from a fixed layout of `(index, initial label)`.
    pub fn bind<I, S>(layout: I) -> Self
    where
        I: IntoIterator<Item = (CueIndex, S)>,
        S: AsRef<str>,
    {
        let cards = layout
            .into_iter()
            .map(|(index, label)| (index, CueCard::new(label.as_ref())))
            .collect();
        Self {
            cards,
            status: LinkStatus::Connecting,
            network: None,
        }
    }

    pub fn card(&self, index: CueIndex) -> Option<&CueCard> {
        self.cards.get(&index)
    }

    pub fn cards(&self) -> impl Iterator<Item = (CueIndex, &CueCard)> {
        self.cards.iter().map(|(i, c)| (*i, c))
    }

    pub fn status(&self) -> LinkStatus {
        self.status
    }

    pub fn set_status(&mut self, status: LinkStatus) {
        self.status = status;
    }

    pub fn status_line(&self) -> &'static str {
        self.status.line()
    }

    pub fn network_line(&self) -> Option<&str> {
        self.network.as_deref()
    }

    /// Applies one pushed cue state. Returns `false` for indices the board does not know.
    pub fn apply_cue_state(&mut self, state: &CueState) -> bool {
        let Some(card) = self.cards.get_mut(&state.index) else {
            return false;
        };

        card.active = state.active;
        if let Some(text) = state.text.as_deref() {
            if card.focused {
                card.held_text = Some(text.to_string());
            } else {
                card.text = text.to_string();
                card.baseline = text.to_string();
                card.held_text = None;
            }
        }
        true
    }

    pub fn apply_cues(&mut self, cues: &[CueState]) {
        for cue in cues {
            self.apply_cue_state(cue);
        }
    }

    pub fn set_network_info(&mut self, wifi: &WifiInfo) {
        let mode = wifi.mode.as_deref().unwrap_or("unknown");
        let ip = wifi.ip.as_deref().unwrap_or("n/a");
        self.network = Some(format!("mode: {mode} - ip: {ip}"));
    }

    /// Applies a decoded controller message. Returns `true` if the board changed.
    pub fn apply_message(&mut self, msg: &ServerMessage) -> bool {
        match msg {
            ServerMessage::Init { cues, wifi } => {
                self.apply_cues(cues);
                if let Some(wifi) = wifi {
                    self.set_network_info(wifi);
                }
                self.status = LinkStatus::Ready;
                true
            }
            ServerMessage::Cue(state) => self.apply_cue_state(state),
            ServerMessage::Snapshot { cues } => {
                self.apply_cues(cues);
                true
            }
            ServerMessage::Ack { .. } | ServerMessage::Unknown => false,
        }
    }

    /// Current trimmed text of a cue's input.
    pub fn input_text(&self, index: CueIndex) -> Option<String> {
        self.cards.get(&index).map(|c| c.text.trim().to_string())
    }

    /// User typing into a cue's input. Nothing is sent until the input is committed.
    pub fn edit(&mut self, index: CueIndex, text: &str) -> bool {
        let Some(card) = self.cards.get_mut(&index) else {
            return false;
        };
        card.text = text.to_string();
        true
    }

    /// Moves input focus to `index`. The previously focused input, if any, loses
    /// focus and is committed.
    pub fn focus(&mut self, index: CueIndex) -> Option<ClientAction> {
        if !self.cards.contains_key(&index) {
            return None;
        }
        let previous = self
            .cards
            .iter()
            .find(|(i, c)| c.focused && **i != index)
            .map(|(i, _)| *i);
        let rename = previous.and_then(|prev| self.blur(prev));
        if let Some(card) = self.cards.get_mut(&index) {
            card.focused = true;
        }
        rename
    }

    /// Leaves a cue's input. An edited input is committed; an untouched one
    /// catches up with text pushed while it had focus.
    pub fn blur(&mut self, index: CueIndex) -> Option<ClientAction> {
        let card = self.cards.get_mut(&index)?;
        card.focused = false;
        let rename = self.commit(index);
        if rename.is_none() {
            if let Some(card) = self.cards.get_mut(&index) {
                if let Some(text) = card.held_text.take() {
                    card.baseline = text.clone();
                    card.text = text;
                }
            }
        }
        rename
    }

    /// Compares the trimmed input with the baseline and yields a rename when it differs.
    pub fn commit(&mut self, index: CueIndex) -> Option<ClientAction> {
        let card = self.cards.get_mut(&index)?;
        let value = card.text.trim();
        if value == card.baseline {
            return None;
        }
        let rename = ClientAction::rename(index, value);
        card.baseline = value.to_string();
        card.held_text = None;
        Some(rename)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "status: {}", self.status_line());
        if let Some(network) = self.network_line() {
            let _ = writeln!(out, "{network}");
        }
        for (index, card) in &self.cards {
            let marker = if card.active { '*' } else { ' ' };
            let cursor = if card.focused { " <" } else { "" };
            let _ = writeln!(out, "[{marker}] {index}: {}{cursor}", card.text);
        }
        out
    }
}
