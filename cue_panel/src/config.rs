use crate::endpoint;
use crate::error::PanelError;
use cue_protocol::CueIndex;
use std::time::Duration;
use url::Url;

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_CUE_COUNT: u32 = 3;
pub const DEFAULT_PAGE_URL: &str = "http://192.168.4.1/";

/// Capacity of the command queue between the panel and the connection actor.
pub const COMMAND_CAP: usize = 256;

#[derive(Debug, Clone)]
pub struct PanelConfig {
    pub socket_url: Url,
    pub reconnect_delay: Duration,
    /// Fixed cue layout the board is bound from, in display order.
    pub layout: Vec<(CueIndex, String)>,
}

impl PanelConfig {
    pub fn new(socket_url: Url) -> Self {
        Self {
            socket_url,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            layout: default_layout(DEFAULT_CUE_COUNT),
        }
    }

    /// Builds a config for a panel served from `page` (see [`endpoint::socket_url`]).
    pub fn for_page(page: &str) -> Result<Self, PanelError> {
        Ok(Self::new(endpoint::socket_url(page)?))
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Uses `count` cues with the given initial labels; missing labels are empty.
    pub fn with_cues(mut self, count: u32, labels: &[String]) -> Result<Self, PanelError> {
        if count == 0 {
            return Err(PanelError::Layout("at least one cue is required".to_string()));
        }
        if labels.len() > count as usize {
            return Err(PanelError::Layout(format!(
                "{} labels given for {count} cues",
                labels.len()
            )));
        }
        self.layout = (0..count)
            .map(|i| (i, labels.get(i as usize).cloned().unwrap_or_default()))
            .collect();
        Ok(self)
    }
}

fn default_layout(count: u32) -> Vec<(CueIndex, String)> {
    (0..count).map(|i| (i, String::new())).collect()
}
