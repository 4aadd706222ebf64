use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

pub type CueIndex = u32;

/// State of one cue as pushed by the controller.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CueState {
    pub index: CueIndex,
    /// `None` when the push carries no text; the shown label is left alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub active: bool,
    #[serde(
        default,
        rename = "updatedAt",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<u64>,
}

impl CueState {
    pub fn new(index: CueIndex, text: impl Into<String>, active: bool) -> Self {
        Self {
            index,
            text: Some(text.into()),
            active,
            updated_at: None,
        }
    }
}

fn null_as_false<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(d)?.unwrap_or(false))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CueEntry {
    Valid(CueState),
    Invalid(IgnoredAny),
}

/// Decodes a cue list entry by entry; entries that do not parse are skipped.
fn skip_invalid_cues<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<CueState>, D::Error> {
    let entries = Vec::<CueEntry>::deserialize(d)?;
    Ok(entries
        .into_iter()
        .filter_map(|entry| match entry {
            CueEntry::Valid(state) => Some(state),
            CueEntry::Invalid(_) => None,
        })
        .collect())
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct WifiInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ServerMessage {
    Init {
        #[serde(default, deserialize_with = "skip_invalid_cues")]
        cues: Vec<CueState>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        wifi: Option<WifiInfo>,
    },
    Cue(CueState),
    Snapshot {
        #[serde(default, deserialize_with = "skip_invalid_cues")]
        cues: Vec<CueState>,
    },
    Ack {
        #[serde(default)]
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// Any tag this build does not know about.
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    pub fn ack(action: &str, ok: bool, detail: Option<&str>) -> Self {
        ServerMessage::Ack {
            ok,
            action: Some(action.to_string()),
            detail: detail.map(str::to_string),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ClientAction {
    Trigger {
        #[serde(default)]
        cue: CueIndex,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    Release {
        #[serde(default)]
        cue: CueIndex,
    },
    Rename {
        #[serde(default)]
        cue: CueIndex,
        #[serde(default)]
        text: String,
    },
    Ping,
}

impl ClientAction {
    pub fn trigger(cue: CueIndex, text: impl Into<String>) -> Self {
        ClientAction::Trigger {
            cue,
            text: Some(text.into()),
        }
    }

    pub fn release(cue: CueIndex) -> Self {
        ClientAction::Release { cue }
    }

    pub fn rename(cue: CueIndex, text: impl Into<String>) -> Self {
        ClientAction::Rename {
            cue,
            text: text.into(),
        }
    }

    /// Wire name of the action, as echoed back in `ack.action`.
    pub fn name(&self) -> &'static str {
        match self {
            ClientAction::Trigger { .. } => "trigger",
            ClientAction::Release { .. } => "release",
            ClientAction::Rename { .. } => "rename",
            ClientAction::Ping => "ping",
        }
    }

    pub fn cue(&self) -> Option<CueIndex> {
        match self {
            ClientAction::Trigger { cue, .. }
            | ClientAction::Release { cue }
            | ClientAction::Rename { cue, .. } => Some(*cue),
            ClientAction::Ping => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_serializes_with_cue_and_text() {
        let json = serde_json::to_value(ClientAction::trigger(1, "Intro")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "trigger", "cue": 1, "text": "Intro"})
        );

        let json = serde_json::to_value(ClientAction::release(2)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "release", "cue": 2}));
    }

    #[test]
    fn init_parses_cues_and_wifi() {
        let raw = r#"{"type":"init","cues":[{"index":0,"text":"Go","active":true}],
            "wifi":{"mode":"ap","ip":"192.168.4.1"}}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ServerMessage::Init { cues, wifi } => {
                assert_eq!(cues, vec![CueState::new(0, "Go", true)]);
                let wifi = wifi.unwrap();
                assert_eq!(wifi.mode.as_deref(), Some("ap"));
                assert_eq!(wifi.ip.as_deref(), Some("192.168.4.1"));
            }
            other => panic!("expected init, got {other:?}"),
        }
    }

    #[test]
    fn bad_cue_entries_do_not_sink_the_list() {
        let raw = r#"{"type":"init","cues":[
            {"index":0,"text":"Go","active":true},
            {"index":-1,"text":"Ghost","active":true},
            {"index":1,"text":"House","active":null},
            "junk"],
            "wifi":{"mode":"ap","ip":"192.168.4.1"}}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ServerMessage::Init { cues, wifi } => {
                assert_eq!(
                    cues,
                    vec![CueState::new(0, "Go", true), CueState::new(1, "House", false)]
                );
                assert!(wifi.is_some());
            }
            other => panic!("expected init, got {other:?}"),
        }

        let msg: ServerMessage =
            serde_json::from_str(r#"{"type":"snapshot","cues":[{"index":"x"},{"index":2}]}"#)
                .unwrap();
        assert_eq!(
            msg,
            ServerMessage::Snapshot {
                cues: vec![CueState {
                    index: 2,
                    text: None,
                    active: false,
                    updated_at: None,
                }]
            }
        );
    }

    #[test]
    fn cue_without_text_keeps_text_absent() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"type":"cue","index":3,"active":false}"#).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Cue(CueState {
                index: 3,
                text: None,
                active: false,
                updated_at: None,
            })
        );
    }

    #[test]
    fn unknown_tag_maps_to_unknown() {
        let msg: ServerMessage = serde_json::from_str(r#"{"type":"pong","x":1}"#).unwrap();
        assert_eq!(msg, ServerMessage::Unknown);
    }

    #[test]
    fn ack_without_ok_reads_as_failure() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"type":"ack","action":"rename"}"#).unwrap();
        assert!(matches!(msg, ServerMessage::Ack { ok: false, .. }));
    }
}
