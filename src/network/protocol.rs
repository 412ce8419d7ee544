// padrelay wire protocol
// JSON text frames exchanged with phone controllers and game displays

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// WebSocket path for phone controller sessions
pub const WS_CONTROLLER_PATH: &str = "/ws/controller";

/// WebSocket path for game display sessions
pub const WS_GAME_PATH: &str = "/ws/game";

pub const AXIS_COUNT: usize = 4;
pub const BUTTON_COUNT: usize = 17;

/// 20 distinct colours for relay players, indexed by `id % 20`
pub const PLAYER_COLORS: [u32; 20] = [
    0x00cccc, // teal
    0xff00ff, // magenta
    0x00ff88, // spring green
    0xff6688, // coral pink
    0x88aaff, // periwinkle
    0xffaa00, // amber
    0xaa44ff, // violet
    0x44ff44, // bright green
    0xff4488, // hot pink
    0x00aaff, // sky blue
    0xffdd44, // gold
    0x44ffcc, // aquamarine
    0xff8844, // tangerine
    0xaa88ff, // lavender
    0x88ff44, // chartreuse
    0xcc4444, // scarlet
    0x44aaff, // cornflower
    0xcc44ff, // orchid
    0xff88cc, // pink
    0x44ffaa, // mint
];

/// Compact identity of a live controller session.
///
/// Unique among connected sessions and reused (lowest free value first)
/// once its session disconnects. Serialized as a JSON number; accepted
/// as either a number or a numeric string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(pub u32);

impl SessionId {
    /// RGB colour assigned to this player
    pub fn color(self) -> (u8, u8, u8) {
        let hex = PLAYER_COLORS[self.0 as usize % PLAYER_COLORS.len()];
        (((hex >> 16) & 0xff) as u8, ((hex >> 8) & 0xff) as u8, (hex & 0xff) as u8)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u32),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(SessionId(n)),
            Repr::Text(s) => s
                .trim()
                .parse()
                .map(SessionId)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Full input state of one controller. Always overwritten as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputFrame {
    /// lx, ly, rx, ry in [-1, 1]
    pub axes: [f64; AXIS_COUNT],
    pub buttons: [bool; BUTTON_COUNT],
}

impl Default for InputFrame {
    fn default() -> Self {
        Self::neutral()
    }
}

impl InputFrame {
    /// Sticks centred, nothing pressed
    pub const fn neutral() -> Self {
        Self {
            axes: [0.0; AXIS_COUNT],
            buttons: [false; BUTTON_COUNT],
        }
    }

    /// Force every axis into [-1, 1]; non-finite values become 0
    pub fn clamped(mut self) -> Self {
        for axis in &mut self.axes {
            *axis = if axis.is_finite() {
                axis.clamp(-1.0, 1.0)
            } else {
                0.0
            };
        }
        self
    }

    /// Decode a frame arriving on the unreliable data channel
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        serde_json::from_slice::<InputFrame>(bytes)
            .ok()
            .map(InputFrame::clamped)
    }
}

/// One consolidated broadcast: every live session's latest frame
pub type AggregatedFrame = BTreeMap<SessionId, InputFrame>;

fn default_answer_type() -> String {
    "answer".to_string()
}

/// Signaling messages a phone sends over its reliable link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SignalMessage {
    #[serde(rename = "rtc-answer")]
    RtcAnswer {
        sdp: String,
        #[serde(rename = "sdpType", default = "default_answer_type")]
        sdp_type: String,
    },

    #[serde(rename = "rtc-candidate")]
    RtcCandidate {
        candidate: String,
        #[serde(default)]
        mid: Option<String>,
    },
}

/// Anything a controller may send. Frames carry no `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControllerInbound {
    Signal(SignalMessage),
    Input(InputFrame),
}

impl ControllerInbound {
    /// Decode a text frame; malformed input yields `None`
    pub fn parse(text: &str) -> Option<Self> {
        match serde_json::from_str::<ControllerInbound>(text).ok()? {
            ControllerInbound::Input(frame) => Some(ControllerInbound::Input(frame.clamped())),
            signal => Some(signal),
        }
    }
}

/// Messages the relay sends to a controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControllerOutbound {
    /// Assigned session id, sent once on connect
    #[serde(rename = "id")]
    Id { id: SessionId },

    /// Currently active game screen
    #[serde(rename = "scene")]
    Scene { scene: String },

    #[serde(rename = "rtc-offer")]
    RtcOffer {
        sdp: String,
        #[serde(rename = "sdpType")]
        sdp_type: String,
    },

    #[serde(rename = "rtc-candidate")]
    RtcCandidate {
        candidate: String,
        mid: Option<String>,
    },

    /// Display-defined state fanned out to every controller
    #[serde(rename = "broadcast_state")]
    BroadcastState {
        #[serde(default)]
        state: Value,
    },

    /// Display-defined message for a single player
    #[serde(rename = "player_message")]
    PlayerMessage {
        #[serde(default)]
        message: Value,
    },
}

impl ControllerOutbound {
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Messages the relay sends to a display (WebSocket or embedded host)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisplayOutbound {
    WsConnected { id: SessionId },
    WsDisconnected { id: SessionId },
    WsState { controllers: AggregatedFrame },
}

impl DisplayOutbound {
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Messages a display sends to the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisplayInbound {
    /// Announce the screen now showing
    Scene { scene: String },

    /// Pass-through fan-out to all controllers
    BroadcastState {
        #[serde(default)]
        state: Value,
    },

    /// Unicast to one controller; dropped if it is gone
    PlayerMessage {
        #[serde(rename = "targetId")]
        target_id: SessionId,
        #[serde(default)]
        message: Value,
    },
}

impl DisplayInbound {
    /// Decode a text frame; malformed or unknown kinds yield `None`
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_frame() -> String {
        json!({
            "axes": [0.5, -0.25, 0.0, 1.0],
            "buttons": [true, false, false, false, false, false, false, true,
                        false, false, false, false, false, false, false, false, false]
        })
        .to_string()
    }

    #[test]
    fn test_untyped_message_is_input_frame() {
        match ControllerInbound::parse(&raw_frame()) {
            Some(ControllerInbound::Input(frame)) => {
                assert_eq!(frame.axes, [0.5, -0.25, 0.0, 1.0]);
                assert!(frame.buttons[0]);
                assert!(frame.buttons[7]);
                assert!(!frame.buttons[16]);
            }
            other => panic!("expected input frame, got {:?}", other),
        }
    }

    #[test]
    fn test_answer_without_sdp_type_defaults() {
        let msg = ControllerInbound::parse(r#"{"type":"rtc-answer","sdp":"v=0"}"#);
        assert_eq!(
            msg,
            Some(ControllerInbound::Signal(SignalMessage::RtcAnswer {
                sdp: "v=0".to_string(),
                sdp_type: "answer".to_string(),
            }))
        );
    }

    #[test]
    fn test_candidate_with_mid() {
        let msg = ControllerInbound::parse(
            r#"{"type":"rtc-candidate","candidate":"candidate:1 1 udp 1 10.0.0.2 5000 typ host","mid":"0"}"#,
        );
        match msg {
            Some(ControllerInbound::Signal(SignalMessage::RtcCandidate { mid, .. })) => {
                assert_eq!(mid.as_deref(), Some("0"));
            }
            other => panic!("expected candidate, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_controller_messages_are_rejected() {
        assert!(ControllerInbound::parse("not json").is_none());
        assert!(ControllerInbound::parse(r#"{"axes":[0,0,0,0]}"#).is_none());
        assert!(ControllerInbound::parse(r#"{"axes":[0,0,0],"buttons":[]}"#).is_none());
        assert!(ControllerInbound::parse(r#"{"type":"rtc-answer"}"#).is_none());
    }

    #[test]
    fn test_axes_are_clamped() {
        let text = json!({ "axes": [3.0, -7.5, 0.2, -1.0], "buttons": vec![false; 17] }).to_string();
        let Some(ControllerInbound::Input(frame)) = ControllerInbound::parse(&text) else {
            panic!("frame should parse");
        };
        assert_eq!(frame.axes, [1.0, -1.0, 0.2, -1.0]);
    }

    #[test]
    fn test_axis_values_pass_through_unchanged() {
        let text = r#"{"axes":[0.3333333333333333,-0.123456789,0.1,0.7071067811865476],"buttons":[false,false,false,false,false,false,false,false,false,false,false,false,false,false,false,false,false]}"#;
        let Some(ControllerInbound::Input(frame)) = ControllerInbound::parse(text) else {
            panic!("frame should parse");
        };
        assert_eq!(frame.axes, [0.3333333333333333, -0.123456789, 0.1, 0.7071067811865476]);

        let echoed = serde_json::to_value(frame).unwrap();
        assert_eq!(
            echoed["axes"],
            json!([0.3333333333333333, -0.123456789, 0.1, 0.7071067811865476])
        );
    }

    #[test]
    fn test_target_id_accepts_string_or_number() {
        let numeric = DisplayInbound::parse(r#"{"type":"player_message","targetId":2,"message":"out"}"#);
        let text = DisplayInbound::parse(r#"{"type":"player_message","targetId":"2","message":"out"}"#);
        let expected = Some(DisplayInbound::PlayerMessage {
            target_id: SessionId(2),
            message: json!("out"),
        });
        assert_eq!(numeric, expected);
        assert_eq!(text, expected);
    }

    #[test]
    fn test_unknown_display_kind_is_rejected() {
        assert!(DisplayInbound::parse(r#"{"type":"reboot"}"#).is_none());
        assert!(DisplayInbound::parse(r#"{"scene":"MenuScene"}"#).is_none());
    }

    #[test]
    fn test_ws_state_keys_are_stringified_ids() {
        let mut controllers = AggregatedFrame::new();
        controllers.insert(SessionId(0), InputFrame::neutral());
        controllers.insert(SessionId(3), InputFrame::neutral());
        let text = serde_json::to_string(&DisplayOutbound::WsState { controllers }).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["type"], "ws_state");
        assert!(value["controllers"]["0"]["axes"].is_array());
        assert!(value["controllers"]["3"]["buttons"].is_array());

        // And the display side can read it back with numeric ids
        match DisplayOutbound::parse(&text) {
            Some(DisplayOutbound::WsState { controllers }) => {
                assert!(controllers.contains_key(&SessionId(3)));
            }
            other => panic!("expected ws_state, got {:?}", other),
        }
    }

    #[test]
    fn test_outbound_shapes() {
        let id = serde_json::to_value(ControllerOutbound::Id { id: SessionId(4) }).unwrap();
        assert_eq!(id, json!({ "type": "id", "id": 4 }));

        let offer = serde_json::to_value(ControllerOutbound::RtcOffer {
            sdp: "v=0".into(),
            sdp_type: "offer".into(),
        })
        .unwrap();
        assert_eq!(offer, json!({ "type": "rtc-offer", "sdp": "v=0", "sdpType": "offer" }));

        let gone = serde_json::to_value(DisplayOutbound::WsDisconnected { id: SessionId(2) }).unwrap();
        assert_eq!(gone, json!({ "type": "ws_disconnected", "id": 2 }));
    }

    #[test]
    fn test_player_color_wraps() {
        assert_eq!(SessionId(0).color(), (0x00, 0xcc, 0xcc));
        assert_eq!(SessionId(20).color(), SessionId(0).color());
    }
}
