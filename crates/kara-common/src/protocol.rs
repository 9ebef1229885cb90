//! Wire protocol between the hub and renderer windows.
//!
//! Window → hub frames carry the identity they speak for:
//! `{"id": "...", "token": "...", "body": "<json string>"}`.
//!
//! Hub → window frames only carry the token and a type tag:
//! `{"token": "...", "type": "system" | "application", "body": "<json string>"}`.
//!
//! Bodies are JSON documents encoded a second time as strings. The body of
//! the first window frame on a connection is the registration literal.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of the registration frame a window sends right after connecting.
pub const REGISTRATION_LITERAL: &str = "_WS_REG_";

/// Reserved application channel used to ask a renderer for its location.
pub const GET_URL_CHANNEL: &str = "_getURL";

/// A frame sent by a window. Only `id` is mandatory for the frame to parse;
/// token and body are checked later against the listener record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboundFrame {
    pub id: String,
    pub token: Option<String>,
    pub body: Option<String>,
}

impl InboundFrame {
    /// Parse raw socket text. Returns `None` for malformed JSON or a missing
    /// or non-string `id`. A non-string token or body parses as `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw).ok()?;
        let id = value.get("id")?.as_str()?.to_string();
        let token = value.get("token").and_then(Value::as_str).map(str::to_string);
        let body = value.get("body").and_then(Value::as_str).map(str::to_string);
        Some(Self { id, token, body })
    }

    pub fn registration(id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            token: Some(token.into()),
            body: Some(REGISTRATION_LITERAL.to_string()),
        }
    }

    pub fn application(
        id: impl Into<String>,
        token: impl Into<String>,
        message: &ApplicationMessage,
    ) -> Self {
        Self {
            id: id.into(),
            token: Some(token.into()),
            body: Some(message.encode()),
        }
    }

    pub fn is_registration(&self) -> bool {
        self.body.as_deref() == Some(REGISTRATION_LITERAL)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    System,
    Application,
}

/// A frame sent by the hub to one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub token: String,
    #[serde(rename = "type")]
    pub kind: FrameKind,
    pub body: String,
}

impl OutboundFrame {
    pub fn system(token: impl Into<String>, message: &SystemMessage) -> Self {
        Self {
            token: token.into(),
            kind: FrameKind::System,
            body: message.encode(),
        }
    }

    pub fn application(token: impl Into<String>, message: &ApplicationMessage) -> Self {
        Self {
            token: token.into(),
            kind: FrameKind::Application,
            body: message.encode(),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Control-plane message, hub → window only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMessage {
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl SystemMessage {
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Bidirectional event message. Invoke-style calls put the correlation id
/// in `args[0]` by convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationMessage {
    pub channel: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl ApplicationMessage {
    pub fn new(channel: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            channel: channel.into(),
            args,
        }
    }

    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// The correlation id carried in the first argument, if it is a string.
    pub fn correlation_id(&self) -> Option<&str> {
        self.args.first().and_then(Value::as_str)
    }
}

/// The system methods a renderer understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemCall {
    Navigate { url: String },
    SetTitle { title: String },
    Stop,
    SetHtml { html: String },
    Eval { script: String },
    SetSize { width: u32, height: u32 },
}

impl SystemCall {
    pub fn method(&self) -> &'static str {
        match self {
            Self::Navigate { .. } => "navigate",
            Self::SetTitle { .. } => "setTitle",
            Self::Stop => "stop",
            Self::SetHtml { .. } => "setHTML",
            Self::Eval { .. } => "eval",
            Self::SetSize { .. } => "setSize",
        }
    }

    pub fn to_message(&self) -> SystemMessage {
        let args = match self {
            Self::Navigate { url } => vec![Value::from(url.as_str())],
            Self::SetTitle { title } => vec![Value::from(title.as_str())],
            Self::Stop => Vec::new(),
            Self::SetHtml { html } => vec![Value::from(html.as_str())],
            Self::Eval { script } => vec![Value::from(script.as_str())],
            Self::SetSize { width, height } => vec![Value::from(*width), Value::from(*height)],
        };
        SystemMessage {
            method: self.method().to_string(),
            args,
        }
    }

    /// Decode a system message. Unknown methods and malformed arguments
    /// yield `None`, which receivers treat as a no-op.
    pub fn from_message(message: &SystemMessage) -> Option<Self> {
        let text = |i: usize| message.args.get(i).and_then(Value::as_str).map(str::to_string);
        let number = |i: usize| {
            message
                .args
                .get(i)
                .and_then(Value::as_f64)
                .filter(|n| *n >= 0.0 && *n <= f64::from(u32::MAX))
                .map(|n| n as u32)
        };

        match message.method.as_str() {
            "navigate" => Some(Self::Navigate { url: text(0)? }),
            "setTitle" => Some(Self::SetTitle { title: text(0)? }),
            "stop" => Some(Self::Stop),
            "setHTML" => Some(Self::SetHtml { html: text(0)? }),
            "eval" => Some(Self::Eval { script: text(0)? }),
            "setSize" => Some(Self::SetSize {
                width: number(0)?,
                height: number(1)?,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_registration_frame() {
        let frame = InboundFrame::parse(r#"{"id":"w1","token":"T","body":"_WS_REG_"}"#).unwrap();
        assert_eq!(frame.id, "w1");
        assert_eq!(frame.token.as_deref(), Some("T"));
        assert!(frame.is_registration());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(InboundFrame::parse("{not json").is_none());
        assert!(InboundFrame::parse("").is_none());
    }

    #[test]
    fn rejects_missing_or_non_string_id() {
        assert!(InboundFrame::parse(r#"{"token":"T","body":"_WS_REG_"}"#).is_none());
        assert!(InboundFrame::parse(r#"{"id":7,"token":"T","body":"_WS_REG_"}"#).is_none());
        assert!(InboundFrame::parse(r#"["w1"]"#).is_none());
    }

    #[test]
    fn non_string_body_parses_as_none() {
        let frame = InboundFrame::parse(r#"{"id":"w1","token":"T","body":{"channel":"x"}}"#)
            .unwrap();
        assert!(frame.body.is_none());
        assert!(!frame.is_registration());
    }

    #[test]
    fn registration_encodes_like_renderer_bootstrap() {
        let raw = InboundFrame::registration("w1", "T").to_json();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, json!({"id": "w1", "token": "T", "body": "_WS_REG_"}));
    }

    #[test]
    fn application_frame_body_is_double_encoded() {
        let msg = ApplicationMessage::new("ping", vec![json!("cid-1"), json!(2)]);
        let frame = InboundFrame::application("w1", "T", &msg);
        let body = frame.body.as_deref().unwrap();
        assert_eq!(ApplicationMessage::parse(body).unwrap(), msg);
    }

    #[test]
    fn outbound_frame_uses_type_tag() {
        let frame = OutboundFrame::system("T", &SystemCall::Stop.to_message());
        let value: Value = serde_json::from_str(&frame.to_json()).unwrap();
        assert_eq!(value["type"], "system");
        assert_eq!(value["token"], "T");
        assert_eq!(
            serde_json::from_str::<Value>(value["body"].as_str().unwrap()).unwrap(),
            json!({"method": "stop", "args": []})
        );

        let frame = OutboundFrame::application("T", &ApplicationMessage::new("c", vec![]));
        let parsed = OutboundFrame::parse(&frame.to_json()).unwrap();
        assert_eq!(parsed.kind, FrameKind::Application);
    }

    #[test]
    fn application_message_args_default_to_empty() {
        let msg = ApplicationMessage::parse(r#"{"channel":"hello"}"#).unwrap();
        assert!(msg.args.is_empty());
        assert!(msg.correlation_id().is_none());
    }

    #[test]
    fn correlation_id_is_first_string_arg() {
        let msg = ApplicationMessage::new("m", vec![json!("abc"), json!(1)]);
        assert_eq!(msg.correlation_id(), Some("abc"));
        let msg = ApplicationMessage::new("m", vec![json!(5)]);
        assert_eq!(msg.correlation_id(), None);
    }

    #[test]
    fn system_call_wire_shapes() {
        let msg = SystemCall::SetSize {
            width: 800,
            height: 600,
        }
        .to_message();
        assert_eq!(msg.method, "setSize");
        assert_eq!(msg.args, vec![json!(800), json!(600)]);

        let msg = SystemCall::SetHtml {
            html: "<p>x</p>".into(),
        }
        .to_message();
        assert_eq!(msg.method, "setHTML");
        assert_eq!(msg.args, vec![json!("<p>x</p>")]);
    }

    #[test]
    fn system_call_decodes_known_methods() {
        let msg = SystemMessage {
            method: "navigate".into(),
            args: vec![json!("https://example.com")],
        };
        assert_eq!(
            SystemCall::from_message(&msg),
            Some(SystemCall::Navigate {
                url: "https://example.com".into()
            })
        );

        let msg = SystemMessage {
            method: "setSize".into(),
            args: vec![json!(1024.0), json!(768)],
        };
        assert_eq!(
            SystemCall::from_message(&msg),
            Some(SystemCall::SetSize {
                width: 1024,
                height: 768
            })
        );
    }

    #[test]
    fn system_call_ignores_unknown_and_malformed() {
        let unknown = SystemMessage {
            method: "minimize".into(),
            args: vec![],
        };
        assert!(SystemCall::from_message(&unknown).is_none());

        let missing_arg = SystemMessage {
            method: "setTitle".into(),
            args: vec![],
        };
        assert!(SystemCall::from_message(&missing_arg).is_none());

        let negative = SystemMessage {
            method: "setSize".into(),
            args: vec![json!(-1), json!(10)],
        };
        assert!(SystemCall::from_message(&negative).is_none());
    }
}
