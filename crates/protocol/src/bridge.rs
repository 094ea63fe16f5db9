use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;

/// Property that marks a `postMessage` payload as bridge traffic
pub const BRIDGE_MARKER_KEY: &str = "__bridge";

/// Text budget applied when a request does not supply `maxLength`
pub const DEFAULT_MAX_LENGTH: usize = 160_000;
/// Markup budget applied when a request does not supply `maxHtmlLength`
pub const DEFAULT_MAX_HTML_LENGTH: usize = 400_000;
pub const MAX_TITLE_LENGTH: usize = 400;

/// Content root candidates, most specific first
pub const DEFAULT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role=\"main\"]",
    "#content",
    ".content",
    ".post",
    ".article",
    "#main",
];

/// The `__bridge: true` tag. Only ever decodes from the literal `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "bool", into = "bool")]
pub struct BridgeMarker;

impl TryFrom<bool> for BridgeMarker {
    type Error = ProtocolError;

    fn try_from(value: bool) -> Result<Self, Self::Error> {
        if value {
            Ok(Self)
        } else {
            Err(ProtocolError::MissingMarker)
        }
    }
}

impl From<BridgeMarker> for bool {
    fn from(_: BridgeMarker) -> Self {
        true
    }
}

/// Envelope type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvelopeKind {
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "collect-request")]
    Request,
    #[serde(rename = "collect-response")]
    Response,
}

impl EnvelopeKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Request => "collect-request",
            Self::Response => "collect-response",
        }
    }

    /// Parse a wire `type` tag; unknown tags are `None`
    pub fn from_tag(tag: &str) -> Option<Self> {
        [Self::Ready, Self::Request, Self::Response]
            .into_iter()
            .find(|kind| kind.as_str() == tag)
    }
}

impl std::fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message on the frame bridge.
///
/// `request_id` is generated by the requester and echoed back verbatim on the
/// matching response. It is never interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeEnvelope {
    #[serde(rename = "__bridge")]
    pub marker: BridgeMarker,
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl BridgeEnvelope {
    /// Assemble an envelope from fields already read off the wire
    pub fn new(kind: EnvelopeKind, request_id: Option<String>, payload: Option<Value>) -> Self {
        Self {
            marker: BridgeMarker,
            kind,
            request_id,
            payload,
        }
    }

    /// Readiness announcement sent to the parent frame on install
    pub fn ready(url: &str) -> Self {
        let payload = serde_json::json!({ "url": url });
        Self::new(EnvelopeKind::Ready, None, Some(payload))
    }

    pub fn request(request_id: impl Into<String>, request: &SnapshotRequest) -> crate::Result<Self> {
        let payload = serde_json::to_value(request)?;
        Ok(Self::new(EnvelopeKind::Request, Some(request_id.into()), Some(payload)))
    }

    pub fn response(request_id: impl Into<String>, snapshot: &Snapshot) -> crate::Result<Self> {
        let payload = serde_json::to_value(snapshot)?;
        Ok(Self::new(EnvelopeKind::Response, Some(request_id.into()), Some(payload)))
    }

    pub fn decode(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn encode(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Returns the request id when this envelope is a request the bridge
    /// should answer. Requests without an id are not answerable.
    pub fn answerable_request_id(&self) -> Option<&str> {
        match self.kind {
            EnvelopeKind::Request => self.request_id.as_deref(),
            _ => None,
        }
    }

    /// Decode the request payload. Missing or malformed payloads fall back to
    /// the default request rather than failing.
    pub fn snapshot_request(&self) -> SnapshotRequest {
        self.payload
            .as_ref()
            .and_then(|p| serde_json::from_value(p.clone()).ok())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> Option<Snapshot> {
        match self.kind {
            EnvelopeKind::Response => self
                .payload
                .as_ref()
                .and_then(|p| serde_json::from_value(p.clone()).ok()),
            _ => None,
        }
    }
}

/// Parameters of a `collect-request`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_html_length: Option<f64>,
}

impl SnapshotRequest {
    /// Selectors to try in order. An empty list counts as absent.
    pub fn selectors(&self) -> Vec<&str> {
        match &self.selectors {
            Some(list) if !list.is_empty() => list.iter().map(String::as_str).collect(),
            _ => DEFAULT_SELECTORS.to_vec(),
        }
    }

    pub fn text_budget(&self) -> usize {
        positive_budget(self.max_length).unwrap_or(DEFAULT_MAX_LENGTH)
    }

    pub fn html_budget(&self) -> usize {
        positive_budget(self.max_html_length).unwrap_or(DEFAULT_MAX_HTML_LENGTH)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn positive_budget(value: Option<f64>) -> Option<usize> {
    match value {
        Some(n) if n.is_finite() && n >= 1.0 => Some(n.floor() as usize),
        _ => None,
    }
}

/// Payload of a `collect-response`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub title: String,
    pub content: String,
    pub html: String,
    #[serde(rename = "url")]
    pub source_url: String,
}

/// Payload of a `ready` announcement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyPayload {
    pub url: String,
}
