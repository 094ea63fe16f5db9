use serde::{Deserialize, Serialize};

/// Commands delivered by the extension host over its runtime channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum HostCommand {
    #[serde(rename = "OPEN_PANEL")]
    OpenPanel,
    #[serde(rename = "INSERT_PROMPT")]
    InsertPrompt(String),
}

impl HostCommand {
    pub fn decode(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::OpenPanel => "OPEN_PANEL",
            Self::InsertPrompt(_) => "INSERT_PROMPT",
        }
    }
}

impl std::fmt::Display for HostCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Acknowledgement handed back to the host when it supplies a reply callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandReply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandReply {
    pub const fn ok() -> Self {
        Self { ok: true, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}
