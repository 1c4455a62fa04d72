//! # Message Envelope
//!
//! The wire shape carried between controller and worker:
//! `{"id": <int>, "$type": <kind>, ...kind-specific fields}`.
//!
//! Ids are assigned by the sender, monotonically increasing per channel.
//! Unsolicited frames (the Ready handshake) carry a negative id.

use serde::Deserialize;
use serde::Serialize;

/// Id used for frames that answer no request.
pub const UNPAIRED_ID: i64 = -1;

fn unpaired_id() -> i64 {
    UNPAIRED_ID
}

/// A correlated frame: integer id plus a tagged payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope<T> {
    #[serde(default = "unpaired_id")]
    pub id: i64,
    #[serde(flatten)]
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn new(id: i64, payload: T) -> Self {
        Self { id, payload }
    }

    pub fn unpaired(payload: T) -> Self {
        Self { id: UNPAIRED_ID, payload }
    }
}

/// A document tracked by the worker's workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub uri: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionContext {
    pub trigger_kind: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_character: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentChange {
    pub model_uri: String,
    pub text: String,
}

/// Request kinds the worker understands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "$type", rename_all_fields = "camelCase")]
pub enum Request {
    Compile {
        inputs: Vec<ModelInfo>,
    },
    GetOutput {
        inputs: Vec<ModelInfo>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<String>,
        output_type: String,
    },
    SetDependency {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
        key: String,
        package_id: String,
        package_folder: String,
    },
    GetDependencyInfo {
        key: String,
    },
    GetSdkInfo {
        version: String,
    },
    ProvideCompletion {
        model_uri: String,
        position: Position,
        context: CompletionContext,
    },
    NotifyWorkspaceChanged {
        models: Vec<ModelInfo>,
    },
    NotifyModelChanged {
        model_uri: String,
    },
    NotifyContentChanged {
        change: ContentChange,
    },
    GetDiagnostics,
}

/// Response kinds the worker produces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "$type", rename_all_fields = "camelCase")]
pub enum Response {
    /// Sent once, unsolicited, when the worker comes up. Its id is ignored.
    Ready,
    Empty,
    Success {
        result: serde_json::Value,
    },
    Failure {
        message: String,
        detail: String,
    },
}
