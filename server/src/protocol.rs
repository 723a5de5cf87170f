//! Wire-level message types for the JSON-RPC 2.0 dialect the server speaks.
//!
//! Incoming params deserialize into narrow structs that read only the fields
//! the handlers use; outgoing payloads are built with typed structs or
//! `json!` literals, whichever reads better at the call site.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use warden_core::{Position, Range, Suggestion, TextChange};

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const SERVER_NOT_INITIALIZED: i64 = -32002;

/// One decoded message from the host, classified by shape.
#[derive(Debug)]
pub enum Incoming {
    /// Carries an `id` and a `method`: the host expects a response.
    Request {
        id: Value,
        method: String,
        params: Option<Value>,
    },
    /// Carries a `method` but no `id`: fire and forget.
    Notification {
        method: String,
        params: Option<Value>,
    },
    /// Carries an `id` and a `result` or `error`: answers one of ours.
    Response { id: u64, body: Value },
}

/// Classifies a decoded message by the JSON-RPC shape rules.
///
/// Returns `None` for frames that fit none of the three shapes, including
/// responses whose id is not the numeric kind this server issues.
pub fn parse_incoming(message: &Value) -> Option<Incoming> {
    let method = message.get("method").and_then(Value::as_str);
    let params = message.get("params").cloned();
    match (message.get("id"), method) {
        (Some(id), Some(method)) => Some(Incoming::Request {
            id: id.clone(),
            method: method.to_owned(),
            params,
        }),
        (None, Some(method)) => Some(Incoming::Notification {
            method: method.to_owned(),
            params,
        }),
        (Some(id), None) if message.get("result").is_some() || message.get("error").is_some() => {
            Some(Incoming::Response {
                id: id.as_u64()?,
                body: message.clone(),
            })
        }
        _ => None,
    }
}

/// Builds a success response echoing the request `id`.
pub fn response(id: &Value, result: &Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

/// Builds an error response echoing the request `id`.
pub fn error_response(id: &Value, code: i64, message: &str) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
}

/// A server-to-host request.
#[derive(Debug, Serialize)]
pub struct Request {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

impl Request {
    pub fn new(id: u64, method: &'static str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// A server-to-host notification.
#[derive(Debug, Serialize)]
pub struct Notification {
    jsonrpc: &'static str,
    method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

impl Notification {
    pub fn new(method: &'static str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    #[serde(default)]
    pub capabilities: ClientCapabilities,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCapabilities {
    #[serde(default)]
    pub workspace: WorkspaceCapabilities,
    #[serde(default)]
    pub text_document: TextDocumentCapabilities,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceCapabilities {
    #[serde(default)]
    pub configuration: bool,
    #[serde(default)]
    pub workspace_folders: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDocumentCapabilities {
    #[serde(default)]
    pub publish_diagnostics: PublishDiagnosticsCapabilities,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishDiagnosticsCapabilities {
    #[serde(default)]
    pub related_information: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDocumentItem {
    pub uri: String,
    pub version: i32,
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidOpenParams {
    pub text_document: TextDocumentItem,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedTextDocumentId {
    pub uri: String,
    pub version: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidChangeParams {
    pub text_document: VersionedTextDocumentId,
    pub content_changes: Vec<TextChange>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDocumentId {
    pub uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidCloseParams {
    pub text_document: TextDocumentId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionParams {
    pub text_document: TextDocumentId,
    pub position: Position,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDiagnosticParams {
    pub text_document: TextDocumentId,
}

#[derive(Debug, Default, Deserialize)]
pub struct DidChangeConfigurationParams {
    #[serde(default)]
    pub settings: Value,
}

/// A completion entry on the wire. `data` carries the catalog id back in
/// through `completionItem/resolve`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CompletionItem {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

impl CompletionItem {
    pub fn from_suggestion(suggestion: &Suggestion) -> Self {
        Self {
            label: suggestion.label().to_owned(),
            kind: Some(suggestion.kind().to_lsp()),
            data: Some(suggestion.id()),
            detail: None,
            documentation: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub range: Range,
    pub severity: u8,
    pub message: String,
    pub source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_information: Option<Vec<RelatedInformation>>,
}

#[derive(Debug, Serialize)]
pub struct RelatedInformation {
    pub location: Location,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Location {
    pub uri: String,
    pub range: Range,
}

/// The `initialize` result: static capabilities plus server identity.
pub fn initialize_result(include_workspace_folders: bool) -> Value {
    let mut result = json!({
        "capabilities": {
            "textDocumentSync": { "openClose": true, "change": 2 },
            "completionProvider": {
                "resolveProvider": true,
                "triggerCharacters": ["."],
            },
            "diagnosticProvider": {
                "interFileDependencies": false,
                "workspaceDiagnostics": false,
            },
        },
        "serverInfo": { "name": "warden-ls", "version": env!("CARGO_PKG_VERSION") },
    });
    if include_workspace_folders {
        result["capabilities"]["workspace"] = json!({ "workspaceFolders": { "supported": true } });
    }
    result
}

/// Params for a `workspace/configuration` round trip scoped to one document.
pub fn configuration_params(uri: &str) -> Value {
    json!({ "items": [{ "scopeUri": uri, "section": "warden" }] })
}

/// Params for dynamically registering interest in configuration changes.
pub fn registration_params() -> Value {
    json!({
        "registrations": [{
            "id": "workspace/didChangeConfiguration",
            "method": "workspace/didChangeConfiguration",
        }]
    })
}

/// Params for a `textDocument/publishDiagnostics` push. The `version` field
/// is omitted when the document is no longer open.
pub fn publish_diagnostics_params(uri: &str, version: Option<i32>, items: &[Diagnostic]) -> Value {
    let mut params = json!({ "uri": uri, "diagnostics": items });
    if let Some(version) = version {
        params["version"] = json!(version);
    }
    params
}

/// A full document diagnostic report for the pull model.
pub fn full_diagnostic_report(items: &[Diagnostic]) -> Value {
    json!({ "kind": "full", "items": items })
}
