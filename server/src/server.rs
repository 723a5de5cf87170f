//! Dispatch loop and method handlers for one server session.
//!
//! Dispatch is strictly serialized: requests and notifications are handled
//! one at a time in arrival order, so handlers can hold `&mut Session`
//! without locking. Host round trips awaited inside a handler are fed by
//! the reader task, which routes responses around this queue.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};
use url::Url;
use warden_core::{Settings, classify, resolve_hint};

use crate::connection::{HostHandle, Inbound, spawn_reader, spawn_writer};
use crate::diagnostics::scan_document;
use crate::protocol::{
    self, CompletionItem, CompletionParams, DidChangeConfigurationParams, DidChangeParams,
    DidCloseParams, DidOpenParams, DocumentDiagnosticParams, InitializeParams,
    full_diagnostic_report, initialize_result, publish_diagnostics_params, registration_params,
};
use crate::session::{CapabilityFlags, Session};

/// Lifecycle phase of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Running,
    ShutdownRequested,
}

enum Flow {
    Continue,
    Exit,
}

/// Runs one server session over the given transport until the host sends
/// `exit` or hangs up. Returns the process exit code: zero only when
/// `shutdown` arrived before `exit`.
pub async fn run<R, W>(reader: R, writer: W) -> u8
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (writer_tx, writer_handle) = spawn_writer(writer);
    let host = HostHandle::new(writer_tx);
    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
    let reader_handle = spawn_reader(reader, host.clone(), inbound_tx);

    let mut session = Session::new(host);
    let mut lifecycle = Lifecycle::Uninitialized;

    let code = loop {
        let Some(message) = inbound_rx.recv().await else {
            warn!("transport closed before exit");
            break 1;
        };
        match message {
            Inbound::Request { id, method, params } => {
                handle_request(&mut session, &mut lifecycle, id, &method, params).await;
            }
            Inbound::Notification { method, params } => {
                match handle_notification(&mut session, lifecycle, &method, params).await {
                    Flow::Continue => {}
                    Flow::Exit => break u8::from(lifecycle != Lifecycle::ShutdownRequested),
                }
            }
        }
    };

    // Let queued frames drain, but never hang exit on a stuck pipe.
    reader_handle.abort();
    drop(session);
    let _ = timeout(Duration::from_millis(500), writer_handle).await;
    code
}

async fn handle_request(
    session: &mut Session,
    lifecycle: &mut Lifecycle,
    id: Value,
    method: &str,
    params: Option<Value>,
) {
    match (*lifecycle, method) {
        (Lifecycle::Uninitialized, "initialize") => {
            initialize(session, lifecycle, id, params).await;
        }
        (Lifecycle::Uninitialized, _) => {
            session
                .host
                .respond_error(
                    &id,
                    protocol::SERVER_NOT_INITIALIZED,
                    "server not initialized",
                )
                .await;
        }
        (_, "initialize") => {
            session
                .host
                .respond_error(
                    &id,
                    protocol::INVALID_REQUEST,
                    "server is already initialized",
                )
                .await;
        }
        (Lifecycle::ShutdownRequested, _) => {
            session
                .host
                .respond_error(&id, protocol::INVALID_REQUEST, "server is shutting down")
                .await;
        }
        (_, "shutdown") => {
            *lifecycle = Lifecycle::ShutdownRequested;
            info!("shutdown requested");
            session.host.respond(&id, Value::Null).await;
        }
        (_, "textDocument/completion") => completion(session, id, params).await,
        (_, "completionItem/resolve") => resolve_completion(session, id, params).await,
        (_, "textDocument/diagnostic") => document_diagnostic(session, id, params).await,
        (_, unknown) => {
            debug!(method = unknown, "method not found");
            session
                .host
                .respond_error(&id, protocol::METHOD_NOT_FOUND, "method not found")
                .await;
        }
    }
}

async fn handle_notification(
    session: &mut Session,
    lifecycle: Lifecycle,
    method: &str,
    params: Option<Value>,
) -> Flow {
    if method == "exit" {
        return Flow::Exit;
    }
    if lifecycle != Lifecycle::Running {
        debug!(method, ?lifecycle, "dropping notification outside the running phase");
        return Flow::Continue;
    }
    match method {
        "initialized" => {
            if session.flags.configuration {
                let host = session.host.clone();
                tokio::spawn(async move {
                    match host
                        .request("client/registerCapability", Some(registration_params()))
                        .await
                    {
                        Ok(_) => debug!("registered for configuration changes"),
                        Err(error) => {
                            warn!(%error, "failed to register for configuration changes");
                        }
                    }
                });
            }
        }
        "textDocument/didOpen" => did_open(session, params).await,
        "textDocument/didChange" => did_change(session, params).await,
        "textDocument/didClose" => did_close(session, params).await,
        "workspace/didChangeConfiguration" => did_change_configuration(session, params).await,
        "workspace/didChangeWorkspaceFolders" => info!("workspace folders changed"),
        other => trace!(method = other, "ignoring notification"),
    }
    Flow::Continue
}

async fn initialize(
    session: &mut Session,
    lifecycle: &mut Lifecycle,
    id: Value,
    params: Option<Value>,
) {
    let Ok(params) = parse_params::<InitializeParams>(params) else {
        session
            .host
            .respond_error(&id, protocol::INVALID_PARAMS, "malformed initialize params")
            .await;
        return;
    };
    session.flags = CapabilityFlags::from_client(&params.capabilities);
    *lifecycle = Lifecycle::Running;
    info!(
        configuration = session.flags.configuration,
        workspace_folders = session.flags.workspace_folders,
        related_info = session.flags.diagnostic_related_info,
        "initialized session"
    );
    session
        .host
        .respond(&id, initialize_result(session.flags.workspace_folders))
        .await;
}

async fn completion(session: &mut Session, id: Value, params: Option<Value>) {
    let Ok(params) = parse_params::<CompletionParams>(params) else {
        session
            .host
            .respond_error(&id, protocol::INVALID_PARAMS, "malformed completion params")
            .await;
        return;
    };
    // Unknown documents get an empty list, not the default catalog.
    let items: Vec<CompletionItem> = parse_uri(&params.text_document.uri)
        .and_then(|uri| session.store.get(&uri))
        .map(|doc| {
            classify(doc.line_up_to(params.position))
                .iter()
                .map(CompletionItem::from_suggestion)
                .collect()
        })
        .unwrap_or_default();
    let result = serde_json::to_value(&items).unwrap_or_else(|_| json!([]));
    session.host.respond(&id, result).await;
}

async fn resolve_completion(session: &mut Session, id: Value, params: Option<Value>) {
    let Ok(mut item) = parse_params::<CompletionItem>(params) else {
        session
            .host
            .respond_error(&id, protocol::INVALID_PARAMS, "malformed completion item")
            .await;
        return;
    };
    if let Some(hint) = item.data.and_then(resolve_hint) {
        item.detail = Some(hint.detail.to_owned());
        item.documentation = Some(hint.documentation.to_owned());
    }
    let result = serde_json::to_value(&item).unwrap_or_else(|_| json!(null));
    session.host.respond(&id, result).await;
}

async fn document_diagnostic(session: &mut Session, id: Value, params: Option<Value>) {
    let Ok(params) = parse_params::<DocumentDiagnosticParams>(params) else {
        session
            .host
            .respond_error(&id, protocol::INVALID_PARAMS, "malformed diagnostic params")
            .await;
        return;
    };
    let Some(uri) =
        parse_uri(&params.text_document.uri).filter(|uri| session.store.get(uri).is_some())
    else {
        session.host.respond(&id, full_diagnostic_report(&[])).await;
        return;
    };
    let settings = session.effective_settings(&uri).await;
    let items = match session.store.get(&uri) {
        Some(doc) => scan_document(
            doc,
            uri.as_str(),
            settings,
            session.flags.diagnostic_related_info,
        ),
        None => Vec::new(),
    };
    session.host.respond(&id, full_diagnostic_report(&items)).await;
}

async fn did_open(session: &mut Session, params: Option<Value>) {
    let Ok(params) = parse_params::<DidOpenParams>(params) else {
        warn!("malformed didOpen params");
        return;
    };
    let Some(uri) = parse_uri(&params.text_document.uri) else {
        return;
    };
    // The store refuses duplicate opens; treat a repeat as close-then-open
    // so the host's latest content wins.
    if session.store.close(&uri) {
        warn!(uri = %uri, "didOpen for a document that is already open; reopening");
        session.settings.invalidate(&uri);
    }
    if let Err(error) = session.store.open(
        uri.clone(),
        params.text_document.text,
        params.text_document.version,
    ) {
        warn!(%error, "failed to open document");
        return;
    }
    session.publish_diagnostics(&uri).await;
}

async fn did_change(session: &mut Session, params: Option<Value>) {
    let Ok(params) = parse_params::<DidChangeParams>(params) else {
        warn!("malformed didChange params");
        return;
    };
    let Some(uri) = parse_uri(&params.text_document.uri) else {
        return;
    };
    if let Err(error) =
        session
            .store
            .apply_change(&uri, params.content_changes, params.text_document.version)
    {
        warn!(%error, "failed to apply change");
        return;
    }
    session.publish_diagnostics(&uri).await;
}

async fn did_close(session: &mut Session, params: Option<Value>) {
    let Ok(params) = parse_params::<DidCloseParams>(params) else {
        warn!("malformed didClose params");
        return;
    };
    let Some(uri) = parse_uri(&params.text_document.uri) else {
        return;
    };
    if !session.store.close(&uri) {
        debug!(uri = %uri, "didClose for an unknown document");
    }
    session.settings.invalidate(&uri);

    let params = publish_diagnostics_params(uri.as_str(), None, &[]);
    if let Err(error) = session
        .host
        .notify("textDocument/publishDiagnostics", Some(params))
        .await
    {
        warn!(%error, "failed to clear diagnostics");
    }
}

async fn did_change_configuration(session: &mut Session, params: Option<Value>) {
    if session.flags.configuration {
        // Scoped settings may all have changed; drop the cache and let the
        // next lookup per document ask again.
        session.settings.invalidate_all();
    } else {
        let params: DidChangeConfigurationParams = parse_params(params).unwrap_or_default();
        let global = params
            .settings
            .get("warden")
            .map(|section| match serde_json::from_value(section.clone()) {
                Ok(settings) => settings,
                Err(error) => {
                    warn!(%error, "malformed warden settings; using defaults");
                    Settings::default()
                }
            })
            .unwrap_or_default();
        session.settings.set_global(global);
    }

    // Hosts on the pull model re-request diagnostics when asked to
    // refresh; the pushes below cover the rest.
    let host = session.host.clone();
    tokio::spawn(async move {
        if let Err(error) = host.request("workspace/diagnostic/refresh", None).await {
            debug!(%error, "diagnostic refresh not accepted");
        }
    });

    let uris: Vec<Url> = session.store.uris().cloned().collect();
    for uri in uris {
        session.publish_diagnostics(&uri).await;
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, serde_json::Error> {
    serde_json::from_value(params.unwrap_or_else(|| json!({})))
}

fn parse_uri(raw: &str) -> Option<Url> {
    match Url::parse(raw) {
        Ok(uri) => Some(uri),
        Err(error) => {
            warn!(%error, raw, "unparseable document uri");
            None
        }
    }
}
