//! Per-connection state shared by the request and notification handlers.

use tracing::warn;
use url::Url;
use warden_core::{DocumentStore, Settings};

use crate::connection::HostHandle;
use crate::diagnostics::scan_document;
use crate::protocol::{ClientCapabilities, publish_diagnostics_params};
use crate::settings::SettingsResolver;

/// What the host told us it can do during `initialize`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapabilityFlags {
    pub configuration: bool,
    pub workspace_folders: bool,
    pub diagnostic_related_info: bool,
}

impl CapabilityFlags {
    pub fn from_client(capabilities: &ClientCapabilities) -> Self {
        Self {
            configuration: capabilities.workspace.configuration,
            workspace_folders: capabilities.workspace.workspace_folders,
            diagnostic_related_info: capabilities
                .text_document
                .publish_diagnostics
                .related_information,
        }
    }
}

pub struct Session {
    pub host: HostHandle,
    pub flags: CapabilityFlags,
    pub store: DocumentStore,
    pub settings: SettingsResolver,
}

impl Session {
    pub fn new(host: HostHandle) -> Self {
        let settings = SettingsResolver::new(host.clone());
        Self {
            host,
            flags: CapabilityFlags::default(),
            store: DocumentStore::new(),
            settings,
        }
    }

    /// Settings that apply to one document, honoring the host's
    /// configuration capability.
    pub async fn effective_settings(&mut self, uri: &Url) -> Settings {
        self.settings.resolve(uri, self.flags.configuration).await
    }

    /// Rescans one open document and pushes the findings to the host.
    pub async fn publish_diagnostics(&mut self, uri: &Url) {
        let settings = self.effective_settings(uri).await;
        let Some(doc) = self.store.get(uri) else {
            return;
        };
        let items = scan_document(
            doc,
            uri.as_str(),
            settings,
            self.flags.diagnostic_related_info,
        );
        let params = publish_diagnostics_params(uri.as_str(), Some(doc.version()), &items);
        if let Err(error) = self
            .host
            .notify("textDocument/publishDiagnostics", Some(params))
            .await
        {
            warn!(%error, "failed to publish diagnostics");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CapabilityFlags, Session};
    use crate::connection::HostHandle;
    use crate::protocol::{ClientCapabilities, WorkspaceCapabilities};
    use serde_json::json;
    use tokio::sync::mpsc;
    use url::Url;

    #[test]
    fn test_flags_read_client_capabilities() {
        let capabilities = ClientCapabilities {
            workspace: WorkspaceCapabilities {
                configuration: true,
                workspace_folders: false,
            },
            text_document: serde_json::from_value(
                json!({"publishDiagnostics": {"relatedInformation": true}}),
            )
            .unwrap(),
        };
        let flags = CapabilityFlags::from_client(&capabilities);
        assert!(flags.configuration);
        assert!(!flags.workspace_folders);
        assert!(flags.diagnostic_related_info);
    }

    #[tokio::test]
    async fn test_unknown_document_publishes_nothing() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut session = Session::new(HostHandle::new(tx));

        let uri = Url::parse("file:///ghost.wdn").unwrap();
        session.publish_diagnostics(&uri).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_carries_version_and_findings() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut session = Session::new(HostHandle::new(tx));

        let uri = Url::parse("file:///a.wdn").unwrap();
        session.store.open(uri.clone(), "FOO".to_owned(), 4).unwrap();
        session.publish_diagnostics(&uri).await;

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame["method"], json!("textDocument/publishDiagnostics"));
        assert_eq!(frame["params"]["uri"], json!("file:///a.wdn"));
        assert_eq!(frame["params"]["version"], json!(4));
        assert_eq!(
            frame["params"]["diagnostics"][0]["message"],
            json!("FOO is all uppercase.")
        );
    }
}
