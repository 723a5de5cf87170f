//! Per-document settings resolution over `workspace/configuration`.
//!
//! Each scoped lookup is a host round trip. Concurrent lookups for the
//! same document coalesce onto one shared in-flight future, and answers
//! stay cached until the host signals a configuration change.

use std::collections::HashMap;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde_json::Value;
use tracing::debug;
use url::Url;
use warden_core::Settings;

use crate::connection::HostHandle;
use crate::protocol::configuration_params;

type SharedLookup = Shared<BoxFuture<'static, Settings>>;

pub struct SettingsResolver {
    host: HostHandle,
    global: Settings,
    cache: HashMap<Url, SharedLookup>,
}

impl SettingsResolver {
    pub fn new(host: HostHandle) -> Self {
        Self {
            host,
            global: Settings::default(),
            cache: HashMap::new(),
        }
    }

    /// Settings for one document. Hosts that cannot answer scoped
    /// configuration requests get the global snapshot.
    pub async fn resolve(&mut self, uri: &Url, scoped: bool) -> Settings {
        if !scoped {
            return self.global;
        }
        self.shared_lookup(uri).await
    }

    fn shared_lookup(&mut self, uri: &Url) -> SharedLookup {
        if let Some(lookup) = self.cache.get(uri) {
            return lookup.clone();
        }
        let host = self.host.clone();
        let target = uri.clone();
        let fallback = self.global;
        let lookup = async move {
            match host
                .request(
                    "workspace/configuration",
                    Some(configuration_params(target.as_str())),
                )
                .await
            {
                Ok(body) => parse_configuration(&body, fallback),
                Err(error) => {
                    debug!(%error, uri = %target, "configuration lookup failed");
                    fallback
                }
            }
        }
        .boxed()
        .shared();
        self.cache.insert(uri.clone(), lookup.clone());
        lookup
    }

    /// Forgets the cached settings for one document.
    pub fn invalidate(&mut self, uri: &Url) {
        self.cache.remove(uri);
    }

    /// Forgets every cached lookup; the next resolve per document asks
    /// the host again.
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    pub fn set_global(&mut self, settings: Settings) {
        self.global = settings;
    }

    #[must_use]
    pub fn global(&self) -> Settings {
        self.global
    }
}

/// Pulls the first configuration item out of a `workspace/configuration`
/// response body.
fn parse_configuration(body: &Value, fallback: Settings) -> Settings {
    if let Some(error) = body.get("error") {
        debug!(%error, "host answered configuration with an error");
        return fallback;
    }
    let Some(item) = body.get("result").and_then(|result| result.get(0)) else {
        return fallback;
    };
    if item.is_null() {
        return fallback;
    }
    match serde_json::from_value(item.clone()) {
        Ok(settings) => settings,
        Err(error) => {
            debug!(%error, "malformed configuration item");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SettingsResolver, parse_configuration};
    use crate::connection::HostHandle;
    use serde_json::json;
    use tokio::sync::mpsc;
    use url::Url;
    use warden_core::Settings;

    fn uri(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    // ── Resolution ──

    #[tokio::test]
    async fn test_unscoped_resolution_never_asks_the_host() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut resolver = SettingsResolver::new(HostHandle::new(tx));

        let settings = resolver.resolve(&uri("file:///a.wdn"), false).await;
        assert_eq!(settings.max_number_of_problems, 1000);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_scoped_resolution_is_cached() {
        let (tx, mut rx) = mpsc::channel(8);
        let host = HostHandle::new(tx);
        let mut resolver = SettingsResolver::new(host.clone());
        let target = uri("file:///a.wdn");

        let responder = async {
            let sent = rx.recv().await.unwrap();
            assert_eq!(sent["method"], json!("workspace/configuration"));
            assert_eq!(sent["params"]["items"][0]["scopeUri"], json!("file:///a.wdn"));
            assert_eq!(sent["params"]["items"][0]["section"], json!("warden"));
            let id = sent["id"].as_u64().unwrap();
            host.route_response(id, json!({"id": id, "result": [{"maxNumberOfProblems": 7}]}))
                .await;
            rx
        };
        let (settings, mut rx) = tokio::join!(resolver.resolve(&target, true), responder);
        assert_eq!(settings.max_number_of_problems, 7);

        // Second lookup hits the cache; no further traffic.
        let settings = resolver.resolve(&target, true).await;
        assert_eq!(settings.max_number_of_problems, 7);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_concurrent_lookups_share_one_request() {
        let (tx, mut rx) = mpsc::channel(8);
        let host = HostHandle::new(tx);
        let mut resolver = SettingsResolver::new(host.clone());
        let target = uri("file:///a.wdn");

        let first = resolver.shared_lookup(&target);
        let second = resolver.shared_lookup(&target);
        let responder = async {
            let sent = rx.recv().await.unwrap();
            let id = sent["id"].as_u64().unwrap();
            host.route_response(id, json!({"id": id, "result": [{"maxNumberOfProblems": 3}]}))
                .await;
            rx
        };

        let (a, b, mut rx) = tokio::join!(first, second, responder);
        assert_eq!(a.max_number_of_problems, 3);
        assert_eq!(b.max_number_of_problems, 3);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_invalidation_forces_a_fresh_lookup() {
        let (tx, mut rx) = mpsc::channel(8);
        let host = HostHandle::new(tx);
        let mut resolver = SettingsResolver::new(host.clone());
        let target = uri("file:///a.wdn");

        let responder = async {
            let sent = rx.recv().await.unwrap();
            let id = sent["id"].as_u64().unwrap();
            host.route_response(id, json!({"id": id, "result": [{"maxNumberOfProblems": 5}]}))
                .await;
            rx
        };
        let (settings, mut rx) = tokio::join!(resolver.resolve(&target, true), responder);
        assert_eq!(settings.max_number_of_problems, 5);

        resolver.invalidate_all();

        let responder = async {
            let sent = rx.recv().await.unwrap();
            let id = sent["id"].as_u64().unwrap();
            host.route_response(id, json!({"id": id, "result": [{"maxNumberOfProblems": 9}]}))
                .await;
        };
        let (settings, ()) = tokio::join!(resolver.resolve(&target, true), responder);
        assert_eq!(settings.max_number_of_problems, 9);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_host_failure_falls_back_to_global() {
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let mut resolver = SettingsResolver::new(HostHandle::new(tx));

        let settings = resolver.resolve(&uri("file:///a.wdn"), true).await;
        assert_eq!(settings.max_number_of_problems, 1000);
    }

    #[tokio::test]
    async fn test_set_global_changes_unscoped_results() {
        let (tx, _rx) = mpsc::channel(8);
        let mut resolver = SettingsResolver::new(HostHandle::new(tx));

        resolver.set_global(Settings {
            max_number_of_problems: 2,
        });
        let settings = resolver.resolve(&uri("file:///a.wdn"), false).await;
        assert_eq!(settings.max_number_of_problems, 2);
        assert_eq!(resolver.global().max_number_of_problems, 2);
    }

    // ── Response parsing ──

    #[test]
    fn test_parse_configuration_reads_first_item() {
        let fallback = Settings::default();
        let body = json!({"id": 1, "result": [{"maxNumberOfProblems": 12}]});
        assert_eq!(parse_configuration(&body, fallback).max_number_of_problems, 12);
    }

    #[test]
    fn test_parse_configuration_fallbacks() {
        let fallback = Settings {
            max_number_of_problems: 50,
        };
        let cases = [
            json!({"id": 1, "error": {"code": -32601, "message": "nope"}}),
            json!({"id": 1}),
            json!({"id": 1, "result": []}),
            json!({"id": 1, "result": [null]}),
            json!({"id": 1, "result": [{"maxNumberOfProblems": "many"}]}),
        ];
        for body in cases {
            assert_eq!(parse_configuration(&body, fallback).max_number_of_problems, 50);
        }
    }

    #[test]
    fn test_parse_configuration_defaults_missing_fields() {
        let fallback = Settings {
            max_number_of_problems: 50,
        };
        // An empty item is a real answer; absent fields take their serde
        // defaults rather than the fallback.
        let body = json!({"id": 1, "result": [{}]});
        assert_eq!(parse_configuration(&body, fallback).max_number_of_problems, 1000);
    }
}
