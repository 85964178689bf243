// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{MapLoadError, RemoteWriteError, WriteOp};
use crate::registry::models::{MarkerId, QuestRecord};
use crate::store::snapshot::Snapshot;
use crate::store::sse::{RemoteTree, SseDecoder, StreamEvent};
use crate::store::traits::{RemoteStore, Subscription};

const SNAPSHOT_BUFFER: usize = 16;

/// Upper bound for the event stream to answer with headers
const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(15);

/// Realtime Database over its REST and event-stream API
#[derive(Debug, Clone)]
pub struct FirebaseStore {
    client: Client,
    base_url: Url,
    auth_token: Option<String>,
    reconnect_delay: Duration,
    open_timeout: Duration,
}

impl FirebaseStore {
    pub fn new(
        base_url: &str,
        auth_token: Option<String>,
        reconnect_delay: Duration,
    ) -> Result<Self, MapLoadError> {
        let base_url = Url::parse(base_url).map_err(|source| MapLoadError::InvalidStoreUrl {
            url: base_url.to_string(),
            source,
        })?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("questmap/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            auth_token,
            reconnect_delay,
            open_timeout: DEFAULT_OPEN_TIMEOUT,
        })
    }

    pub fn with_open_timeout(mut self, open_timeout: Duration) -> Self {
        self.open_timeout = open_timeout;
        self
    }

    /// `<base>/<path>.json`, with `auth` when a token is configured
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        let raw = format!(
            "{}/{}.json",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_matches('/')
        );
        let mut url = Url::parse(&raw)?;
        if let Some(ref token) = self.auth_token {
            url.query_pairs_mut().append_pair("auth", token);
        }
        Ok(url)
    }

    async fn send_write(
        &self,
        op: WriteOp,
        target: String,
        build: impl FnOnce(&Client, Url) -> RequestBuilder,
    ) -> Result<(), RemoteWriteError> {
        let url = self.endpoint(&target).map_err(|e| RemoteWriteError::Rejected {
            op,
            target: target.clone(),
            reason: e.to_string(),
        })?;

        let response = build(&self.client, url)
            .send()
            .await
            .map_err(|source| RemoteWriteError::Transport {
                op,
                target: target.clone(),
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteWriteError::Status { op, target, status, body });
        }

        debug!(op = %op, target = %target, "Remote write acknowledged");
        Ok(())
    }

    async fn open_stream(client: &Client, url: &Url, open_timeout: Duration) -> Result<Response, String> {
        let request = client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send();
        let response = tokio::time::timeout(open_timeout, request)
            .await
            .map_err(|_| format!("no response within {:?}", open_timeout))?
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("{} - {}", status, body));
        }
        Ok(response)
    }

    /// Drive the event stream forever, reconnecting after drops. Returns
    /// only when the subscriber is gone.
    async fn run_stream(
        client: Client,
        url: Url,
        path: String,
        first: Response,
        tx: mpsc::Sender<Snapshot>,
        reconnect_delay: Duration,
        open_timeout: Duration,
    ) {
        let mut response = Some(first);

        loop {
            if let Some(stream) = response.take() {
                if !Self::consume(stream, &path, &tx).await {
                    return;
                }
            }

            tokio::time::sleep(reconnect_delay).await;
            if tx.is_closed() {
                return;
            }

            match Self::open_stream(&client, &url, open_timeout).await {
                Ok(stream) => {
                    info!(path = %path, "Remote subscription reconnected");
                    response = Some(stream);
                }
                Err(reason) => {
                    warn!(path = %path, error = %reason, "Failed to reconnect remote subscription");
                }
            }
        }
    }

    /// Returns false once the receiver is dropped
    async fn consume(response: Response, path: &str, tx: &mpsc::Sender<Snapshot>) -> bool {
        let mut decoder = SseDecoder::new();
        let mut tree = RemoteTree::new();
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!(path = %path, error = %e, "Remote subscription stream error");
                    return true;
                }
            };

            for raw in decoder.push(&chunk) {
                let Some(event) = StreamEvent::from_sse(&raw) else {
                    continue;
                };
                match event {
                    StreamEvent::KeepAlive => {}
                    StreamEvent::Cancel(reason) => {
                        error!(path = %path, reason = %reason, "Remote subscription cancelled by server");
                        return true;
                    }
                    StreamEvent::AuthRevoked => {
                        warn!(path = %path, "Remote subscription credential revoked");
                        return true;
                    }
                    change => {
                        tree.apply(change);
                        if tx.send(Snapshot::from_value(tree.value())).await.is_err() {
                            return false;
                        }
                    }
                }
            }
        }

        warn!(path = %path, "Remote subscription stream ended");
        true
    }
}

#[async_trait]
impl RemoteStore for FirebaseStore {
    async fn subscribe(&self, path: &str) -> Result<Subscription, MapLoadError> {
        let url = self.endpoint(path).map_err(|e| MapLoadError::Subscribe {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        let first = Self::open_stream(&self.client, &url, self.open_timeout)
            .await
            .map_err(|reason| MapLoadError::Subscribe {
                path: path.to_string(),
                reason,
            })?;

        info!(path = %path, "Remote subscription established");

        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        let task = tokio::spawn(Self::run_stream(
            self.client.clone(),
            url,
            path.to_string(),
            first,
            tx,
            self.reconnect_delay,
            self.open_timeout,
        ));

        Ok(Subscription::new(rx, task))
    }

    async fn upsert(&self, path: &str, id: MarkerId, record: QuestRecord) -> Result<(), RemoteWriteError> {
        let target = format!("{}/{}", path.trim_matches('/'), id);
        self.send_write(WriteOp::Upsert, target, |client, url| client.put(url).json(&record))
            .await
    }

    async fn delete(&self, path: &str, id: MarkerId) -> Result<(), RemoteWriteError> {
        let target = format!("{}/{}", path.trim_matches('/'), id);
        self.send_write(WriteOp::Delete, target, |client, url| client.delete(url))
            .await
    }

    async fn delete_all(&self, path: &str) -> Result<(), RemoteWriteError> {
        let target = path.trim_matches('/').to_string();
        self.send_write(WriteOp::DeleteAll, target, |client, url| client.delete(url))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::models::Coordinate;
    use mockito::{Matcher, ServerGuard};
    use serde_json::json;

    const EVENT_STREAM: &str = concat!(
        "event: put\n",
        "data: {\"path\":\"/\",\"data\":[null,{\"location\":{\"lat\":1.0,\"lng\":2.0}}]}\n\n",
        "event: keep-alive\n",
        "data: null\n\n",
        "event: patch\n",
        "data: {\"path\":\"/\",\"data\":{\"5\":{\"location\":{\"lat\":3.0,\"lng\":4.0},",
        "\"timestamp\":\"2024-01-01T00:00:00.000Z\",\"next\":null}}}\n\n",
    );

    async fn setup_mock_server() -> (ServerGuard, FirebaseStore) {
        let server = mockito::Server::new_async().await;
        let store = FirebaseStore::new(&server.url(), None, Duration::from_millis(10)).unwrap();
        (server, store)
    }

    async fn next_snapshot(subscription: &mut Subscription) -> Snapshot {
        tokio::time::timeout(Duration::from_secs(5), subscription.next())
            .await
            .expect("no snapshot in time")
            .expect("subscription closed")
    }

    fn keys(snapshot: &Snapshot) -> Vec<&str> {
        snapshot.entries().iter().map(|(k, _)| k.as_str()).collect()
    }

    fn store(token: Option<&str>) -> FirebaseStore {
        FirebaseStore::new(
            "https://demo-default-rtdb.firebaseio.com/",
            token.map(str::to_string),
            Duration::from_millis(10),
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_base_url() {
        let result = FirebaseStore::new("not a url", None, Duration::from_secs(1));
        assert!(matches!(result, Err(MapLoadError::InvalidStoreUrl { .. })));
    }

    #[test]
    fn test_endpoint_for_record() {
        let url = store(None).endpoint("quests/3").unwrap();
        assert_eq!(url.as_str(), "https://demo-default-rtdb.firebaseio.com/quests/3.json");
    }

    #[test]
    fn test_endpoint_for_collection_trims_slashes() {
        let url = store(None).endpoint("/quests/").unwrap();
        assert_eq!(url.as_str(), "https://demo-default-rtdb.firebaseio.com/quests.json");
    }

    #[test]
    fn test_endpoint_appends_auth_token() {
        let url = store(Some("secret token")).endpoint("quests").unwrap();
        assert_eq!(
            url.as_str(),
            "https://demo-default-rtdb.firebaseio.com/quests.json?auth=secret+token"
        );
    }

    #[tokio::test]
    async fn test_write_to_unreachable_host_is_transport_error() {
        // Port 9 (discard) on localhost is closed in test environments
        let store = FirebaseStore::new("http://127.0.0.1:9", None, Duration::from_millis(10)).unwrap();

        let err = store.delete("quests", 1).await.unwrap_err();
        assert_eq!(err.op(), WriteOp::Delete);
        assert_eq!(err.target(), "quests/1");
        assert!(matches!(err, RemoteWriteError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_subscribe_to_unreachable_host_is_map_load_error() {
        let store = FirebaseStore::new("http://127.0.0.1:9", None, Duration::from_millis(10)).unwrap();

        let result = store.subscribe("quests").await;
        assert!(matches!(result, Err(MapLoadError::Subscribe { .. })));
    }

    #[tokio::test]
    async fn test_upsert_puts_full_record() {
        let (mut server, store) = setup_mock_server().await;
        let mock = server
            .mock("PUT", "/quests/3.json")
            .match_header("content-type", "application/json")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({
                    "location": { "lat": 1.0, "lng": 2.0 },
                    "next": null
                })),
                Matcher::Regex(r#""timestamp":"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z""#.to_string()),
            ]))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        store
            .upsert("quests", 3, QuestRecord::new(Coordinate::new(1.0, 2.0)))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_targets_record_and_collection() {
        let (mut server, store) = setup_mock_server().await;
        let record = server
            .mock("DELETE", "/quests/2.json")
            .with_status(200)
            .with_body("null")
            .create_async()
            .await;
        let collection = server
            .mock("DELETE", "/quests.json")
            .with_status(200)
            .with_body("null")
            .create_async()
            .await;

        store.delete("quests", 2).await.unwrap();
        store.delete_all("quests").await.unwrap();

        record.assert_async().await;
        collection.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_write_carries_status_and_body() {
        let (mut server, store) = setup_mock_server().await;
        let _mock = server
            .mock("DELETE", "/quests.json")
            .with_status(401)
            .with_body(r#"{"error":"Permission denied"}"#)
            .create_async()
            .await;

        let err = store.delete_all("quests").await.unwrap_err();
        match err {
            RemoteWriteError::Status { op, target, status, body } => {
                assert_eq!(op, WriteOp::DeleteAll);
                assert_eq!(target, "quests");
                assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED);
                assert!(body.contains("Permission denied"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_applies_put_and_patch_then_reconnects() {
        let (mut server, store) = setup_mock_server().await;
        let stream = server
            .mock("GET", "/quests.json")
            .match_header("accept", "text/event-stream")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(EVENT_STREAM)
            .expect_at_least(2)
            .create_async()
            .await;

        let mut subscription = store.subscribe("quests").await.unwrap();

        let first = next_snapshot(&mut subscription).await;
        assert_eq!(keys(&first), vec!["1"]);
        assert_eq!(first.entries()[0].1.location, Coordinate::new(1.0, 2.0));

        // keep-alive yields nothing; the patch merges into the array-shaped put
        let second = next_snapshot(&mut subscription).await;
        assert_eq!(keys(&second), vec!["1", "5"]);
        assert_eq!(second.entries()[1].1.location, Coordinate::new(3.0, 4.0));

        // body ended; the next connection starts over from a full put
        let third = next_snapshot(&mut subscription).await;
        assert_eq!(keys(&third), vec!["1"]);

        stream.assert_async().await;
        subscription.cancel();
    }

    #[tokio::test]
    async fn test_subscribe_rejected_by_server() {
        let (mut server, store) = setup_mock_server().await;
        let _mock = server
            .mock("GET", "/quests.json")
            .with_status(401)
            .with_body(r#"{"error":"Permission denied"}"#)
            .create_async()
            .await;

        let result = store.subscribe("quests").await;
        assert!(matches!(
            result,
            Err(MapLoadError::Subscribe { ref reason, .. }) if reason.starts_with("401")
        ));
    }

    #[tokio::test]
    async fn test_subscribe_to_silent_server_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept connections and never answer
        let silent = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let store = FirebaseStore::new(&format!("http://{}", addr), None, Duration::from_millis(10))
            .unwrap()
            .with_open_timeout(Duration::from_millis(100));

        let result = store.subscribe("quests").await;
        assert!(matches!(
            result,
            Err(MapLoadError::Subscribe { ref reason, .. }) if reason.starts_with("no response within")
        ));

        silent.abort();
    }
}
