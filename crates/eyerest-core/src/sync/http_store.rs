//! REST document store client.
//!
//! Documents live at `{base}/users/{user_id}/{category}/current`:
//! `PUT` overwrites, `GET` fetches (404 means no document yet). The store
//! has no push channel, so `watch` polls.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tokio::sync::mpsc;
use url::Url;

use super::remote::RemoteStore;
use super::types::{DocumentKey, SyncDocument, SyncError};

#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: Client,
    base_url: Url,
    auth_token: Option<String>,
    poll_interval: Duration,
}

impl HttpRemoteStore {
    /// # Errors
    /// Returns an error if `base_url` is not an absolute http(s) URL.
    pub fn new(
        base_url: &str,
        auth_token: Option<String>,
        poll_interval: Duration,
    ) -> Result<Self, SyncError> {
        let base_url =
            Url::parse(base_url).map_err(|e| SyncError::Remote(format!("invalid base url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::Remote(format!("invalid base url: {base_url}")));
        }
        Ok(Self {
            client: Client::new(),
            base_url,
            auth_token,
            poll_interval,
        })
    }

    pub fn document_url(&self, key: &DocumentKey) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "users",
                key.user_id.as_str(),
                key.category.as_str(),
                "current",
            ]);
        }
        url
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn read_document(resp: reqwest::Response) -> Result<Option<SyncDocument>, SyncError> {
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(resp.json::<SyncDocument>().await?)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SyncError::NotAuthenticated),
            status => Err(SyncError::Http {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn put(&self, key: &DocumentKey, doc: &SyncDocument) -> Result<(), SyncError> {
        let resp = self
            .authorize(self.client.put(self.document_url(key)))
            .json(doc)
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SyncError::NotAuthenticated);
        }
        Err(SyncError::Http {
            status: status.as_u16(),
            message: resp.text().await.unwrap_or_default(),
        })
    }

    async fn get(&self, key: &DocumentKey) -> Result<Option<SyncDocument>, SyncError> {
        let resp = self
            .authorize(self.client.get(self.document_url(key)))
            .send()
            .await?;
        Self::read_document(resp).await
    }

    fn watch(&self, key: &DocumentKey) -> mpsc::UnboundedReceiver<SyncDocument> {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = self.clone();
        let key = key.clone();

        tokio::spawn(async move {
            let mut last_seen: Option<i64> = None;
            let mut interval = tokio::time::interval(store.poll_interval);
            loop {
                interval.tick().await;
                if tx.is_closed() {
                    break;
                }
                match store.get(&key).await {
                    Ok(Some(doc)) if last_seen != Some(doc.last_updated) => {
                        last_seen = Some(doc.last_updated);
                        if tx.send(doc).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(path = %key.path(), error = %e, "remote poll failed");
                    }
                }
            }
            tracing::debug!(path = %key.path(), "remote watch ended");
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::SyncCategory;

    fn doc() -> SyncDocument {
        SyncDocument {
            category: SyncCategory::Settings,
            payload: serde_json::json!({"sync_enabled": true}),
            last_updated: 1_700_000_000_000,
            device_id: None,
        }
    }

    fn store(server: &mockito::ServerGuard) -> HttpRemoteStore {
        HttpRemoteStore::new(&server.url(), Some("tok".into()), Duration::from_millis(10)).unwrap()
    }

    #[test]
    fn document_url_appends_segments() {
        let store =
            HttpRemoteStore::new("https://sync.example.com/api/", None, Duration::from_secs(1))
                .unwrap();
        let url = store.document_url(&DocumentKey::new("user 1", SyncCategory::Timer));
        assert_eq!(
            url.as_str(),
            "https://sync.example.com/api/users/user%201/timer_state/current"
        );
    }

    #[test]
    fn rejects_relative_base_url() {
        assert!(HttpRemoteStore::new("not a url", None, Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn put_sends_bearer_token_and_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/users/u1/settings/current")
            .match_header("authorization", "Bearer tok")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "category": "settings",
                "lastUpdated": 1_700_000_000_000i64
            })))
            .with_status(200)
            .create_async()
            .await;

        let key = DocumentKey::new("u1", SyncCategory::Settings);
        store(&server).put(&key, &doc()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_maps_not_found_to_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/users/u1/settings/current")
            .with_status(404)
            .create_async()
            .await;

        let key = DocumentKey::new("u1", SyncCategory::Settings);
        assert!(store(&server).get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_parses_document() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/users/u1/settings/current")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(serde_json::to_string(&doc()).unwrap())
            .create_async()
            .await;

        let key = DocumentKey::new("u1", SyncCategory::Settings);
        assert_eq!(store(&server).get(&key).await.unwrap(), Some(doc()));
    }

    #[tokio::test]
    async fn auth_and_server_errors_are_typed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", "/users/u1/settings/current")
            .with_status(401)
            .create_async()
            .await;
        server
            .mock("GET", "/users/u1/settings/current")
            .with_status(503)
            .with_body("down")
            .create_async()
            .await;

        let key = DocumentKey::new("u1", SyncCategory::Settings);
        let store = store(&server);
        assert!(matches!(
            store.put(&key, &doc()).await,
            Err(SyncError::NotAuthenticated)
        ));
        assert!(matches!(
            store.get(&key).await,
            Err(SyncError::Http { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn watch_polls_and_delivers_changes() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/users/u1/settings/current")
            .with_status(200)
            .with_body(serde_json::to_string(&doc()).unwrap())
            .expect_at_least(2)
            .create_async()
            .await;

        let key = DocumentKey::new("u1", SyncCategory::Settings);
        let mut rx = store(&server).watch(&key);
        let first = rx.recv().await.unwrap();
        assert_eq!(first, doc());
        // Same document on later polls is not re-delivered.
        let next = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(next.is_err());
    }
}
