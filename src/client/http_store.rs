//! REST/JSON backing store over reqwest

use crate::error::{FeedError, Result};
use crate::feeds::FeedKind;
use crate::identity::{Credential, TargetIdentity};
use crate::store::BackingStore;
use crate::types::{Ack, Draft, FeedItem, ItemId, NewCount, Page, PageDirection, Reaction, Upload};
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde::Serialize;
use std::marker::PhantomData;
use std::time::Duration;

/// HTTP backing store configuration
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    /// Base URL of the feed API (e.g., "https://api.fitfeed.app/v1")
    pub base_url: String,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Items per page requested from the server
    pub page_size: u32,
}

impl Default for HttpStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            timeout_secs: 30,
            page_size: 20,
        }
    }
}

#[derive(Serialize)]
struct ReactionRequest {
    reaction: Reaction,
}

/// [`BackingStore`] speaking the feed REST API.
///
/// Layout under `{base_url}/{resource}`:
///
/// | call | request |
/// |------|---------|
/// | fetch_page | `GET /{res}?user=&before=\|after=&limit=` |
/// | fetch_new_count | `GET /{res}/new/count?user=&since=` |
/// | fetch_new_items | `GET /{res}/new?user=&since=` |
/// | toggle_reaction | `POST /{res}/{id}/reactions` |
/// | delete_item | `DELETE /{res}/{id}` |
/// | create_item | `POST /{res}` |
/// | upload_attachment | `PUT /{res}/attachments?name=` |
///
/// # Example
///
/// ```rust,no_run
/// use fitfeed_sync::{HttpBackingStore, HttpStoreConfig, Posts};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = HttpBackingStore::<Posts>::new(HttpStoreConfig {
///     base_url: "https://api.fitfeed.app/v1".into(),
///     ..Default::default()
/// })?;
/// # Ok(())
/// # }
/// ```
pub struct HttpBackingStore<K> {
    config: HttpStoreConfig,
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K: FeedKind> HttpBackingStore<K> {
    /// Create a new store
    pub fn new(config: HttpStoreConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(FeedError::Config("base_url must not be empty".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            client,
            _kind: PhantomData,
        })
    }

    pub fn config(&self) -> &HttpStoreConfig {
        &self.config
    }

    // ==================== URLs ====================

    fn collection_url(&self) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), K::resource())
    }

    fn item_url(&self, item_id: &ItemId) -> String {
        format!("{}/{}", self.collection_url(), urlencoding::encode(item_id.as_str()))
    }

    fn page_url(&self, target: &TargetIdentity, cursor: Option<&ItemId>, direction: PageDirection) -> String {
        let mut params = target_params(target);
        match (direction, cursor) {
            (PageDirection::Before, Some(cursor)) => {
                params.push(format!("before={}", urlencoding::encode(cursor.as_str())));
            }
            (PageDirection::After, Some(cursor)) => {
                params.push(format!("after={}", urlencoding::encode(cursor.as_str())));
            }
            _ => {}
        }
        params.push(format!("limit={}", self.config.page_size));
        with_query(self.collection_url(), &params)
    }

    fn since_url(&self, suffix: &str, target: &TargetIdentity, since: Option<&ItemId>) -> String {
        let mut params = target_params(target);
        if let Some(since) = since {
            params.push(format!("since={}", urlencoding::encode(since.as_str())));
        }
        with_query(format!("{}/{}", self.collection_url(), suffix), &params)
    }

    fn upload_url(&self, upload: &Upload) -> String {
        let params: Vec<String> = upload
            .file_name
            .iter()
            .map(|name| format!("name={}", urlencoding::encode(name)))
            .collect();
        with_query(format!("{}/attachments", self.collection_url()), &params)
    }

    // ==================== Helper Methods ====================

    fn authorize(&self, request: RequestBuilder, credential: &Credential) -> RequestBuilder {
        match credential.authorization_header() {
            Some(value) => request.header(header::AUTHORIZATION, value),
            None => request,
        }
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = check_status(response).await?;
        let body = response.json().await?;
        Ok(body)
    }

    /// Mutations may answer with an empty body (204) or a small JSON object
    async fn handle_ack(&self, response: reqwest::Response) -> Result<Ack> {
        let response = check_status(response).await?;
        let body = response.text().await?;
        Ok(parse_ack(&body))
    }
}

/// The call already succeeded by status; an unreadable body only loses the
/// optional message
fn parse_ack(body: &str) -> Ack {
    if body.trim().is_empty() {
        return Ack::default();
    }
    match serde_json::from_str(body) {
        Ok(ack) => ack,
        Err(err) => {
            tracing::debug!(error = %err, "Unparseable acknowledgement body, using empty ack");
            Ack::default()
        }
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body
    };
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        tracing::debug!(status = status.as_u16(), "Backing store rejected credential");
    }
    Err(FeedError::from_status(status.as_u16(), message))
}

fn target_params(target: &TargetIdentity) -> Vec<String> {
    match target.user_id() {
        Some(user) => vec![format!("user={}", urlencoding::encode(user.as_str()))],
        None => Vec::new(),
    }
}

fn with_query(mut url: String, params: &[String]) -> String {
    if !params.is_empty() {
        url.push('?');
        url.push_str(&params.join("&"));
    }
    url
}

#[async_trait]
impl<K: FeedKind> BackingStore<K> for HttpBackingStore<K> {
    async fn fetch_page(
        &self,
        credential: &Credential,
        target: &TargetIdentity,
        cursor: Option<&ItemId>,
        direction: PageDirection,
    ) -> Result<Page<K::Attachment>> {
        let url = self.page_url(target, cursor, direction);
        let response = self.authorize(self.client.get(&url), credential).send().await?;
        self.handle_response(response).await
    }

    async fn fetch_new_count(
        &self,
        credential: &Credential,
        target: &TargetIdentity,
        since: Option<&ItemId>,
    ) -> Result<NewCount> {
        let url = self.since_url("new/count", target, since);
        let response = self.authorize(self.client.get(&url), credential).send().await?;
        self.handle_response(response).await
    }

    async fn fetch_new_items(
        &self,
        credential: &Credential,
        target: &TargetIdentity,
        since: Option<&ItemId>,
    ) -> Result<Vec<FeedItem<K::Attachment>>> {
        let url = self.since_url("new", target, since);
        let response = self.authorize(self.client.get(&url), credential).send().await?;
        self.handle_response(response).await
    }

    async fn toggle_reaction(
        &self,
        credential: &Credential,
        item_id: &ItemId,
        reaction: Reaction,
    ) -> Result<Ack> {
        let url = format!("{}/reactions", self.item_url(item_id));
        let response = self
            .authorize(self.client.post(&url), credential)
            .json(&ReactionRequest { reaction })
            .send()
            .await?;
        self.handle_ack(response).await
    }

    async fn delete_item(&self, credential: &Credential, item_id: &ItemId) -> Result<Ack> {
        let url = self.item_url(item_id);
        let response = self.authorize(self.client.delete(&url), credential).send().await?;
        self.handle_ack(response).await
    }

    async fn create_item(&self, credential: &Credential, draft: &Draft<K::Attachment>) -> Result<Ack> {
        let url = self.collection_url();
        let response = self
            .authorize(self.client.post(&url), credential)
            .json(draft)
            .send()
            .await?;
        self.handle_ack(response).await
    }

    async fn upload_attachment(&self, credential: &Credential, upload: Upload) -> Result<K::Attachment> {
        let url = self.upload_url(&upload);
        let response = self
            .authorize(self.client.put(&url), credential)
            .header(header::CONTENT_TYPE, upload.mime_type)
            .body(upload.bytes)
            .send()
            .await?;
        self.handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::{Messages, Posts};

    fn posts() -> HttpBackingStore<Posts> {
        HttpBackingStore::new(HttpStoreConfig {
            base_url: "https://api.fitfeed.test/v1/".to_string(),
            page_size: 10,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_rejects_empty_base_url() {
        let result = HttpBackingStore::<Posts>::new(HttpStoreConfig {
            base_url: " ".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(FeedError::Config(_))));
    }

    #[test]
    fn test_page_urls() {
        let store = posts();

        assert_eq!(
            store.page_url(&TargetIdentity::All, None, PageDirection::Initial),
            "https://api.fitfeed.test/v1/posts?limit=10"
        );
        assert_eq!(
            store.page_url(&TargetIdentity::user("runner 7"), Some(&ItemId::from(42)), PageDirection::Before),
            "https://api.fitfeed.test/v1/posts?user=runner%207&before=42&limit=10"
        );
        assert_eq!(
            store.page_url(&TargetIdentity::All, Some(&ItemId::from(42)), PageDirection::After),
            "https://api.fitfeed.test/v1/posts?after=42&limit=10"
        );
    }

    #[test]
    fn test_since_urls() {
        let store = posts();

        assert_eq!(
            store.since_url("new/count", &TargetIdentity::All, Some(&ItemId::from(9))),
            "https://api.fitfeed.test/v1/posts/new/count?since=9"
        );
        assert_eq!(
            store.since_url("new", &TargetIdentity::user("u1"), None),
            "https://api.fitfeed.test/v1/posts/new?user=u1"
        );
    }

    #[test]
    fn test_item_and_upload_urls() {
        let store = HttpBackingStore::<Messages>::new(HttpStoreConfig::default()).unwrap();

        assert_eq!(store.item_url(&ItemId::from("a/b")), "http://localhost:8000/api/messages/a%2Fb");
        assert_eq!(
            store.upload_url(&Upload::new(vec![1, 2, 3], "image/png").with_file_name("pr squat.png")),
            "http://localhost:8000/api/messages/attachments?name=pr%20squat.png"
        );
        assert_eq!(
            store.upload_url(&Upload::new(Vec::new(), "image/png")),
            "http://localhost:8000/api/messages/attachments"
        );
    }

    #[test]
    fn test_parse_ack_bodies() {
        assert_eq!(parse_ack(""), Ack::default());
        assert_eq!(parse_ack("  \n"), Ack::default());
        assert_eq!(
            parse_ack(r#"{"message":"deleted"}"#),
            Ack {
                message: Some("deleted".to_string())
            }
        );
        assert_eq!(parse_ack(r#"{"id":7}"#), Ack::default());
        assert_eq!(parse_ack("<html>Bad Gateway</html>"), Ack::default());
    }

    #[test]
    fn test_reaction_request_body() {
        let json = serde_json::to_string(&ReactionRequest { reaction: Reaction::Dislike }).unwrap();
        assert_eq!(json, r#"{"reaction":"dislike"}"#);
    }
}
