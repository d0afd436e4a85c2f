//! Request/response access to the backend REST API.
//!
//! The coordinator and directory only see the [`Backend`] trait so tests can
//! swap in a scripted backend; [`RequestGateway`] is the reqwest-backed
//! implementation.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use palaver_shared::{Conversation, ConversationId, Identity, SyncError, UserId};

/// Bearer token presented to the backend. Never printed in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Whether authenticated calls can be attempted at all.
    fn has_credential(&self) -> bool;

    /// `GET /chat`
    async fn list_conversations(&self) -> Result<Vec<Conversation>, SyncError>;

    /// `POST /chat` for a private conversation with `participant`.
    async fn create_conversation(&self, participant: &UserId) -> Result<Conversation, SyncError>;

    /// `GET /chat/users/search?query=`
    async fn search_users(&self, query: &str) -> Result<Vec<Identity>, SyncError>;
}

#[derive(Debug, Clone)]
pub struct RequestGateway {
    client: Client,
    base_url: String,
    credential: Option<Credential>,
}

impl RequestGateway {
    pub fn new(
        base_url: impl Into<String>,
        credential: Option<Credential>,
        timeout: Duration,
    ) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::remote(None, e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, SyncError> {
        let credential = self.credential.as_ref().ok_or(SyncError::Unauthenticated)?;
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "Backend request");
        Ok(self
            .client
            .request(method, url)
            .bearer_auth(credential.expose()))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, SyncError> {
        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "Backend unreachable");
            SyncError::remote(None, e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(status, &body);
            warn!(status = status.as_u16(), %message, "Backend returned an error");
            return Err(SyncError::remote(Some(status.as_u16()), message));
        }

        response
            .json()
            .await
            .map_err(|e| SyncError::remote(Some(status.as_u16()), format!("Invalid response body: {e}")))
    }
}

/// Prefer the backend's `{"error": "..."}` text, fall back to the status line.
fn error_message(status: StatusCode, body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }

    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| format!("HTTP error! status: {}", status.as_u16()))
}

#[async_trait]
impl Backend for RequestGateway {
    fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, SyncError> {
        let chats: Vec<ChatSummary> = self.send(self.request(Method::GET, "/chat")?).await?;
        Ok(chats.into_iter().map(Conversation::from).collect())
    }

    async fn create_conversation(&self, participant: &UserId) -> Result<Conversation, SyncError> {
        let body = CreateChatRequest {
            participant_id: participant,
            chat_type: "private",
        };
        let chat: ChatSummary = self
            .send(self.request(Method::POST, "/chat")?.json(&body))
            .await?;
        Ok(chat.into())
    }

    async fn search_users(&self, query: &str) -> Result<Vec<Identity>, SyncError> {
        let request = self
            .request(Method::GET, "/chat/users/search")?
            .query(&[("query", query)]);
        let users: Vec<UserSummary> = self.send(request).await?;
        Ok(users.into_iter().map(Identity::from).collect())
    }
}

// ---------------------------------------------------------------------------
// Wire DTOs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateChatRequest<'a> {
    participant_id: &'a UserId,
    chat_type: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatSummary {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    last_message: Option<LastMessage>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    unread_count: u32,
    #[serde(default)]
    photo: Option<String>,
}

#[derive(Deserialize)]
struct LastMessage {
    #[serde(default)]
    content: Option<String>,
}

impl From<ChatSummary> for Conversation {
    fn from(chat: ChatSummary) -> Self {
        Conversation {
            id: ConversationId(chat.id),
            display_name: chat.name,
            last_message_preview: chat
                .last_message
                .and_then(|m| m.content)
                .unwrap_or_default(),
            last_message_at: chat.timestamp,
            unread_count: chat.unread_count,
            peer_online: false,
            avatar_ref: chat.photo,
        }
    }
}

#[derive(Deserialize)]
struct UserSummary {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    mobile: Option<String>,
    #[serde(default)]
    photo: Option<String>,
}

impl From<UserSummary> for Identity {
    fn from(user: UserSummary) -> Self {
        Identity {
            id: UserId(user.id),
            name: user.name,
            email: user.email,
            mobile: user.mobile,
            photo: user.photo,
        }
    }
}

/// Backend ids are sometimes numeric.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

/// RFC 3339 text or epoch milliseconds; anything else is treated as absent.
fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok(),
        Some(serde_json::Value::Number(n)) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            == Some("Bearer secret")
    }

    async fn list_chats(headers: HeaderMap) -> (AxumStatus, Json<Value>) {
        if !authorized(&headers) {
            return (AxumStatus::UNAUTHORIZED, Json(json!({ "error": "Invalid token" })));
        }
        (
            AxumStatus::OK,
            Json(json!([
                {
                    "id": 7,
                    "name": "Jane Smith",
                    "lastMessage": { "content": "Meeting at 3 PM" },
                    "timestamp": "2024-05-01T10:00:00Z",
                    "unreadCount": 1,
                    "photo": null
                },
                { "id": "8", "name": "Empty", "lastMessage": null, "timestamp": null }
            ])),
        )
    }

    async fn create_chat(Json(body): Json<Value>) -> Json<Value> {
        assert_eq!(body["chatType"], "private");
        Json(json!({
            "id": "99",
            "name": format!("with {}", body["participantId"].as_str().unwrap_or("?")),
            "timestamp": 1_714_557_600_000_i64
        }))
    }

    async fn search(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        let query = params.get("query").cloned().unwrap_or_default();
        Json(json!([
            { "id": 3, "name": format!("Mike {query}"), "mobile": "+1122334455" }
        ]))
    }

    async fn spawn_backend() -> String {
        std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
        let app = Router::new()
            .route("/api/chat", get(list_chats).post(create_chat))
            .route("/api/chat/users/search", get(search))
            .route(
                "/api/broken/chat",
                get(|| async {
                    (AxumStatus::INTERNAL_SERVER_ERROR, Json(json!({ "error": "boom" })))
                }),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}/api")
    }

    fn gateway(base: &str, token: Option<&str>) -> RequestGateway {
        RequestGateway::new(base, token.map(Credential::new), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_list_conversations_maps_summaries() {
        let base = spawn_backend().await;
        let chats = gateway(&base, Some("secret"))
            .list_conversations()
            .await
            .unwrap();

        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].id.as_str(), "7");
        assert_eq!(chats[0].last_message_preview, "Meeting at 3 PM");
        assert_eq!(chats[0].unread_count, 1);
        assert!(chats[0].last_message_at.is_some());
        assert!(!chats[0].peer_online);
        assert_eq!(chats[1].last_message_preview, "");
        assert!(chats[1].last_message_at.is_none());
    }

    #[tokio::test]
    async fn test_rejected_token_is_remote_error() {
        let base = spawn_backend().await;
        let err = gateway(&base, Some("wrong"))
            .list_conversations()
            .await
            .unwrap_err();
        assert_eq!(err, SyncError::remote(Some(401), "Invalid token"));
    }

    #[tokio::test]
    async fn test_missing_credential_fails_fast() {
        let gw = gateway("http://127.0.0.1:9/api", None);
        assert!(!gw.has_credential());
        assert_eq!(
            gw.list_conversations().await.unwrap_err(),
            SyncError::Unauthenticated
        );
        assert_eq!(
            gw.search_users("x").await.unwrap_err(),
            SyncError::Unauthenticated
        );
    }

    #[tokio::test]
    async fn test_create_and_search() {
        let base = spawn_backend().await;
        let gw = gateway(&base, Some("secret"));

        let chat = gw.create_conversation(&UserId::from("3")).await.unwrap();
        assert_eq!(chat.id.as_str(), "99");
        assert_eq!(chat.display_name, "with 3");
        assert_eq!(chat.unread_count, 0);
        assert!(chat.last_message_at.is_some());

        let users = gw.search_users("J").await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id.as_str(), "3");
        assert_eq!(users[0].name, "Mike J");
        assert_eq!(users[0].mobile.as_deref(), Some("+1122334455"));
    }

    #[tokio::test]
    async fn test_server_error_carries_status_and_message() {
        let base = spawn_backend().await;
        let err = gateway(&format!("{base}/broken/"), Some("secret"))
            .list_conversations()
            .await
            .unwrap_err();
        assert_eq!(err, SyncError::remote(Some(500), "boom"));
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("super-secret");
        assert!(!format!("{credential:?}").contains("super-secret"));
        assert_eq!(credential.expose(), "super-secret");
    }

    #[test]
    fn test_error_message_fallback() {
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "<html>"),
            "HTTP error! status: 502"
        );
    }
}
