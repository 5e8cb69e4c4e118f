use std::{collections::HashMap, time::Duration};

use anyhow::Result;
use serde_json::Value;
use trackard_core::{
    config::LaudiolinConfig,
    models::{PartialUser, SocialResponse, User},
};
use url::Url;

const ONLINE_PATH: &str = "/social/available";
const RECENT_PATH: &str = "/social/recent";

/// Failure talking to the upstream API. `code` is the HTTP status when one was
/// received, otherwise 500.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct ApiError {
    pub code: u16,
    pub message: String,
}

impl ApiError {
    fn internal(message: impl ToString) -> Self { Self { code: 500, message: message.to_string() } }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self { code: err.status().map_or(500, |s| s.as_u16()), message: err.to_string() }
    }
}

/// Client for the social endpoints of a Laudiolin REST backend.
#[derive(Clone)]
pub struct Laudiolin {
    client: reqwest::Client,
    base: Url,
}

impl Laudiolin {
    pub fn new(config: &LaudiolinConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self::with_client(client, config.rest_url.clone()))
    }

    pub fn with_client(client: reqwest::Client, base: Url) -> Self { Self { client, base } }

    /// The underlying HTTP client, shared with thumbnail downloads.
    pub fn http(&self) -> &reqwest::Client { &self.client }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base.as_str().trim_end_matches('/'), path)
    }

    async fn get(&self, path: &str) -> Result<SocialResponse, ApiError> {
        let url = self.endpoint(path);
        tracing::debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError {
                code: status.as_u16(),
                message: format!("Request failed with status code {}", status.as_u16()),
            });
        }
        let body = response.bytes().await?;
        decode_body(&body).map_err(ApiError::internal)
    }

    /// Users currently online, each with a derived tag.
    pub async fn fetch_online(&self) -> Result<Vec<User>, ApiError> {
        let mut users = self.get(ONLINE_PATH).await?.online_users;
        for user in &mut users {
            user.profile.derive_tag();
        }
        Ok(users)
    }

    /// Recently active users, each with a derived tag.
    pub async fn fetch_recent(&self) -> Result<Vec<PartialUser>, ApiError> {
        let mut users = self.get(RECENT_PATH).await?.recent_users;
        for user in &mut users {
            user.profile.derive_tag();
        }
        Ok(users)
    }

    pub async fn find_user(&self, user_id: &str) -> Option<User> {
        let users = self.fetch_online().await.unwrap_or_else(|e| {
            tracing::warn!("Failed to fetch online users: {e}");
            Vec::new()
        });
        index_by_id(users, |u| &u.profile.user_id).remove(user_id)
    }

    pub async fn find_partial(&self, user_id: &str) -> Option<PartialUser> {
        let users = self.fetch_recent().await.unwrap_or_else(|e| {
            tracing::warn!("Failed to fetch recent users: {e}");
            Vec::new()
        });
        index_by_id(users, |u| &u.profile.user_id).remove(user_id)
    }
}

fn index_by_id<T>(items: Vec<T>, id: impl Fn(&T) -> &String) -> HashMap<String, T> {
    items.into_iter().map(|item| (id(&item).clone(), item)).collect()
}

/// Parses a response body. A body holding a JSON string is parsed a second time,
/// so double-encoded responses decode the same as plain ones.
pub fn decode_body(body: &[u8]) -> Result<SocialResponse> {
    let response = match serde_json::from_slice::<Value>(body)? {
        Value::String(text) => serde_json::from_str(&text)?,
        value => serde_json::from_value(value)?,
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use axum::{Json, Router, http::StatusCode, routing::get};
    use serde_json::json;

    use super::*;

    fn online_body() -> Value {
        json!({
            "onlineUsers": [
                {
                    "socialStatus": "Everyone",
                    "username": "seiki",
                    "discriminator": "0001",
                    "userId": "42",
                    "avatar": "https://cdn/avatar.png",
                    "progress": 30.2,
                    "listeningTo": {
                        "duration": 215,
                        "artist": "Artist",
                        "title": "Title",
                        "icon": "https://img/x=w60-h60-l90-rj?from=cart",
                        "uri": "https://yt/abc",
                        "id": "abc",
                    },
                },
                { "username": "idle", "discriminator": "0002", "userId": "7", "listeningTo": null },
            ],
            "timestamp": 1700000000000u64,
            "code": 200,
            "message": "Ok",
        })
    }

    async fn listen(router: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        Url::parse(&format!("http://{addr}")).unwrap()
    }

    async fn serve(router: Router) -> Laudiolin {
        Laudiolin::with_client(reqwest::Client::new(), listen(router).await)
    }

    #[test]
    fn test_decode_body_forms() {
        let body = online_body();
        let plain = decode_body(body.to_string().as_bytes()).unwrap();
        let encoded = Value::String(body.to_string()).to_string();
        let double = decode_body(encoded.as_bytes()).unwrap();
        assert_eq!(plain.online_users, double.online_users);
        assert_eq!(plain.online_users.len(), 2);
        assert!(decode_body(b"not json").is_err());
    }

    #[test]
    fn test_decode_body_malformed_records() {
        let body = json!({
            "onlineUsers": [
                { "username": "idle", "discriminator": "0002", "userId": "7", "progress": null },
                { "username": "broken", "userId": 99 },
                online_body()["onlineUsers"][0],
            ],
            "timestamp": 1700000000000.5,
            "code": 200,
            "message": "Ok",
        });
        let response = decode_body(body.to_string().as_bytes()).unwrap();
        assert_eq!(response.timestamp, 1700000000000);
        let ids: Vec<_> = response.online_users.iter().map(|u| u.profile.user_id.as_str()).collect();
        assert_eq!(ids, ["7", "42"]);
        assert_eq!(response.online_users[0].profile.progress, 0.0);
        assert_eq!(response.online_users[1].listening().unwrap().id, "abc");
    }

    #[tokio::test]
    async fn test_find_user() {
        let client =
            serve(Router::new().route(ONLINE_PATH, get(|| async { Json(online_body()) }))).await;

        let user = client.find_user("42").await.unwrap();
        assert_eq!(user.profile.tag, "seiki#0001");
        assert_eq!(user.listening().unwrap().id, "abc");

        let idle = client.find_user("7").await.unwrap();
        assert!(idle.listening().is_none());

        assert!(client.find_user("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_find_user_beside_malformed_record() {
        let client = serve(Router::new().route(
            ONLINE_PATH,
            get(|| async {
                let mut body = online_body();
                body["onlineUsers"][1]["progress"] = Value::Null;
                Json(body)
            }),
        ))
        .await;
        let user = client.find_user("42").await.unwrap();
        assert_eq!(user.listening().unwrap().id, "abc");
        assert_eq!(user.profile.progress, 30.2);
        assert_eq!(client.find_user("7").await.unwrap().profile.progress, 0.0);
    }

    #[tokio::test]
    async fn test_double_encoded_upstream() {
        let client = serve(Router::new().route(
            ONLINE_PATH,
            get(|| async { Json(Value::String(online_body().to_string())) }),
        ))
        .await;
        let users = client.fetch_online().await.unwrap();
        assert_eq!(users[0].profile.tag, "seiki#0001");
    }

    #[tokio::test]
    async fn test_find_partial() {
        let client = serve(Router::new().route(
            RECENT_PATH,
            get(|| async {
                Json(json!({
                    "recentUsers": [{
                        "username": "seiki",
                        "discriminator": "0001",
                        "userId": "42",
                        "lastSeen": 1700000000,
                        "lastListeningTo": { "artist": "A", "title": "T", "icon": "i", "id": "t" },
                    }],
                    "timestamp": 0,
                    "code": 200,
                    "message": "Ok",
                }))
            }),
        ))
        .await;
        let partial = client.find_partial("42").await.unwrap();
        assert_eq!(partial.profile.tag, "seiki#0001");
        assert_eq!(partial.last_seen, 1700000000);
        assert!(client.find_partial("0").await.is_none());
    }

    #[tokio::test]
    async fn test_upstream_status_error() {
        let client = serve(Router::new().route(
            ONLINE_PATH,
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
        ))
        .await;
        let err = client.fetch_online().await.unwrap_err();
        assert_eq!(err.code, 503);
        assert!(client.find_user("42").await.is_none());
    }

    #[tokio::test]
    async fn test_upstream_timeout() {
        let rest_url = listen(Router::new().route(
            ONLINE_PATH,
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(online_body())
            }),
        ))
        .await;
        let client =
            Laudiolin::new(&LaudiolinConfig { rest_url, timeout_secs: 1, ..Default::default() })
                .unwrap();

        let started = Instant::now();
        let err = client.fetch_online().await.unwrap_err();
        assert_eq!(err.code, 500);
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(client.find_user("42").await.is_none());
    }

    #[tokio::test]
    async fn test_transport_error() {
        let client = Laudiolin::with_client(
            reqwest::Client::new(),
            Url::parse("http://127.0.0.1:1").unwrap(),
        );
        let err = client.fetch_online().await.unwrap_err();
        assert_eq!(err.code, 500);
    }
}
