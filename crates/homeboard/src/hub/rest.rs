use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tracing::debug;

use super::Hub;
use super::HubError;
use super::Result;
use super::ServiceCall;
use crate::entity::EntityState;

/// Hub client speaking the REST API (`/api/states`, `/api/services`)
pub struct RestHub {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RestHub {
    /// Create a client for the hub at `base_url`.
    ///
    /// Requests carry `Authorization: Bearer <token>` when a token is given.
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(HubError::Config(format!(
                "hub URL must start with http:// or https://, got '{}'",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HubError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(CONTENT_TYPE, "application/json");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder, url: &str) -> Result<reqwest::Response> {
        builder.send().await.map_err(|e| HubError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        url: &str,
    ) -> Result<T> {
        let body = response.text().await.map_err(|e| HubError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&body).map_err(|e| HubError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

fn check_status(response: &reqwest::Response, url: &str) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(HubError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Hub for RestHub {
    #[tracing::instrument(skip(self))]
    async fn states(&self) -> Result<Vec<EntityState>> {
        let url = self.url("/api/states");
        let response = self.send(self.request(reqwest::Method::GET, &url), &url).await?;
        check_status(&response, &url)?;

        let states: Vec<EntityState> = Self::decode(response, &url).await?;
        debug!("Fetched {} states from hub", states.len());
        Ok(states)
    }

    #[tracing::instrument(skip(self))]
    async fn state(&self, entity_id: &str) -> Result<Option<EntityState>> {
        let url = self.url(&format!("/api/states/{}", entity_id));
        let response = self.send(self.request(reqwest::Method::GET, &url), &url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        check_status(&response, &url)?;

        Ok(Some(Self::decode(response, &url).await?))
    }

    #[tracing::instrument(skip(self))]
    async fn call_service(&self, domain: &str, service: &str, call: &ServiceCall) -> Result<()> {
        let url = self.url(&format!("/api/services/{}/{}", domain, service));
        let response = self
            .send(self.request(reqwest::Method::POST, &url).json(call), &url)
            .await?;
        check_status(&response, &url)?;

        debug!("Called {}.{} for {}", domain, service, call.entity_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;

    fn hub_for(server: &mockito::ServerGuard, token: Option<&str>) -> RestHub {
        RestHub::new(
            &server.url(),
            token.map(str::to_string),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_states_sends_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/states")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"entity_id": "light.kitchen", "state": "on", "attributes": {"brightness": 255}},
                    {"entity_id": "sun.sun", "state": "above_horizon", "attributes": {}}
                ]"#,
            )
            .create_async()
            .await;

        let hub = hub_for(&server, Some("secret"));
        let states = hub.states().await.unwrap();

        mock.assert_async().await;
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].entity_id, "light.kitchen");
        assert_eq!(states[0].brightness(), Some(255));
    }

    #[tokio::test]
    async fn test_states_http_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/states")
            .with_status(401)
            .create_async()
            .await;

        let hub = hub_for(&server, None);
        let err = hub.states().await.unwrap_err();
        assert!(matches!(err, HubError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_states_bad_body_is_decode_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/states")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let hub = hub_for(&server, None);
        let err = hub.states().await.unwrap_err();
        assert!(matches!(err, HubError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_single_state_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/states/light.gone")
            .with_status(404)
            .create_async()
            .await;

        let hub = hub_for(&server, None);
        assert_eq!(hub.state("light.gone").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_turn_on_posts_service_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/services/light/turn_on")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::Json(serde_json::json!({
                "entity_id": "light.kitchen",
                "brightness_pct": 60
            })))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let hub = hub_for(&server, Some("secret"));
        hub.turn_on("light.kitchen", Some(60)).await.unwrap();

        mock.assert_async().await;
    }

    #[test]
    fn test_rejects_non_http_url() {
        let err = RestHub::new("homeassistant.local:8123", None, Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, HubError::Config(_)));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let hub = RestHub::new("http://hub:8123/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(hub.url("/api/states"), "http://hub:8123/api/states");
    }
}
