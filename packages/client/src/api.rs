//! HTTP / SSE access to the realtime server.

use std::pin::Pin;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use reqwest::{Response, StatusCode};
use switchboard_server::infrastructure::dto::{
    event::EventEnvelope,
    http::{ErrorResponse, IssueTokenResponse, SendEventRequest},
};

use crate::error::ClientError;

/// 認証レイヤーが付与する identity ヘッダー
const USER_ID_HEADER: &str = "x-user-id";
const USER_ROLE_HEADER: &str = "x-user-role";

/// Envelopes received on an open stream
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope, ClientError>> + Send>>;

/// A freshly minted stream token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTicket {
    pub token: String,
    pub connection_id: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PortalApi: Send + Sync {
    /// Mint a single-use stream token for the caller
    async fn issue_token(&self) -> Result<StreamTicket, ClientError>;

    /// Open the push stream with a token from `issue_token`
    async fn open_stream(&self, token: &str) -> Result<EventStream, ClientError>;

    /// Send an event over the connection's inbound endpoint
    async fn send_event(
        &self,
        connection_id: &str,
        request: &SendEventRequest,
    ) -> Result<(), ClientError>;
}

pub struct HttpPortalApi {
    http: reqwest::Client,
    base_url: String,
    user_id: String,
    role: String,
}

impl HttpPortalApi {
    pub fn new(base_url: &str, user_id: &str, role: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: user_id.to_string(),
            role: role.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl PortalApi for HttpPortalApi {
    async fn issue_token(&self) -> Result<StreamTicket, ClientError> {
        let response = self
            .http
            .post(self.url("/api/realtime/token"))
            .header(USER_ID_HEADER, &self.user_id)
            .header(USER_ROLE_HEADER, &self.role)
            .send()
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;
        let response = check_status(response).await?;

        let body: IssueTokenResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Connection(format!("Invalid token response: {}", e)))?;
        tracing::debug!("Issued stream token for connection {}", body.connection_id);

        Ok(StreamTicket {
            token: body.token,
            connection_id: body.connection_id,
        })
    }

    async fn open_stream(&self, token: &str) -> Result<EventStream, ClientError> {
        let response = self
            .http
            .get(self.url("/api/realtime/stream"))
            .query(&[("token", token)])
            .send()
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;
        let response = check_status(response).await?;

        let stream = response.bytes_stream().eventsource().map(|item| match item {
            Ok(event) => serde_json::from_str::<EventEnvelope>(&event.data)
                .map_err(|e| ClientError::Connection(format!("Malformed event: {}", e))),
            Err(e) => Err(ClientError::Connection(e.to_string())),
        });
        Ok(Box::pin(stream))
    }

    async fn send_event(
        &self,
        connection_id: &str,
        request: &SendEventRequest,
    ) -> Result<(), ClientError> {
        let response = self
            .http
            .post(self.url(&format!(
                "/api/realtime/connections/{}/events",
                connection_id
            )))
            .header(USER_ID_HEADER, &self.user_id)
            .header(USER_ROLE_HEADER, &self.role)
            .json(request)
            .send()
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;
        check_status(response).await?;
        Ok(())
    }
}

/// Map a non-success response onto `ClientError`.
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = match response.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    };
    Err(classify_status(status, message))
}

fn classify_status(status: StatusCode, message: String) -> ClientError {
    match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized(message),
        // 接続が回収済み (404) やサーバーエラーは接続をやり直す
        StatusCode::NOT_FOUND => ClientError::Connection(message),
        s if s.is_server_error() => ClientError::Connection(message),
        s => ClientError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}
