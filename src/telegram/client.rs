//! Bot API HTTP client.

use crate::transport::TransportError;
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Bot API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Fallback wait when a 429 carries no `retry_after`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
struct ApiResponse<R> {
    ok: bool,
    #[serde(default = "Option::default")]
    result: Option<R>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

/// The bot account, as returned by `getMe`.
#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    /// Numeric user id.
    pub id: i64,
    /// Bot username without `@`.
    #[serde(default)]
    pub username: Option<String>,
}

/// Minimal async Bot API client.
///
/// The bot token is part of every request URL, so it is kept in a
/// [`SecretString`] and stripped from transport errors.
#[derive(Debug)]
pub struct BotApiClient {
    http: reqwest::Client,
    base: String,
    token: SecretString,
}

impl BotApiClient {
    /// Creates a client for `api_base` with a per-request timeout.
    pub fn new(token: SecretString, api_base: &str, request_timeout: Duration) -> Result<Self> {
        if token.expose_secret().trim().is_empty() {
            return Err(Error::Config("telegram bot token is empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("chanwatch/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::operation("build_http_client", e))?;

        Ok(Self {
            http,
            base: api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Calls `getMe`, verifying the token.
    pub async fn get_me(&self) -> std::result::Result<BotUser, TransportError> {
        self.call("getMe", &serde_json::json!({}), None).await
    }

    /// Calls a Bot API method.
    ///
    /// `timeout` overrides the client timeout for long-polling calls.
    pub(crate) async fn call<P, R>(
        &self,
        method: &str,
        params: &P,
        timeout: Option<Duration>,
    ) -> std::result::Result<R, TransportError>
    where
        P: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/bot{}/{method}", self.base, self.token.expose_secret());
        let mut request = self.http.post(url).json(params);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| {
            let e = e.without_url();
            tracing::debug!(method, error = %e, is_timeout = e.is_timeout(), "Bot API request failed");
            TransportError::Network(e.to_string())
        })?;

        let status = response.status().as_u16();
        let retry_after_header = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.without_url().to_string()))?;

        interpret_response(status, retry_after_header, &body)
    }
}

/// Maps an HTTP status and body to the method result or a transport error.
fn interpret_response<R: DeserializeOwned>(
    status: u16,
    retry_after_header: Option<u64>,
    body: &str,
) -> std::result::Result<R, TransportError> {
    let parsed: ApiResponse<R> = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) if status == 429 => {
            tracing::debug!(error = %e, "Unparseable 429 body");
            return Err(TransportError::RateLimited {
                retry_after: retry_after_header.map_or(DEFAULT_RETRY_AFTER, Duration::from_secs),
            });
        },
        Err(e) => {
            return Err(TransportError::Rejected {
                status,
                description: format!("unparseable response: {e}"),
            });
        },
    };

    if parsed.ok {
        return parsed.result.ok_or_else(|| TransportError::Rejected {
            status,
            description: "response without result".to_string(),
        });
    }

    let code = parsed.error_code.unwrap_or(status);
    let retry_after = parsed
        .parameters
        .and_then(|p| p.retry_after)
        .or(retry_after_header);
    if code == 429 || status == 429 {
        return Err(TransportError::RateLimited {
            retry_after: retry_after.map_or(DEFAULT_RETRY_AFTER, Duration::from_secs),
        });
    }

    Err(TransportError::Rejected {
        status: code,
        description: parsed
            .description
            .unwrap_or_else(|| "no description".to_string()),
    })
}
