//! Client for the remote identity service.

use std::time::Duration;

use fib_session::{LoginErrorCode, ResolveError};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConflictBody {
    error_code: Option<String>,
}

/// JSON client for `POST {service}/system/…` calls.
///
/// Calls are not retried; a timeout fails the login.
#[derive(Debug, Clone)]
pub struct IdentityServiceClient {
    http: Client,
    base: Url,
}

impl IdentityServiceClient {
    /// Creates a client with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(mut base: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        if !base.path().ends_with('/') {
            let dir = format!("{}/", base.path());
            base.set_path(&dir);
        }
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base })
    }

    /// Posts `body` to `path` and decodes the answer.
    ///
    /// A 409 answer becomes [`ResolveError::Rejected`], carrying its
    /// `errorCode` only when it is a recognised [`LoginErrorCode`].
    ///
    /// # Errors
    ///
    /// Returns a [`ResolveError`] for transport failures, unexpected status
    /// codes and undecodable bodies.
    pub async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, ResolveError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ResolveError::Transport(format!("invalid identity service URL: {e}")))?;

        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, timeout = e.is_timeout(), path, "identity service call failed");
                ResolveError::Transport(e.to_string())
            })?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            let code = response
                .json::<ConflictBody>()
                .await
                .ok()
                .and_then(|b| b.error_code)
                .and_then(|c| c.parse::<LoginErrorCode>().ok());
            tracing::info!(path, code = code.map(LoginErrorCode::as_str), "identity service rejected login");
            return Err(ResolveError::Rejected { code });
        }
        if !status.is_success() {
            tracing::warn!(path, status = status.as_u16(), "unexpected identity service status");
            return Err(ResolveError::UnexpectedStatus(status.as_u16()));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| ResolveError::InvalidResponse(e.to_string()))
    }
}
