// Client-credential token exchange.
//
// The token endpoint lives on a different host than the smart API and
// expects a form-encoded body. The returned bearer token is held by the
// caller (the session context), never by the client.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::client::{SmartClient, decode, expect_status};
use crate::error::Error;
use crate::models::TokenResponse;

/// A bearer token together with its declared lifetime.
#[derive(Debug, Clone)]
pub struct AccessToken {
    secret: SecretString,
    lifetime: Duration,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Wrap a raw token issued `lifetime` from now.
    pub fn new(secret: SecretString, lifetime: Duration) -> Self {
        let expires_at = TimeDelta::from_std(lifetime)
            .ok()
            .and_then(|delta| Utc::now().checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            secret,
            lifetime,
            expires_at,
        }
    }

    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    /// Lifetime the token endpoint declared.
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Time left until expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        (self.expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

impl SmartClient {
    /// Exchange the application key and secret for a bearer token.
    ///
    /// `POST {auth_host}/v1/oauth2/token` with the client-credentials grant.
    /// Anything but `200 OK` is reported as [`Error::Authentication`].
    pub async fn authenticate(&self) -> Result<AccessToken, Error> {
        let url = self.auth_url("v1/oauth2/token")?;
        debug!("requesting token at {url}");

        let credentials = self.credentials();
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", credentials.api_key.expose_secret()),
            ("client_secret", credentials.api_secret.expose_secret()),
        ];

        let resp = self.http().post(url).form(&form).send().await?;
        let resp = expect_status(resp, StatusCode::OK, "token exchange")
            .await
            .map_err(|e| match e {
                Error::Rejected { status, body, .. } => Error::Authentication { status, body },
                other => other,
            })?;

        let token: TokenResponse = decode(resp).await?;
        debug!(expires_in = token.expires_in, "token issued");

        Ok(AccessToken::new(
            SecretString::from(token.access_token),
            Duration::from_secs(token.expires_in),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_expiry_is_in_the_future() {
        let token = AccessToken::new("t".to_string().into(), Duration::from_secs(3600));
        assert!(!token.is_expired());
        assert!(token.remaining() > Duration::from_secs(3500));
        assert_eq!(token.lifetime(), Duration::from_secs(3600));
    }

    #[test]
    fn zero_lifetime_token_is_expired() {
        let token = AccessToken::new("t".to_string().into(), Duration::ZERO);
        assert!(token.is_expired());
        assert_eq!(token.remaining(), Duration::ZERO);
    }
}
