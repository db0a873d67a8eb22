// Smart system REST client
//
// Wraps `reqwest::Client` with host-aware URL construction, JSON:API
// envelope handling, and exact-status checking. Token exchange lives in
// `auth.rs` as an inherent impl on the same type.

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::auth::AccessToken;
use crate::error::Error;
use crate::models::{
    Document, Location, MowerControl, NewResource, Resource, WebSocketAttributes,
    WebSocketRequest,
};
use crate::transport::TransportConfig;

const JSON_API: &str = "application/vnd.api+json";

pub const DEFAULT_AUTH_HOST: &str = "https://api.authentication.husqvarnagroup.dev";
pub const DEFAULT_SMART_HOST: &str = "https://api.smart.gardena.dev";

/// Application credentials issued by the developer portal.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: SecretString,
    pub api_secret: SecretString,
}

/// Base URLs of the two services the bridge talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub auth_host: Url,
    pub smart_host: Url,
}

impl Endpoints {
    /// The production hosts.
    pub fn production() -> Self {
        Self {
            auth_host: Url::parse(DEFAULT_AUTH_HOST).expect("static auth host is a valid URL"),
            smart_host: Url::parse(DEFAULT_SMART_HOST).expect("static smart host is a valid URL"),
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::production()
    }
}

/// Async client for the token endpoint and the smart system API.
///
/// Every request carries the `x-api-key` header; calls made after
/// authentication also carry the bearer token handed in by the caller.
/// The client itself holds no session state.
pub struct SmartClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    credentials: Credentials,
}

impl SmartClient {
    pub fn new(
        endpoints: Endpoints,
        credentials: Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client_with_api_key(&credentials.api_key)?;
        Ok(Self {
            http,
            endpoints,
            credentials,
        })
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    // ── URL builders ─────────────────────────────────────────────────

    pub(crate) fn auth_url(&self, path: &str) -> Result<Url, Error> {
        join(&self.endpoints.auth_host, path)
    }

    fn smart_url(&self, path: &str) -> Result<Url, Error> {
        join(&self.endpoints.smart_host, path)
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// List the locations the application has access to.
    pub async fn list_locations(&self, token: &AccessToken) -> Result<Vec<Location>, Error> {
        let url = self.smart_url("v1/locations")?;
        debug!("GET {url}");

        let resp = self.authorized(self.http.get(url), token).send().await?;
        let resp = expect_status(resp, StatusCode::OK, "location lookup").await?;
        let doc: Document<Vec<Location>> = decode(resp).await?;
        Ok(doc.data)
    }

    /// Request a fresh push-stream URL scoped to `location_id`.
    pub async fn create_websocket(
        &self,
        token: &AccessToken,
        location_id: &str,
    ) -> Result<Url, Error> {
        let url = self.smart_url("v1/websocket")?;
        debug!("POST {url}");

        let body = Document {
            data: NewResource {
                id: Uuid::new_v4().to_string(),
                kind: "WEBSOCKET",
                attributes: WebSocketRequest {
                    location_id: location_id.to_owned(),
                },
            },
        };

        let resp = self.send_json(self.http.post(url), token, &body).await?;
        let resp = expect_status(resp, StatusCode::CREATED, "websocket request").await?;
        let doc: Document<Resource<WebSocketAttributes>> = decode(resp).await?;

        if let Some(validity) = doc.data.attributes.validity {
            debug!(validity_secs = validity, "websocket URL issued");
        }
        Ok(Url::parse(&doc.data.attributes.url)?)
    }

    /// Send a control command to the mower service `service_id`.
    ///
    /// The service answers `202 Accepted` when it queues the command;
    /// every other status is reported as [`Error::Rejected`].
    pub async fn send_mower_command(
        &self,
        token: &AccessToken,
        service_id: &str,
        control: MowerControl,
    ) -> Result<(), Error> {
        let url = self.smart_url(&format!("v1/command/{service_id}"))?;
        debug!("PUT {url} command={:?} seconds={}", control.command, control.seconds);

        let body = Document {
            data: NewResource {
                id: Uuid::new_v4().to_string(),
                kind: "MOWER_CONTROL",
                attributes: control,
            },
        };

        let resp = self.send_json(self.http.put(url), token, &body).await?;
        expect_status(resp, StatusCode::ACCEPTED, "mower command").await?;
        Ok(())
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn authorized(
        &self,
        builder: reqwest::RequestBuilder,
        token: &AccessToken,
    ) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(token.secret().expose_secret())
            .header(reqwest::header::CONTENT_TYPE, JSON_API)
    }

    async fn send_json<B: Serialize + Sync>(
        &self,
        builder: reqwest::RequestBuilder,
        token: &AccessToken,
        body: &B,
    ) -> Result<reqwest::Response, Error> {
        let payload = serde_json::to_vec(body).map_err(|e| Error::Deserialization {
            message: format!("failed to encode request: {e}"),
            body: String::new(),
        })?;
        Ok(self.authorized(builder, token).body(payload).send().await?)
    }
}

fn join(base: &Url, path: &str) -> Result<Url, Error> {
    let base = base.as_str().trim_end_matches('/');
    Ok(Url::parse(&format!("{base}/{path}"))?)
}

/// Pass the response through if it carries exactly `expected`, otherwise
/// turn it into [`Error::Rejected`] with the (truncated) body.
pub(crate) async fn expect_status(
    resp: reqwest::Response,
    expected: StatusCode,
    operation: &'static str,
) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status == expected {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    Err(Error::Rejected {
        operation,
        status: status.as_u16(),
        body: preview(&body).to_owned(),
    })
}

pub(crate) async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", preview(&body)),
        body,
    })
}

fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
