use async_trait::async_trait;
use loyalink_common::types::NewClient;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::error::{CrmError, Result};
use crate::{normalize_phone, CrmClient};

const PROVIDER: &str = "poster";

/// Maximum number of response-body characters kept in errors and logs.
const MAX_BODY_CHARS: usize = 500;

/// Connection settings for the Poster POS API.
#[derive(Debug, Clone)]
pub struct PosterConfig {
    /// API root ending in `/`, e.g. `https://joinposter.com/api/`.
    pub base_url: String,
    pub token: String,
    pub timeout: Duration,
    /// Loyalty group new clients are placed in.
    pub client_group_id: i64,
}

#[derive(Serialize)]
struct CreateClientRequest<'a> {
    client_name: &'a str,
    client_sex: i32,
    client_groups_id_client: i64,
    phone: &'a str,
    birthday: &'a str,
}

#[derive(Serialize)]
struct ChangeBonusRequest {
    client_id: i64,
    count: i64,
}

pub struct PosterClient {
    base_url: String,
    token: String,
    client_group_id: i64,
    client: Client,
}

impl PosterClient {
    pub fn new(config: PosterConfig) -> Result<Self> {
        if config.token.trim().is_empty() {
            return Err(CrmError::ConfigError("Poster API token is empty".into()));
        }
        let mut base_url = config.base_url;
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        let client = Client::builder()
            .use_rustls_tls()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            base_url,
            token: config.token,
            client_group_id: config.client_group_id,
            client,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}{}", self.base_url, method)
    }

    /// Sends the request and unwraps Poster's `{"response": ..}` / `{"error": ..}` envelope.
    async fn call(&self, method: &str, request: RequestBuilder) -> Result<Value> {
        // The token travels in the query string, so reqwest errors must not carry the URL.
        let resp = request
            .query(&[("token", self.token.as_str())])
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                tracing::error!(method, error = %e, "Poster request failed");
                CrmError::NetworkError(e)
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| e.without_url())?;

        if !status.is_success() {
            tracing::error!(method, status = status.as_u16(), body = %truncate(&body), "Poster returned non-success status");
            return Err(CrmError::HttpError {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                body: truncate(&body),
            });
        }

        let value: Value = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(method, error = %e, body = %truncate(&body), "Failed to parse Poster response");
            e
        })?;

        if let Some(err) = value.get("error") {
            let (code, message) = parse_api_error(err);
            tracing::error!(method, code = %code, message = %message, "Poster API error");
            return Err(CrmError::ApiResponseError {
                provider: PROVIDER.to_string(),
                code,
                message,
            });
        }

        Ok(value)
    }

    /// Looks a client up by phone, comparing digits only.
    pub async fn find_client_by_phone(&self, phone: &str) -> Result<Option<i64>> {
        tracing::info!(phone, "Looking up Poster client by phone");
        let request = self
            .client
            .get(self.endpoint("clients.getClients"))
            .query(&[("phone", phone)]);
        let value = self.call("clients.getClients", request).await?;

        let clients = value
            .get("response")
            .and_then(Value::as_array)
            .ok_or_else(|| unexpected("clients.getClients response is not a list"))?;

        let wanted = normalize_phone(phone);
        for client in clients {
            let matches = ["phone", "phone_number"].iter().any(|field| {
                client
                    .get(*field)
                    .and_then(Value::as_str)
                    .map(|p| !wanted.is_empty() && normalize_phone(p) == wanted)
                    .unwrap_or(false)
            });
            if matches {
                let id = client
                    .get("client_id")
                    .and_then(as_id)
                    .ok_or_else(|| unexpected("client_id is missing or not an integer"))?;
                tracing::info!(phone, client_id = id, "Poster client found");
                return Ok(Some(id));
            }
        }

        tracing::info!(phone, "Poster client not found");
        Ok(None)
    }

    pub async fn create_client(&self, client: &NewClient) -> Result<i64> {
        let payload = CreateClientRequest {
            client_name: &client.name,
            client_sex: client.sex,
            client_groups_id_client: self.client_group_id,
            phone: &client.phone,
            birthday: &client.birthday,
        };
        tracing::info!(phone = %client.phone, group = self.client_group_id, "Creating Poster client");

        let request = self
            .client
            .post(self.endpoint("clients.createClient"))
            .json(&payload);
        let value = self.call("clients.createClient", request).await?;

        let id = value
            .get("response")
            .and_then(as_id)
            .ok_or_else(|| unexpected("clients.createClient did not return a client id"))?;
        tracing::info!(client_id = id, "Poster client created");
        Ok(id)
    }
}

#[async_trait]
impl CrmClient for PosterClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn find_or_create_client(&self, client: &NewClient) -> Result<i64> {
        if let Some(id) = self.find_client_by_phone(&client.phone).await? {
            tracing::info!(client_id = id, "Client already registered, reusing");
            return Ok(id);
        }
        self.create_client(client).await
    }

    async fn grant_bonus(&self, client_id: i64, amount: i64) -> Result<()> {
        tracing::info!(client_id, amount, "Granting Poster client bonus");
        let request = self
            .client
            .post(self.endpoint("clients.changeClientBonus"))
            .json(&ChangeBonusRequest {
                client_id,
                count: amount,
            });
        self.call("clients.changeClientBonus", request).await?;
        Ok(())
    }
}

/// Poster returns ids either as JSON numbers or numeric strings.
fn as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_api_error(err: &Value) -> (String, String) {
    match err {
        Value::Object(map) => {
            let code = map
                .get("code")
                .or_else(|| map.get("error"))
                .map(value_to_string)
                .unwrap_or_default();
            let message = map
                .get("message")
                .map(value_to_string)
                .unwrap_or_default();
            (code, message)
        }
        other => (value_to_string(other), String::new()),
    }
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn unexpected(detail: &str) -> CrmError {
    CrmError::UnexpectedResponse {
        provider: PROVIDER.to_string(),
        detail: detail.to_string(),
    }
}

fn truncate(body: &str) -> String {
    if body.chars().count() <= MAX_BODY_CHARS {
        body.to_string()
    } else {
        let cut: String = body.chars().take(MAX_BODY_CHARS).collect();
        format!("{cut}... [truncated]")
    }
}
