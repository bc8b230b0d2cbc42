use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned {status}: {error}")]
    Status { status: u16, error: String },

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRecord {
    pub id: u32,
    pub timestamp: String,
    pub value: f64,
    pub status: String,
    pub processing_time_ms: f64,
}

/// Result of one call to the simulated business operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DataOutcome {
    Processed(DataRecord),
    /// The service reported a (simulated) processing failure.
    Failed { status: u16, error: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

impl LogRequest {
    pub fn new(level: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Some(level.into()),
            message: Some(message.into()),
            fields: Map::new(),
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogAck {
    pub status: String,
    pub level: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct ServiceClient {
    client: Client,
    base_url: String,
}

impl ServiceClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `GET /`.
    pub async fn health(&self) -> Result<Health, ClientError> {
        let resp = self.client.get(self.url("/")).send().await?;
        decode(resp).await
    }

    /// `GET /metrics`, the raw exposition text.
    pub async fn metrics(&self) -> Result<String, ClientError> {
        let resp = self.client.get(self.url("/metrics")).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                error: text,
            });
        }
        Ok(text)
    }

    /// `GET /api/data`. A simulated failure is an `Ok(DataOutcome::Failed)`.
    pub async fn fetch_data(&self) -> Result<DataOutcome, ClientError> {
        let resp = self.client.get(self.url("/api/data")).send().await?;
        if resp.status() == StatusCode::INTERNAL_SERVER_ERROR {
            let status = resp.status().as_u16();
            let body: ErrorBody = serde_json::from_str(&resp.text().await?)?;
            return Ok(DataOutcome::Failed {
                status,
                error: body.error,
            });
        }
        decode(resp).await.map(DataOutcome::Processed)
    }

    /// `POST /api/logs`.
    pub async fn trigger_log(&self, request: &LogRequest) -> Result<LogAck, ClientError> {
        let resp = self
            .client
            .post(self.url("/api/logs"))
            .json(request)
            .send()
            .await?;
        decode(resp).await
    }

    /// Any `GET`, returning status and JSON body (`Null` if not JSON).
    pub async fn get_json(&self, path: &str) -> Result<(u16, Value), ClientError> {
        let resp = self.client.get(self.url(path)).send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        Ok((status, serde_json::from_str(&text).unwrap_or(Value::Null)))
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let status = resp.status();
    let text = resp.text().await?;

    if !status.is_success() {
        let error = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);
        return Err(ClientError::Status {
            status: status.as_u16(),
            error,
        });
    }

    Ok(serde_json::from_str(&text)?)
}
