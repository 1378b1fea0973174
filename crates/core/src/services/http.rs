//! Live adapter for the [`TaskApi`] port over HTTP.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::AppConfig;
use crate::error::{Result, TaskError};
use crate::services::api::TaskApi;
use crate::wire::{WireNewTask, WireTaskPatch};

#[derive(Debug, Clone)]
pub struct HttpTaskApi {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpTaskApi {
    /// Validates the base URL up front so a misconfiguration never reaches the network.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let base = config.api_url()?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| {
                TaskError::configuration(format!("Failed to build HTTP client: {err}"))
            })?;
        Ok(Self {
            client,
            base,
            token: config.token().map(str::to_string),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                TaskError::configuration(format!(
                    "Task API base URL '{}' cannot carry a path",
                    self.base
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, operation: &str, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await.map_err(|err| {
            let message = if err.is_timeout() {
                "request timed out".to_string()
            } else {
                err.to_string()
            };
            TaskError::network(self.base.as_str(), message)
        })?;

        let status = response.status();
        debug!(operation, status = status.as_u16(), "task api responded");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TaskError::api(operation, status.as_u16(), body));
        }
        Ok(response)
    }

    async fn read_json(&self, operation: &str, response: Response) -> Result<Value> {
        response.json::<Value>().await.map_err(|err| {
            TaskError::invalid_data(None, format!("{operation} returned unreadable JSON: {err}"))
        })
    }

    /// Body of a write the server already accepted. It is only informational, so
    /// an empty or non-JSON body yields `Null` instead of failing the mutation.
    async fn read_write_ack(&self, operation: &str, response: Response) -> Value {
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(operation, error = %err, "could not read write response body");
                return Value::Null;
            }
        };
        if bytes.is_empty() {
            return Value::Null;
        }
        serde_json::from_slice(&bytes).unwrap_or_else(|err| {
            debug!(operation, error = %err, "write response body is not JSON");
            Value::Null
        })
    }
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn list_tasks(&self) -> Result<Vec<Value>> {
        let operation = "GET /tasks";
        let url = self.endpoint(&["tasks"])?;
        let response = self.send(operation, self.request(Method::GET, url)).await?;
        match self.read_json(operation, response).await? {
            Value::Array(records) => Ok(records),
            other => Err(TaskError::invalid_data(
                None,
                format!("{operation} returned {} instead of a list", json_kind(&other)),
            )),
        }
    }

    async fn update_task(&self, id: &str, patch: &WireTaskPatch) -> Result<Value> {
        let operation = format!("PUT /tasks/{id}");
        let url = self.endpoint(&["tasks", id])?;
        let response = self
            .send(&operation, self.request(Method::PUT, url).json(patch))
            .await?;
        Ok(self.read_write_ack(&operation, response).await)
    }

    async fn delete_task(&self, id: &str) -> Result<()> {
        let operation = format!("DELETE /tasks/{id}");
        let url = self.endpoint(&["tasks", id])?;
        self.send(&operation, self.request(Method::DELETE, url))
            .await?;
        Ok(())
    }

    async fn create_task(&self, task: &WireNewTask) -> Result<Value> {
        let operation = "POST /tasks";
        let url = self.endpoint(&["tasks"])?;
        let response = self
            .send(operation, self.request(Method::POST, url).json(task))
            .await?;
        Ok(self.read_write_ack(operation, response).await)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
