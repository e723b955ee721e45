use async_trait::async_trait;
use graphcore::{NodeError, NodeResult, NodeSpec, RunContext, Work};
use graphruntime::{ConfigField, WorkFactory, WorkKindInfo};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// HTTP request work. Server errors fail the attempt so retry policy applies.
pub struct HttpRequestWork {
    client: reqwest::Client,
    method: reqwest::Method,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<Value>,
}

#[async_trait]
impl Work for HttpRequestWork {
    async fn run(&self, ctx: RunContext) -> NodeResult {
        ctx.logger()
            .info(&format!("{} {}", self.method, self.url), None);

        let mut request = self.client.request(self.method.clone(), &self.url);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }
        if let Some(body) = &self.body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NodeError::WorkFailed(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let headers: Map<String, Value> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_str().unwrap_or("").to_string())))
            .collect();

        let body_text = response
            .text()
            .await
            .map_err(|e| NodeError::WorkFailed(format!("Failed to read response: {}", e)))?;

        if status.is_server_error() {
            return Err(NodeError::WorkFailed(format!("{} returned {}", self.url, status)));
        }

        Ok(json!({
            "status": status.as_u16(),
            "body": body_text,
            "headers": headers,
        }))
    }
}

pub struct HttpRequestWorkFactory;

impl WorkFactory for HttpRequestWorkFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Arc<dyn Work>, NodeError> {
        let url = spec
            .config_str("url")
            .ok_or_else(|| NodeError::Configuration("Missing config: url".to_string()))?
            .to_string();

        let method_name = spec.config_str("method").unwrap_or("GET").to_uppercase();
        let method = match method_name.as_str() {
            "GET" => reqwest::Method::GET,
            "POST" => reqwest::Method::POST,
            "PUT" => reqwest::Method::PUT,
            "DELETE" => reqwest::Method::DELETE,
            other => {
                return Err(NodeError::Configuration(format!(
                    "Unsupported method: {}",
                    other
                )))
            }
        };

        let headers = match spec.config.get("headers") {
            Some(Value::Object(map)) => map
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect(),
            _ => Vec::new(),
        };

        Ok(Arc::new(HttpRequestWork {
            client: reqwest::Client::new(),
            method,
            url,
            headers,
            body: spec.config.get("body").cloned(),
        }))
    }

    fn kind(&self) -> &str {
        "http.request"
    }

    fn info(&self) -> WorkKindInfo {
        WorkKindInfo {
            description: "Make HTTP requests".to_string(),
            category: "http".to_string(),
            config: vec![
                ConfigField::new("url", "Request URL", true),
                ConfigField::new("method", "GET, POST, PUT or DELETE (default GET)", false),
                ConfigField::new("headers", "Object of header values", false),
                ConfigField::new("body", "JSON body", false),
            ],
        }
    }
}
