//! Generic outbound HTTP tool, letting a workflow call an external API
//! (a CRM lookup, an order-status endpoint) mid-conversation.

use async_trait::async_trait;
use serde::Deserialize;

use super::{ParameterType, ToolHandler, ToolMetadata, ToolParameter};
use crate::error::{VoxError, VoxResult};
use crate::telephony::http_pool;

#[derive(Deserialize)]
struct HttpToolArgs {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    body: Option<serde_json::Value>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Calls an arbitrary HTTP(S) endpoint and returns its JSON (or raw text)
/// response. Connections are reused per base URL via the shared client
/// pool, the same as the telephony provider adapters.
#[derive(Default)]
pub struct HttpTool;

#[async_trait]
impl ToolHandler for HttpTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "http_request".into(),
            description: "Makes an HTTP request to an external URL and returns the response body.".into(),
            parameters: vec![
                ToolParameter {
                    name: "url".into(),
                    description: "The absolute URL to request.".into(),
                    parameter_type: ParameterType::String,
                    required: true,
                },
                ToolParameter {
                    name: "method".into(),
                    description: "HTTP method: GET, POST, PUT, PATCH, or DELETE. Defaults to GET.".into(),
                    parameter_type: ParameterType::String,
                    required: false,
                },
                ToolParameter {
                    name: "body".into(),
                    description: "Optional JSON body for POST/PUT/PATCH requests.".into(),
                    parameter_type: ParameterType::Object,
                    required: false,
                },
            ],
        }
    }

    async fn call(&self, arguments: serde_json::Value) -> VoxResult<serde_json::Value> {
        let args: HttpToolArgs = serde_json::from_value(arguments)?;
        let base_url = base_url_of(&args.url)?;
        let client = http_pool::get_or_create_client(&base_url);

        let method = args.method.to_uppercase();
        let mut request = match method.as_str() {
            "GET" => client.get(&args.url),
            "POST" => client.post(&args.url),
            "PUT" => client.put(&args.url),
            "PATCH" => client.patch(&args.url),
            "DELETE" => client.delete(&args.url),
            other => return Err(VoxError::ToolFailed("http_request".into(), format!("unsupported method '{other}'"))),
        };
        if let Some(body) = &args.body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = serde_json::from_str::<serde_json::Value>(&text).unwrap_or(serde_json::Value::String(text));
        Ok(serde_json::json!({ "status": status, "body": body }))
    }
}

fn base_url_of(url: &str) -> VoxResult<String> {
    let parsed = reqwest::Url::parse(url).map_err(|e| VoxError::ToolFailed("http_request".into(), e.to_string()))?;
    Ok(format!(
        "{}://{}",
        parsed.scheme(),
        parsed.host_str().unwrap_or_default()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_strips_path_and_query() {
        let base = base_url_of("https://api.example.com/v1/orders?id=1").unwrap();
        assert_eq!(base, "https://api.example.com");
    }

    #[tokio::test]
    async fn rejects_unsupported_method() {
        let tool = HttpTool;
        let result = tool
            .call(serde_json::json!({"url": "https://example.com", "method": "TRACE"}))
            .await;
        assert!(result.is_err());
    }
}
