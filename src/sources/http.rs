use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::{DataSource, FetchOptions, Payload};
use crate::location::Location;

/// Source backed by a JSON HTTP endpoint.
///
/// The URL template may contain `{lat}`, `{lng}` and `{grid_hash}`; fetch
/// options are sent as query parameters. Timeouts are applied by the engine.
pub struct HttpJsonSource {
    name: String,
    url_template: String,
    client: reqwest::Client,
}

impl HttpJsonSource {
    pub fn new(name: impl Into<String>, url_template: impl Into<String>) -> Self {
        Self::with_client(name, url_template, reqwest::Client::new())
    }

    pub fn with_client(
        name: impl Into<String>,
        url_template: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            url_template: url_template.into(),
            client,
        }
    }

    pub fn render_url(&self, location: &Location) -> String {
        self.url_template
            .replace("{lat}", &location.lat().to_string())
            .replace("{lng}", &location.lng().to_string())
            .replace("{grid_hash}", location.grid_hash())
    }
}

fn query_pairs(options: &FetchOptions) -> Vec<(String, String)> {
    options
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), rendered)
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl DataSource for HttpJsonSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, location: &Location, options: &FetchOptions) -> Result<Payload> {
        let url = reqwest::Url::parse_with_params(&self.render_url(location), query_pairs(options))
            .with_context(|| format!("Invalid URL for {}", self.name))?;

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .header("User-Agent", "habitat-score")
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.name))?
            .error_for_status()
            .with_context(|| format!("{} returned an error status", self.name))?;

        let body: Value = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response as JSON", self.name))?;

        match body {
            Value::Object(map) => Ok(map),
            other => bail!(
                "Malformed {} response: expected a JSON object, got {}",
                self.name,
                json_kind(&other)
            ),
        }
    }
}
