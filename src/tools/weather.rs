//! Current weather for a coordinate pair via the Open-Meteo forecast API.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::tool::{ParameterKind, Tool, ToolSpec};

use super::{fetch_json, http_client, required_text, trim_base};

const NAME: &str = "get_weather_by_location";

pub struct WeatherTool {
    spec: ToolSpec,
    client: reqwest::Client,
    base_url: String,
}

impl WeatherTool {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            spec: ToolSpec::new(
                NAME,
                "Gets the current and upcoming weather from a latitude and longitude.",
            )
            .required("latitude", ParameterKind::String, "Latitude")
            .required("longitude", ParameterKind::String, "Longitude"),
            client: http_client(NAME, timeout_secs)?,
            base_url: trim_base(base_url),
        })
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, input: Value) -> Result<Value> {
        let latitude = required_text(&input, "latitude", NAME)?;
        let longitude = required_text(&input, "longitude", NAME)?;

        let url = format!(
            "{}/v1/forecast?latitude={}&longitude={}&current_weather=true",
            self.base_url,
            urlencoding::encode(&latitude),
            urlencoding::encode(&longitude)
        );
        let mut body = fetch_json(&self.client, NAME, &url).await?;
        match body.get_mut("current_weather").map(Value::take) {
            Some(current) if current.is_object() => Ok(current),
            _ => Err(AgentError::Protocol(
                "forecast response has no `current_weather`".into(),
            )),
        }
    }
}
