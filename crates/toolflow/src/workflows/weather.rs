//! Weather assistant: a tool loop with one live HTTP tool.
//!
//! `get_weather(latitude, longitude)` fetches the current conditions from
//! the public [Open-Meteo](https://open-meteo.com/) forecast API and returns
//! the `current` object of its response. The final answer is a
//! [`WeatherResponse`].

use crate::agent::{Answer, EventHandler, LoopConfig, ToolLoop};
use crate::error::{Error, Result};
use crate::structured::StructuredOutput;
use crate::tools::{ToolFuture, Toolbox, parse_arguments};
use crate::{ChatBackend, ToolDef};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

pub const OPEN_METEO_URL: &str = "https://api.open-meteo.com";
pub const SYSTEM_PROMPT: &str = "You are a helpful weather assistant.";
pub const DEFAULT_PROMPT: &str = "What's the weather like in Riga today?";

const TOOL_NAME: &str = "get_weather";
const FORECAST_TIMEOUT: Duration = Duration::from_secs(30);

/// Arguments of `get_weather`.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Final answer of the weather workflow.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct WeatherResponse {
    /// The current temperature in celsius for the given location.
    pub temperature: f64,
    /// A natural language response to the user's question.
    pub response: String,
}

impl StructuredOutput for WeatherResponse {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeatherCall {
    GetWeather(Coordinates),
}

/// Toolbox exposing `get_weather`.
pub struct WeatherToolbox {
    client: reqwest::Client,
    base_url: String,
    get_weather: ToolDef,
}

impl WeatherToolbox {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FORECAST_TIMEOUT)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: OPEN_METEO_URL.to_string(),
            get_weather: ToolDef::strict_for::<Coordinates>(
                TOOL_NAME,
                "Get current temperature for provided coordinates in celsius.",
            ),
        })
    }

    /// Point the tool at another Open-Meteo compatible host.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn forecast_url(&self, at: Coordinates) -> String {
        format!(
            "{}/v1/forecast?latitude={}&longitude={}\
             &current=temperature_2m,wind_speed_10m\
             &hourly=temperature_2m,relative_humidity_2m,wind_speed_10m",
            self.base_url, at.latitude, at.longitude
        )
    }

    /// Fetch the current conditions at `at`.
    pub async fn get_weather(&self, at: Coordinates) -> Result<serde_json::Value> {
        let fail = |reason: String| Error::tool_execution(TOOL_NAME, reason);
        let start = Instant::now();

        let resp = self
            .client
            .get(self.forecast_url(at))
            .send()
            .await
            .map_err(|e| fail(format!("request failed: {e}")))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| fail(format!("failed to read response: {e}")))?;

        debug!(
            "Open-Meteo: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(fail(format!("HTTP {status}: {text}")));
        }

        let mut data: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| fail(format!("invalid forecast JSON: {e}")))?;
        data.get_mut("current")
            .map(serde_json::Value::take)
            .ok_or_else(|| fail("forecast has no 'current' field".into()))
    }
}

impl Toolbox for WeatherToolbox {
    type Call = WeatherCall;

    fn definitions(&self) -> Vec<ToolDef> {
        vec![self.get_weather.clone()]
    }

    fn resolve(&self, name: &str, arguments: &str) -> Result<WeatherCall> {
        match name {
            TOOL_NAME => Ok(WeatherCall::GetWeather(parse_arguments(
                &self.get_weather,
                arguments,
            )?)),
            other => Err(Error::UnknownTool(other.to_string())),
        }
    }

    fn invoke(&self, call: WeatherCall) -> ToolFuture<'_> {
        Box::pin(async move {
            match call {
                WeatherCall::GetWeather(at) => self.get_weather(at).await,
            }
        })
    }
}

/// Ask the weather assistant `question`.
pub async fn ask<B: ChatBackend + ?Sized>(
    backend: &B,
    toolbox: &WeatherToolbox,
    config: LoopConfig,
    handler: &dyn EventHandler,
    question: &str,
) -> Result<Answer<WeatherResponse>> {
    ToolLoop::new(backend, toolbox, config)
        .with_event_handler(handler)
        .run_structured::<WeatherResponse>(SYSTEM_PROMPT, question)
        .await
}
