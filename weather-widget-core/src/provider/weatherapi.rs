use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, instrument, warn};

use crate::{
    config::WidgetConfig,
    model::{CitySummary, CurrentConditions, ForecastDay},
};

use super::WeatherApi;

/// Client for the weatherapi.com REST API.
#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    base_url: String,
    lang: Option<String>,
    http: Client,
}

impl WeatherApiProvider {
    pub fn with_settings(api_key: String, settings: &WidgetConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build HTTP client for WeatherAPI.com")?;

        Ok(Self {
            api_key,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            lang: settings.lang.clone(),
            http,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}/{endpoint}", self.base_url);

        let mut query = vec![("key", self.api_key.as_str())];
        query.extend_from_slice(params);
        if let Some(lang) = &self.lang {
            query.push(("lang", lang.as_str()));
        }

        let res = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .with_context(|| format!("Failed to send request to WeatherAPI.com ({endpoint})"))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .with_context(|| format!("Failed to read WeatherAPI {endpoint} response body"))?;

        if !status.is_success() {
            return Err(anyhow::anyhow!(
                "WeatherAPI {} request failed with status {}: {}",
                endpoint,
                status,
                truncate_body(&body),
            ));
        }

        serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse WeatherAPI {endpoint} JSON"))
    }

    async fn fetch_current(&self, locator: &str) -> Result<CurrentConditions> {
        let parsed: WaCurrentResponse = self.get_json("current.json", &[("q", locator)]).await?;

        Ok(CurrentConditions {
            temp: parsed.current.temp_c,
            condition: parsed.current.condition.text,
            icon: absolute_icon_url(&parsed.current.condition.icon),
        })
    }
}

#[derive(Debug, Deserialize)]
struct WaSearchHit {
    name: String,
    country: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: f64,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaCurrentResponse {
    current: WaCurrent,
}

#[derive(Debug, Deserialize)]
struct WaDay {
    maxtemp_c: f64,
    mintemp_c: f64,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaForecastDay {
    date: NaiveDate,
    day: WaDay,
}

#[derive(Debug, Deserialize)]
struct WaForecast {
    forecastday: Vec<WaForecastDay>,
}

#[derive(Debug, Deserialize)]
struct WaForecastResponse {
    forecast: WaForecast,
}

#[async_trait]
impl WeatherApi for WeatherApiProvider {
    #[instrument(skip(self))]
    async fn search_cities(&self, query: &str) -> Result<Vec<CitySummary>> {
        let hits: Vec<WaSearchHit> = self.get_json("search.json", &[("q", query)]).await?;
        debug!(matches = hits.len(), "city search returned");

        let conditions = join_all(hits.iter().map(|hit| self.fetch_current(&hit.url))).await;

        Ok(hits
            .into_iter()
            .zip(conditions)
            .map(|(hit, now)| {
                // The city still matched; rows fetch their own conditions later.
                let now = now.unwrap_or_else(|err| {
                    warn!(
                        city = %hit.name,
                        error = %format!("{err:#}"),
                        "no current conditions for search hit"
                    );
                    CurrentConditions::default()
                });
                CitySummary {
                    name: hit.name,
                    country: hit.country,
                    temp: now.temp,
                    condition: now.condition,
                    icon: now.icon,
                    url: hit.url,
                }
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn get_weather_by_city(&self, locator: &str) -> Result<CurrentConditions> {
        self.fetch_current(locator).await
    }

    #[instrument(skip(self))]
    async fn get_forecast(&self, locator: &str, days: u8) -> Result<Vec<ForecastDay>> {
        let days = days.to_string();
        let parsed: WaForecastResponse = self
            .get_json("forecast.json", &[("q", locator), ("days", days.as_str())])
            .await?;

        Ok(parsed
            .forecast
            .forecastday
            .into_iter()
            .map(|entry| ForecastDay {
                date: entry.date,
                max_temp: entry.day.maxtemp_c,
                min_temp: entry.day.mintemp_c,
                condition: entry.day.condition.text,
                icon: absolute_icon_url(&entry.day.condition.icon),
            })
            .collect())
    }
}

/// WeatherAPI.com returns protocol-relative icon URLs.
fn absolute_icon_url(icon: &str) -> String {
    if icon.starts_with("//") {
        format!("https:{icon}")
    } else {
        icon.to_string()
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
