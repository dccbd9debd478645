use crate::{
    Config, CitySummary, CurrentConditions, ForecastDay,
    provider::weatherapi::WeatherApiProvider,
};
use async_trait::async_trait;
use std::{convert::TryFrom, fmt::Debug, sync::Arc};

pub mod weatherapi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    WeatherApi,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::WeatherApi => "weatherapi",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::WeatherApi]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "weatherapi" => Ok(ProviderId::WeatherApi),
            _ => {
                let supported: Vec<&str> =
                    ProviderId::all().iter().map(ProviderId::as_str).collect();
                Err(anyhow::anyhow!(
                    "Unknown provider '{value}'. Supported providers: {}.",
                    supported.join(", ")
                ))
            }
        }
    }
}

/// The weather data source the widget renders from.
#[async_trait]
pub trait WeatherApi: Send + Sync + Debug {
    /// Cities matching `query`, each with its current conditions. Empty means no match.
    async fn search_cities(&self, query: &str) -> anyhow::Result<Vec<CitySummary>>;

    async fn get_weather_by_city(&self, locator: &str) -> anyhow::Result<CurrentConditions>;

    async fn get_forecast(&self, locator: &str, days: u8) -> anyhow::Result<Vec<ForecastDay>>;
}

/// Construct a provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
) -> anyhow::Result<Arc<dyn WeatherApi>> {
    let api_key = config.provider_api_key(id).ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for provider '{id}'.\n\
                 Hint: run `weather-widget configure {id}` and enter your API key."
        )
    })?;

    let provider: Arc<dyn WeatherApi> = match id {
        ProviderId::WeatherApi => Arc::new(WeatherApiProvider::with_settings(
            api_key.to_owned(),
            &config.widget,
        )?),
    };

    Ok(provider)
}

/// Construct the default provider from config, using `default_provider` field.
pub fn default_provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherApi>> {
    let id = config.default_provider_id()?;
    provider_from_config(id, config)
}
