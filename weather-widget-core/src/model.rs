use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One city matched by a search, with its current conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitySummary {
    pub name: String,
    pub country: String,
    pub temp: f64,
    pub condition: String,
    pub icon: String,
    /// Locator used for conditions and forecast lookups.
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentConditions {
    pub temp: f64,
    pub condition: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub max_temp: f64,
    pub min_temp: f64,
    pub condition: String,
    pub icon: String,
}
