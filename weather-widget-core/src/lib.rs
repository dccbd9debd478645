//! Core library for the weather lookup widget.
//!
//! This crate defines:
//! - Shared domain models (city summaries, conditions, forecast days)
//! - Abstraction over the weather data source, plus a WeatherAPI.com client
//! - An in-memory document and the pure renderers that fill it
//! - The search controller that ties a submit to rendered rows
//! - Configuration & credentials handling
//!
//! It is used by `weather-widget-cli`, but can also drive other front ends.

pub mod config;
pub mod controller;
pub mod document;
pub mod error;
pub mod generation;
pub mod model;
pub mod notify;
pub mod provider;
pub mod render;

pub use config::{Config, ProviderConfig, WidgetConfig};
pub use controller::{ControllerSettings, SearchController, SearchOutcome, SubmitEvent};
pub use document::{Document, Element, NodeId};
pub use error::{DocumentError, WidgetError};
pub use model::{CitySummary, CurrentConditions, ForecastDay};
pub use notify::{CollectingNotifier, Notice, NoticeLevel, Notifier, TracingNotifier};
pub use provider::{ProviderId, WeatherApi};
