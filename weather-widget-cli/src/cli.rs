use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::Mutex;
use weather_widget_core::{
    CitySummary, CollectingNotifier, Config, ControllerSettings, Document, Notice, Notifier,
    ProviderId, SearchController, SearchOutcome, SubmitEvent, WeatherApi,
    document::{CITIES_ID, FORECAST_CONTAINER_ID, SEARCH_INPUT_ID},
    provider::default_provider_from_config,
    render,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-widget", version, about = "Weather lookup widget")]
pub struct Cli {
    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum Format {
    Html,
    #[default]
    Text,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store an API key for a provider.
    Configure {
        /// Provider short name, e.g. "weatherapi".
        provider: String,
    },

    /// Submit a search and print the rendered result list.
    Search {
        /// Search text, passed through as typed.
        query: String,

        #[arg(long, value_enum, default_value_t)]
        format: Format,
    },

    /// Show the forecast modal for a city locator.
    Forecast {
        /// Locator as returned by a search, e.g. "paris-ile-de-france-france".
        locator: String,

        #[arg(long, value_enum, default_value_t)]
        format: Format,
    },

    /// Print full city cards straight from the search response.
    Cities {
        query: String,

        #[arg(long, value_enum, default_value_t)]
        format: Format,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Search { query, format } => search(&query, format).await,
            Command::Forecast { locator, format } => forecast(&locator, format).await,
            Command::Cities { query, format } => cities(&query, format).await,
        }
    }
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    let api_key = inquire::Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    config.upsert_provider_api_key(id, api_key.trim().to_string());
    config.save()?;

    println!(
        "Saved credentials for {id} to {}",
        Config::config_file_path()?.display()
    );
    Ok(())
}

struct Session {
    controller: SearchController,
    notifier: CollectingNotifier,
    api: Arc<dyn WeatherApi>,
    no_results_message: String,
}

fn session() -> anyhow::Result<Session> {
    let config = Config::load()?;
    let api = default_provider_from_config(&config)?;
    let settings = ControllerSettings::try_from(&config.widget)?;
    let notifier = CollectingNotifier::new();

    let controller = SearchController::new(
        Arc::new(Mutex::new(Document::widget_page())),
        Arc::clone(&api),
        Arc::new(notifier.clone()),
        settings,
    );
    Ok(Session {
        controller,
        notifier,
        api,
        no_results_message: config.widget.no_results_message,
    })
}

async fn search(query: &str, format: Format) -> anyhow::Result<()> {
    let session = session()?;
    let doc = session.controller.document();
    {
        let mut doc = doc.lock().await;
        let input = doc.require_id(SEARCH_INPUT_ID)?;
        doc.set_value(input, query);
    }

    let mut event = SubmitEvent::new();
    let outcome = session.controller.handle_search(&mut event).await;
    let failures = session.controller.settle().await;
    tracing::debug!(?outcome, failures = failures.len(), "search finished");

    let doc = doc.lock().await;
    if let Ok(SearchOutcome::Populated { .. }) = outcome {
        print_node(&doc, CITIES_ID, format)?;
    }
    print_notices(&session.notifier);
    outcome.map(|_| ()).map_err(Into::into)
}

async fn forecast(locator: &str, format: Format) -> anyhow::Result<()> {
    let session = session()?;
    let result = session.controller.show_city_forecast(locator).await;

    if result.is_ok() {
        let doc = session.controller.document();
        let doc = doc.lock().await;
        print_node(&doc, FORECAST_CONTAINER_ID, format)?;
    }
    print_notices(&session.notifier);
    result.map(|_| ()).map_err(Into::into)
}

async fn cities(query: &str, format: Format) -> anyhow::Result<()> {
    let session = session()?;
    let cities = session.api.search_cities(query).await?;

    let doc = city_list(&cities, &session.notifier, &session.no_results_message)?;
    print_node(&doc, CITIES_ID, format)?;
    print_notices(&session.notifier);
    Ok(())
}

/// Lists raw search hits without row fetches; an empty list notifies like a search does.
fn city_list(
    cities: &[CitySummary],
    notifier: &dyn Notifier,
    no_results_message: &str,
) -> anyhow::Result<Document> {
    let mut doc = Document::widget_page();
    let list = doc.require_id(CITIES_ID)?;
    for city in cities {
        doc.append_child(list, render::create_city_element(city));
    }
    if cities.is_empty() {
        notifier.notify(Notice::info(no_results_message));
    }
    Ok(doc)
}

fn print_node(doc: &Document, id: &str, format: Format) -> anyhow::Result<()> {
    let node = doc.require_id(id)?;
    match format {
        Format::Html => println!("{}", doc.to_html(node)),
        Format::Text => print!("{}", doc.to_text_tree(node)),
    }
    Ok(())
}

fn print_notices(notifier: &CollectingNotifier) {
    for notice in notifier.notices() {
        eprintln!("{notice}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_keeps_query_verbatim() {
        let cli = Cli::try_parse_from(["weather-widget", "search", " São Paulo ", "--format", "html"])
            .expect("valid args");

        match cli.command {
            Command::Search { query, format } => {
                assert_eq!(query, " São Paulo ");
                assert!(matches!(format, Format::Html));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn verbose_is_global_and_counted() {
        let cli = Cli::try_parse_from(["weather-widget", "forecast", "london", "-vv"])
            .expect("valid args");

        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Command::Forecast { format: Format::Text, .. }
        ));
    }

    #[test]
    fn empty_city_list_goes_through_the_notifier() {
        let notifier = CollectingNotifier::new();
        let doc = city_list(&[], &notifier, "Nenhuma cidade encontrada").expect("page has a list");

        let list = doc.require_id(CITIES_ID).unwrap();
        assert!(doc.children(list).is_empty());
        assert_eq!(
            notifier.notices(),
            [Notice::info("Nenhuma cidade encontrada")]
        );
    }

    #[test]
    fn city_list_renders_each_hit_quietly() {
        let notifier = CollectingNotifier::new();
        let city = CitySummary {
            name: "Paris".into(),
            country: "France".into(),
            temp: 15.0,
            condition: "Cloudy".into(),
            icon: "//cdn.weatherapi.com/weather/64x64/day/119.png".into(),
            url: "paris-ile-de-france-france".into(),
        };
        let doc = city_list(&[city], &notifier, "none").expect("page has a list");

        let list = doc.require_id(CITIES_ID).unwrap();
        assert_eq!(doc.children(list).len(), 1);
        assert!(notifier.notices().is_empty());
    }
}
