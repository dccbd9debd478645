use thiserror::Error;

/// Failures while reading or mutating the widget document.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("no element with id '{0}' in the document")]
    MissingId(String),

    #[error("no city row with id '{0}' in the document")]
    MissingRow(String),
}

/// Everything the controller can surface to its caller.
#[derive(Debug, Error)]
pub enum WidgetError {
    #[error("city search failed: {0:#}")]
    Search(anyhow::Error),

    #[error("could not load current conditions for {city}: {source:#}")]
    Conditions {
        city: String,
        source: anyhow::Error,
    },

    #[error("forecast lookup failed: {0:#}")]
    Forecast(anyhow::Error),

    #[error(transparent)]
    Document(#[from] DocumentError),
}
