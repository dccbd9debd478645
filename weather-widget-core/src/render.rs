//! Pure builders that turn weather records into element trees.

use chrono::{Locale, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::{
    document::{Document, Element, FORECAST_CONTAINER_ID, HIDDEN_CLASS, WEEKDAYS_ID},
    error::DocumentError,
    model::{CitySummary, CurrentConditions, ForecastDay},
};

pub const ROW_ID_ATTR: &str = "data-row-id";
pub const LOCATOR_ATTR: &str = "data-locator";
pub const FORECAST_BUTTON_LABEL: &str = "Show Forecast";

const LOW_RES_ICON: &str = "64x64";
const HIGH_RES_ICON: &str = "128x128";

/// Builds a detached element with a space-separated class list and text.
pub fn create_element(tag: &str, class_list: &str, text: &str) -> Element {
    Element {
        tag: tag.to_string(),
        classes: class_list.split_whitespace().map(str::to_string).collect(),
        text: text.to_string(),
        ..Default::default()
    }
}

/// Swaps the icon size segment for the high-resolution one, if present.
pub fn upgrade_icon(url: &str) -> String {
    url.replacen(LOW_RES_ICON, HIGH_RES_ICON, 1)
}

/// Short weekday name for the day after `date`.
///
/// Forecast dates are labelled one day ahead of what the API reports.
pub fn weekday_label(date: NaiveDate, locale: Locale) -> String {
    // `NaiveDate::MAX` has no successor; it is labelled as-is.
    let shown = date.succ_opt().unwrap_or(date);
    Utc.from_utc_datetime(&shown.and_time(NaiveTime::MIN))
        .format_localized("%a", locale)
        .to_string()
}

fn icon(class_list: &str, src: &str) -> Element {
    create_element("img", class_list, "").with_attr("src", upgrade_icon(src))
}

pub fn create_forecast(forecast: &ForecastDay, locale: Locale) -> Element {
    let temps = create_element("div", "forecast-temp-container", "")
        .with_child(create_element("span", "forecast-temp max", "max"))
        .with_child(create_element("span", "forecast-temp min", "min"))
        .with_child(create_element(
            "span",
            "forecast-temp max",
            &format!("{}º", forecast.max_temp),
        ))
        .with_child(create_element(
            "span",
            "forecast-temp min",
            &format!("{}º", forecast.min_temp),
        ));

    let middle = create_element("div", "forecast-middle-container", "")
        .with_child(temps)
        .with_child(icon("forecast-icon", &forecast.icon));

    create_element("div", "forecast", "")
        .with_child(create_element(
            "p",
            "forecast-weekday",
            &weekday_label(forecast.date, locale),
        ))
        .with_child(middle)
        .with_child(create_element("p", "forecast-condition", &forecast.condition))
}

/// Replaces the modal's forecast list and reveals the modal.
pub fn show_forecast(
    doc: &mut Document,
    forecasts: &[ForecastDay],
    locale: Locale,
) -> Result<(), DocumentError> {
    let container = doc.require_id(FORECAST_CONTAINER_ID)?;
    let weekdays = doc.require_id(WEEKDAYS_ID)?;

    doc.clear_children(weekdays);
    for forecast in forecasts {
        doc.append_child(weekdays, create_forecast(forecast, locale));
    }
    doc.remove_class(container, HIDDEN_CLASS);
    Ok(())
}

/// Full list item for a city, current conditions included.
pub fn create_city_element(city: &CitySummary) -> Element {
    let heading = create_element("div", "city-heading", "")
        .with_child(create_element("h2", "city-name", &city.name))
        .with_child(create_element("p", "city-country", &city.country));

    let temps = create_element("div", "city-temp-container", "")
        .with_child(create_element("p", "city-condition", &city.condition))
        .with_child(create_element("p", "city-temp", &format!("{}º", city.temp)));

    let info = create_element("div", "city-info-container", "")
        .with_child(temps)
        .with_child(icon("condition-icon", &city.icon));

    create_element("li", "city", "")
        .with_child(heading)
        .with_child(info)
}

/// Basic search-result row: heading plus forecast trigger, no conditions yet.
pub fn create_city_row(city: &CitySummary, row_id: &str) -> Element {
    let heading = create_element("div", "city-heading", "")
        .with_attr(ROW_ID_ATTR, row_id)
        .with_child(create_element("p", "city-name", &city.name))
        .with_child(create_element("p", "city-country", &city.country));

    let button = create_element("button", "city-forecast-button", FORECAST_BUTTON_LABEL)
        .with_attr(LOCATOR_ATTR, city.url.as_str());

    create_element("div", "city", "")
        .with_attr(ROW_ID_ATTR, row_id)
        .with_child(heading)
        .with_child(button)
}

/// Block spliced after a row's heading once conditions arrive.
pub fn create_info_block(conditions: &CurrentConditions) -> Element {
    let temps = create_element("div", "city-temp-container", "")
        .with_child(create_element("p", "city-condition", &conditions.condition))
        .with_child(create_element(
            "p",
            "city-temp",
            &format!("{}°C", conditions.temp),
        ));

    create_element("div", "city-info-container", "")
        .with_child(temps)
        .with_child(icon("condition-icon", &conditions.icon))
}
