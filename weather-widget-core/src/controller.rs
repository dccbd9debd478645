//! Search-and-render workflow.
//!
//! A submit clears the result list, searches, renders one basic row per
//! match and then fills every row with current conditions from its own task.
//! Rows are matched to their results by row id, and each search bumps a
//! generation so completions from an older search are dropped.

use std::sync::{Arc, MutexGuard, PoisonError};

use chrono::Locale;
use tokio::{
    sync::Mutex,
    task::{AbortHandle, JoinSet},
};
use tracing::{debug, info, warn};

use crate::{
    config::WidgetConfig,
    document::{CITIES_ID, Document, SEARCH_INPUT_ID},
    error::{DocumentError, WidgetError},
    generation::{GenerationGuard, row_id},
    model::CitySummary,
    notify::{Notice, Notifier},
    provider::WeatherApi,
    render::{self, ROW_ID_ATTR},
};

/// Form submission as seen by the controller.
#[derive(Debug, Default)]
pub struct SubmitEvent {
    default_prevented: bool,
}

impl SubmitEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// No city matched; the user was notified.
    Empty { generation: u64 },
    /// Rows were rendered and conditions lookups are running.
    Populated { generation: u64, rows: usize },
    /// A newer search started before this one got its results.
    Superseded { generation: u64 },
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub no_results_message: String,
    pub forecast_days: u8,
    pub locale: Locale,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        let widget = WidgetConfig::default();
        Self {
            no_results_message: widget.no_results_message,
            forecast_days: widget.forecast_days,
            locale: Locale::pt_BR,
        }
    }
}

impl TryFrom<&WidgetConfig> for ControllerSettings {
    type Error = anyhow::Error;

    fn try_from(widget: &WidgetConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            no_results_message: widget.no_results_message.clone(),
            forecast_days: widget.forecast_days,
            locale: widget.locale()?,
        })
    }
}

#[derive(Debug)]
pub struct SearchController {
    document: Arc<Mutex<Document>>,
    api: Arc<dyn WeatherApi>,
    notifier: Arc<dyn Notifier>,
    generations: Arc<GenerationGuard>,
    settings: ControllerSettings,
    // Never held across an await; `settle` joins a set taken out of here
    // while `aborts` still reaches its tasks.
    rows: std::sync::Mutex<JoinSet<Result<(), WidgetError>>>,
    aborts: std::sync::Mutex<Vec<AbortHandle>>,
}

fn lock<T>(mutex: &std::sync::Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SearchController {
    pub fn new(
        document: Arc<Mutex<Document>>,
        api: Arc<dyn WeatherApi>,
        notifier: Arc<dyn Notifier>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            document,
            api,
            notifier,
            generations: Arc::new(GenerationGuard::new()),
            settings,
            rows: std::sync::Mutex::new(JoinSet::new()),
            aborts: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn document(&self) -> Arc<Mutex<Document>> {
        Arc::clone(&self.document)
    }

    /// Handles a submit of the search form.
    ///
    /// Returns once the basic rows are in the document; conditions keep
    /// arriving in the background until [`SearchController::settle`].
    pub async fn handle_search(
        &self,
        event: &mut SubmitEvent,
    ) -> Result<SearchOutcome, WidgetError> {
        event.prevent_default();
        let generation = self.generations.advance();
        self.abort_rows();

        let query = {
            let mut doc = self.document.lock().await;
            let cities = doc.require_id(CITIES_ID)?;
            doc.clear_children(cities);
            let input = doc.require_id(SEARCH_INPUT_ID)?;
            doc.value(input).to_string()
        };
        info!(generation, query = %query, "searching cities");

        let results = match self.api.search_cities(&query).await {
            Ok(results) => results,
            Err(err) => {
                warn!(generation, error = %format!("{err:#}"), "city search failed");
                self.notifier
                    .notify(Notice::error(format!("City search failed: {err:#}")));
                return Err(WidgetError::Search(err));
            }
        };

        if !self.generations.is_current(generation) {
            debug!(generation, "search superseded before results arrived");
            return Ok(SearchOutcome::Superseded { generation });
        }

        if results.is_empty() {
            self.notifier
                .notify(Notice::info(self.settings.no_results_message.clone()));
            return Ok(SearchOutcome::Empty { generation });
        }

        let Some(row_ids) = self.render_rows(generation, &results).await? else {
            debug!(generation, "search superseded while rendering");
            return Ok(SearchOutcome::Superseded { generation });
        };

        let mut tasks = JoinSet::new();
        let mut handles = Vec::with_capacity(results.len());
        for (city, row) in results.into_iter().zip(row_ids) {
            let job = RowJob {
                document: Arc::clone(&self.document),
                api: Arc::clone(&self.api),
                notifier: Arc::clone(&self.notifier),
                generations: Arc::clone(&self.generations),
                generation,
                row_id: row,
                city,
            };
            handles.push(tasks.spawn(job.run()));
        }
        let rows = tasks.len();

        let mut aborts = lock(&self.aborts);
        if self.generations.is_current(generation) {
            for stale in aborts.drain(..) {
                stale.abort();
            }
            *aborts = handles;
            *lock(&self.rows) = tasks;
        } else {
            tasks.abort_all();
        }
        drop(aborts);

        Ok(SearchOutcome::Populated { generation, rows })
    }

    async fn render_rows(
        &self,
        generation: u64,
        results: &[CitySummary],
    ) -> Result<Option<Vec<String>>, WidgetError> {
        let mut doc = self.document.lock().await;
        if !self.generations.is_current(generation) {
            return Ok(None);
        }
        let cities = doc.require_id(CITIES_ID)?;

        let mut ids = Vec::with_capacity(results.len());
        for (index, city) in results.iter().enumerate() {
            let id = row_id(generation, index);
            doc.append_child(cities, render::create_city_row(city, &id));
            ids.push(id);
        }
        Ok(Some(ids))
    }

    fn abort_rows(&self) {
        for handle in lock(&self.aborts).drain(..) {
            handle.abort();
        }
    }

    /// Waits for every conditions lookup of the current search.
    ///
    /// Returns the errors of rows that failed; cancelled rows are skipped.
    /// A search submitted meanwhile still cancels the rows being waited on.
    pub async fn settle(&self) -> Vec<WidgetError> {
        let mut failures = Vec::new();
        let mut rows = std::mem::take(&mut *lock(&self.rows));
        while let Some(joined) = rows.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => failures.push(err),
                Err(err) if err.is_cancelled() => {}
                Err(err) => warn!(error = %err, "row task panicked"),
            }
        }
        failures
    }

    /// Fetches and shows the forecast modal for one city.
    pub async fn show_city_forecast(&self, locator: &str) -> Result<usize, WidgetError> {
        let days = match self
            .api
            .get_forecast(locator, self.settings.forecast_days)
            .await
        {
            Ok(days) => days,
            Err(err) => {
                warn!(locator, error = %format!("{err:#}"), "forecast lookup failed");
                self.notifier
                    .notify(Notice::error(format!("Forecast lookup failed: {err:#}")));
                return Err(WidgetError::Forecast(err));
            }
        };

        let mut doc = self.document.lock().await;
        render::show_forecast(&mut doc, &days, self.settings.locale)?;
        debug!(locator, days = days.len(), "forecast shown");
        Ok(days.len())
    }
}

struct RowJob {
    document: Arc<Mutex<Document>>,
    api: Arc<dyn WeatherApi>,
    notifier: Arc<dyn Notifier>,
    generations: Arc<GenerationGuard>,
    generation: u64,
    row_id: String,
    city: CitySummary,
}

impl RowJob {
    async fn run(self) -> Result<(), WidgetError> {
        let conditions = match self.api.get_weather_by_city(&self.city.url).await {
            Ok(conditions) => conditions,
            Err(source) => {
                warn!(
                    city = %self.city.name,
                    locator = %self.city.url,
                    error = %format!("{source:#}"),
                    "conditions lookup failed"
                );
                self.notifier.notify(Notice::error(format!(
                    "Could not load weather for {}: {source:#}",
                    self.city.name
                )));
                return Err(WidgetError::Conditions {
                    city: self.city.name,
                    source,
                });
            }
        };

        if !self.generations.is_current(self.generation) {
            debug!(row = %self.row_id, "dropping conditions for superseded search");
            return Ok(());
        }

        let mut doc = self.document.lock().await;
        let heading = doc
            .find_by_attr(ROW_ID_ATTR, &self.row_id)
            .and_then(|row| doc.child_with_class(row, "city-heading"))
            .ok_or_else(|| DocumentError::MissingRow(self.row_id.clone()))?;
        doc.insert_after(heading, render::create_info_block(&conditions))
            .ok_or_else(|| DocumentError::MissingRow(self.row_id.clone()))?;
        debug!(row = %self.row_id, city = %self.city.name, "conditions rendered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use futures::poll;
    use tokio::sync::oneshot;

    use super::*;
    use crate::{
        document::{FORECAST_CONTAINER_ID, HIDDEN_CLASS, WEEKDAYS_ID},
        model::{CurrentConditions, ForecastDay},
        notify::{CollectingNotifier, NoticeLevel},
    };

    type Gate = oneshot::Receiver<anyhow::Result<CurrentConditions>>;
    type SearchGate = oneshot::Receiver<anyhow::Result<Vec<CitySummary>>>;

    /// Search results are canned per query unless a gate is registered for
    /// it; conditions resolve when the test sends on the locator's gate.
    #[derive(Debug, Default)]
    struct FakeApi {
        searches: std::sync::Mutex<HashMap<String, anyhow::Result<Vec<CitySummary>>>>,
        search_gates: std::sync::Mutex<HashMap<String, SearchGate>>,
        gates: std::sync::Mutex<HashMap<String, Gate>>,
        conditions_calls: std::sync::Mutex<Vec<String>>,
        forecast: Vec<ForecastDay>,
    }

    impl FakeApi {
        fn with_search(self, query: &str, result: anyhow::Result<Vec<CitySummary>>) -> Self {
            self.searches.lock().unwrap().insert(query.into(), result);
            self
        }

        fn search_gate(&self, query: &str) -> oneshot::Sender<anyhow::Result<Vec<CitySummary>>> {
            let (tx, rx) = oneshot::channel();
            self.search_gates.lock().unwrap().insert(query.into(), rx);
            tx
        }

        fn gate(&self, locator: &str) -> oneshot::Sender<anyhow::Result<CurrentConditions>> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().insert(locator.into(), rx);
            tx
        }

        fn conditions_calls(&self) -> Vec<String> {
            self.conditions_calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WeatherApi for FakeApi {
        async fn search_cities(&self, query: &str) -> anyhow::Result<Vec<CitySummary>> {
            let gate = self.search_gates.lock().unwrap().remove(query);
            if let Some(rx) = gate {
                return rx.await.unwrap_or_else(|_| Err(anyhow::anyhow!("search gate dropped")));
            }
            match self.searches.lock().unwrap().remove(query) {
                Some(result) => result,
                None => Ok(Vec::new()),
            }
        }

        async fn get_weather_by_city(&self, locator: &str) -> anyhow::Result<CurrentConditions> {
            self.conditions_calls.lock().unwrap().push(locator.into());
            let gate = self.gates.lock().unwrap().remove(locator);
            match gate {
                Some(rx) => rx.await.unwrap_or_else(|_| Err(anyhow::anyhow!("gate dropped"))),
                None => Err(anyhow::anyhow!("no conditions for {locator}")),
            }
        }

        async fn get_forecast(&self, _locator: &str, days: u8) -> anyhow::Result<Vec<ForecastDay>> {
            Ok(self.forecast.iter().take(days.into()).cloned().collect())
        }
    }

    fn city(name: &str, country: &str, url: &str) -> CitySummary {
        CitySummary {
            name: name.into(),
            country: country.into(),
            temp: 0.0,
            condition: String::new(),
            icon: String::new(),
            url: url.into(),
        }
    }

    fn cloudy(temp: f64) -> CurrentConditions {
        CurrentConditions {
            temp,
            condition: "Cloudy".into(),
            icon: "https://cdn.example/64x64/cloud.png".into(),
        }
    }

    struct Harness {
        controller: SearchController,
        api: Arc<FakeApi>,
        notifier: CollectingNotifier,
    }

    fn harness(api: FakeApi) -> Harness {
        let api = Arc::new(api);
        let notifier = CollectingNotifier::new();
        let settings = ControllerSettings {
            no_results_message: "No city found".into(),
            forecast_days: 3,
            locale: Locale::en_US,
        };
        let controller = SearchController::new(
            Arc::new(Mutex::new(Document::widget_page())),
            Arc::clone(&api) as Arc<dyn WeatherApi>,
            Arc::new(notifier.clone()),
            settings,
        );
        Harness {
            controller,
            api,
            notifier,
        }
    }

    async fn type_query(controller: &SearchController, query: &str) {
        let doc = controller.document();
        let mut doc = doc.lock().await;
        let input = doc.require_id(SEARCH_INPUT_ID).unwrap();
        doc.set_value(input, query);
    }

    async fn submit(
        controller: &SearchController,
        query: &str,
    ) -> Result<SearchOutcome, WidgetError> {
        type_query(controller, query).await;
        let mut event = SubmitEvent::new();
        let outcome = controller.handle_search(&mut event).await;
        assert!(event.default_prevented());
        outcome
    }

    #[tokio::test]
    async fn paris_scenario_renders_row_then_info_block() {
        let api = FakeApi::default().with_search("Paris", Ok(vec![city("Paris", "FR", "/paris")]));
        let h = harness(api);
        let gate = h.api.gate("/paris");

        let outcome = submit(&h.controller, "Paris").await.unwrap();
        assert!(matches!(outcome, SearchOutcome::Populated { rows: 1, .. }));

        {
            let doc = h.controller.document();
            let doc = doc.lock().await;
            let cities = doc.require_id(CITIES_ID).unwrap();
            assert_eq!(doc.children(cities).len(), 1);
            let row = doc.children(cities)[0];
            // heading + forecast button, no conditions yet
            assert_eq!(doc.children(row).len(), 2);
            assert_eq!(doc.text_content(row), "ParisFRShow Forecast");
        }

        gate.send(Ok(cloudy(15.0))).unwrap();
        assert!(h.controller.settle().await.is_empty());

        let doc = h.controller.document();
        let doc = doc.lock().await;
        let headings = doc.query_class("city-heading");
        assert_eq!(headings.len(), 1);
        let row = doc.node(headings[0]).parent().unwrap();
        let children = doc.children(row);
        assert_eq!(children.len(), 3);
        assert_eq!(children[0], headings[0]);

        let info = children[1];
        assert!(doc.node(info).has_class("city-info-container"));
        assert_eq!(doc.text_content(info), "Cloudy15°C");
        let img = doc.children(info)[1];
        assert!(doc.node(img).attr("src").unwrap().contains("128x128"));
    }

    #[tokio::test]
    async fn empty_results_notify_once_and_fetch_nothing() {
        let h = harness(FakeApi::default());

        let outcome = submit(&h.controller, "Atlantis").await.unwrap();

        assert!(matches!(outcome, SearchOutcome::Empty { .. }));
        assert_eq!(h.notifier.notices(), [Notice::info("No city found")]);
        assert!(h.api.conditions_calls().is_empty());
        let doc = h.controller.document();
        let doc = doc.lock().await;
        let cities = doc.require_id(CITIES_ID).unwrap();
        assert!(doc.children(cities).is_empty());
    }

    #[tokio::test]
    async fn raw_query_is_passed_untrimmed() {
        let api = FakeApi::default().with_search("  rio ", Ok(vec![city("Rio", "BR", "/rio")]));
        let h = harness(api);
        let _gate = h.api.gate("/rio");

        let outcome = submit(&h.controller, "  rio ").await.unwrap();

        assert!(matches!(outcome, SearchOutcome::Populated { rows: 1, .. }));
    }

    #[tokio::test]
    async fn rows_are_rendered_in_order_before_any_conditions_resolve() {
        let api = FakeApi::default().with_search(
            "san",
            Ok(vec![
                city("San Diego", "US", "/sd"),
                city("Santiago", "CL", "/scl"),
                city("San José", "CR", "/sjo"),
            ]),
        );
        let h = harness(api);
        let gates = [h.api.gate("/sd"), h.api.gate("/scl"), h.api.gate("/sjo")];

        submit(&h.controller, "san").await.unwrap();

        {
            let doc = h.controller.document();
            let doc = doc.lock().await;
            let names: Vec<String> = doc
                .query_class("city-name")
                .into_iter()
                .map(|id| doc.text_content(id))
                .collect();
            assert_eq!(names, ["San Diego", "Santiago", "San José"]);
            assert_eq!(doc.query_class("city-forecast-button").len(), 3);
            assert!(doc.query_class("city-info-container").is_empty());
        }

        // Resolve out of order; each block still lands in its own row.
        let [sd, scl, sjo] = gates;
        sjo.send(Ok(cloudy(30.0))).unwrap();
        sd.send(Ok(cloudy(20.0))).unwrap();
        scl.send(Ok(cloudy(10.0))).unwrap();
        h.controller.settle().await;

        let doc = h.controller.document();
        let doc = doc.lock().await;
        let temps: Vec<String> = doc
            .query_class("city-temp")
            .into_iter()
            .map(|id| doc.text_content(id))
            .collect();
        assert_eq!(temps, ["20°C", "10°C", "30°C"]);
    }

    #[tokio::test]
    async fn second_search_discards_first_search_rows_and_results() {
        let api = FakeApi::default()
            .with_search("par", Ok(vec![city("Paris", "FR", "/paris")]))
            .with_search("lon", Ok(vec![city("London", "GB", "/london")]));
        let h = harness(api);
        let paris = h.api.gate("/paris");
        let london = h.api.gate("/london");

        submit(&h.controller, "par").await.unwrap();
        submit(&h.controller, "lon").await.unwrap();

        // The first search's task was aborted, so nobody is listening anymore.
        let _ = paris.send(Ok(cloudy(15.0)));
        london.send(Ok(cloudy(9.0))).unwrap();
        h.controller.settle().await;

        let doc = h.controller.document();
        let doc = doc.lock().await;
        let cities = doc.require_id(CITIES_ID).unwrap();
        assert_eq!(doc.children(cities).len(), 1);
        assert_eq!(doc.text_content(cities), "LondonGBCloudy9°CShow Forecast");
    }

    #[tokio::test]
    async fn stale_completion_is_dropped_by_generation_check() {
        let document = Arc::new(Mutex::new(Document::widget_page()));
        let api = Arc::new(FakeApi::default());
        let generations = Arc::new(GenerationGuard::new());
        let stale = generations.advance();
        {
            let mut doc = document.lock().await;
            let cities = doc.require_id(CITIES_ID).unwrap();
            let row = render::create_city_row(&city("Oslo", "NO", "/oslo"), &row_id(stale, 0));
            doc.append_child(cities, row);
        }
        let gate = api.gate("/oslo");
        let job = RowJob {
            document: Arc::clone(&document),
            api: api as Arc<dyn WeatherApi>,
            notifier: Arc::new(CollectingNotifier::new()),
            generations: Arc::clone(&generations),
            generation: stale,
            row_id: row_id(stale, 0),
            city: city("Oslo", "NO", "/oslo"),
        };
        let handle = tokio::spawn(job.run());

        generations.advance();
        gate.send(Ok(cloudy(-3.0))).unwrap();
        handle.await.unwrap().unwrap();

        let doc = document.lock().await;
        assert!(doc.query_class("city-info-container").is_empty());
    }

    #[tokio::test]
    async fn search_failure_is_reported_and_returned() {
        let api = FakeApi::default().with_search("x", Err(anyhow::anyhow!("503 from upstream")));
        let h = harness(api);

        let err = submit(&h.controller, "x").await.unwrap_err();

        assert!(matches!(err, WidgetError::Search(_)));
        let notices = h.notifier.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(notices[0].message.contains("503 from upstream"));
    }

    #[tokio::test]
    async fn one_failed_row_does_not_block_others() {
        let api = FakeApi::default().with_search(
            "a",
            Ok(vec![city("Accra", "GH", "/accra"), city("Ankara", "TR", "/ankara")]),
        );
        let h = harness(api);
        let accra = h.api.gate("/accra");
        let ankara = h.api.gate("/ankara");

        submit(&h.controller, "a").await.unwrap();
        accra.send(Err(anyhow::anyhow!("timeout"))).unwrap();
        ankara.send(Ok(cloudy(25.0))).unwrap();
        let failures = h.controller.settle().await;

        assert_eq!(failures.len(), 1);
        assert!(matches!(&failures[0], WidgetError::Conditions { city, .. } if city == "Accra"));
        let notices = h.notifier.notices();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].message.contains("Accra"));

        let doc = h.controller.document();
        let doc = doc.lock().await;
        assert_eq!(doc.query_class("city-info-container").len(), 1);
    }

    #[tokio::test]
    async fn new_search_clears_previous_rows() {
        let api = FakeApi::default()
            .with_search("one", Ok(vec![city("A", "X", "/a"), city("B", "X", "/b")]))
            .with_search("two", Ok(vec![city("C", "X", "/c")]));
        let h = harness(api);
        let a = h.api.gate("/a");
        let b = h.api.gate("/b");
        let c = h.api.gate("/c");

        submit(&h.controller, "one").await.unwrap();
        a.send(Ok(cloudy(1.0))).unwrap();
        b.send(Ok(cloudy(2.0))).unwrap();
        h.controller.settle().await;

        submit(&h.controller, "two").await.unwrap();
        c.send(Ok(cloudy(3.0))).unwrap();
        h.controller.settle().await;

        let doc = h.controller.document();
        let doc = doc.lock().await;
        let cities = doc.require_id(CITIES_ID).unwrap();
        assert_eq!(doc.children(cities).len(), 1);
        assert_eq!(doc.query_class("city-heading").len(), 1);
    }

    #[tokio::test]
    async fn show_city_forecast_reveals_modal() {
        let day = |d: u32| ForecastDay {
            date: NaiveDate::from_ymd_opt(2024, 1, d).unwrap(),
            max_temp: 20.0,
            min_temp: 10.0,
            condition: "Sunny".into(),
            icon: "https://cdn.example/64x64/sun.png".into(),
        };
        let api = FakeApi {
            forecast: (1..=5).map(day).collect(),
            ..Default::default()
        };
        let h = harness(api);

        let shown = h.controller.show_city_forecast("/paris").await.unwrap();

        assert_eq!(shown, 3);
        let doc = h.controller.document();
        let doc = doc.lock().await;
        let weekdays = doc.require_id(WEEKDAYS_ID).unwrap();
        assert_eq!(doc.children(weekdays).len(), 3);
        let labels: Vec<String> = doc
            .query_class("forecast-weekday")
            .into_iter()
            .map(|id| doc.text_content(id))
            .collect();
        assert_eq!(labels, ["Tue", "Wed", "Thu"]);
        let modal = doc.require_id(FORECAST_CONTAINER_ID).unwrap();
        assert!(!doc.node(modal).has_class(HIDDEN_CLASS));
    }

    fn row_names(doc: &Document) -> Vec<String> {
        doc.query_class("city-name")
            .into_iter()
            .map(|id| doc.text_content(id))
            .collect()
    }

    #[tokio::test]
    async fn search_submitted_during_settle_is_not_blocked() {
        let api = FakeApi::default()
            .with_search("a", Ok(vec![city("Accra", "GH", "/accra")]))
            .with_search("b", Ok(vec![city("Bogota", "CO", "/bogota")]));
        let h = harness(api);
        let _accra = h.api.gate("/accra");
        let bogota = h.api.gate("/bogota");

        submit(&h.controller, "a").await.unwrap();

        let (failures, second) = tokio::join!(h.controller.settle(), async {
            let outcome = tokio::time::timeout(Duration::from_secs(5), submit(&h.controller, "b")).await;
            bogota.send(Ok(cloudy(18.0))).unwrap();
            outcome
        });

        let second = second.expect("search waited for settle").unwrap();
        assert!(matches!(second, SearchOutcome::Populated { rows: 1, .. }));
        assert!(failures.is_empty());
        h.controller.settle().await;

        let doc = h.controller.document();
        let doc = doc.lock().await;
        assert_eq!(row_names(&doc), ["Bogota"]);
        let temps: Vec<String> = doc
            .query_class("city-temp")
            .into_iter()
            .map(|id| doc.text_content(id))
            .collect();
        assert_eq!(temps, ["18°C"]);
    }

    #[tokio::test]
    async fn search_resolving_after_newer_search_is_superseded() {
        let api = FakeApi::default().with_search("fast", Ok(vec![city("Lima", "PE", "/lima")]));
        let h = harness(api);
        let slow = h.api.search_gate("slow");
        let lima = h.api.gate("/lima");

        let mut first = Box::pin(submit(&h.controller, "slow"));
        assert!(poll!(&mut first).is_pending());

        let second = submit(&h.controller, "fast").await.unwrap();
        assert!(matches!(second, SearchOutcome::Populated { rows: 1, .. }));

        slow.send(Ok(vec![city("Paris", "FR", "/paris")])).unwrap();
        let first = first.await.unwrap();
        assert!(matches!(first, SearchOutcome::Superseded { .. }));

        lima.send(Ok(cloudy(19.0))).unwrap();
        h.controller.settle().await;
        assert!(!h.api.conditions_calls().contains(&"/paris".to_string()));
        let doc = h.controller.document();
        let doc = doc.lock().await;
        assert_eq!(row_names(&doc), ["Lima"]);
        assert_eq!(doc.query_class("city-info-container").len(), 1);
    }

    #[tokio::test]
    async fn search_superseded_while_waiting_to_render() {
        let api = FakeApi::default().with_search("two", Ok(vec![city("Quito", "EC", "/quito")]));
        let h = harness(api);
        let one = h.api.search_gate("one");
        let _quito = h.api.gate("/quito");
        let doc = h.controller.document();

        type_query(&h.controller, "one").await;
        let mut first_event = SubmitEvent::new();
        let mut first = Box::pin(h.controller.handle_search(&mut first_event));
        assert!(poll!(&mut first).is_pending());

        // Hold the page so the first search stalls right before rendering.
        let mut guard = doc.lock().await;
        let input = guard.require_id(SEARCH_INPUT_ID).unwrap();
        guard.set_value(input, "two");
        one.send(Ok(vec![city("Oslo", "NO", "/oslo")])).unwrap();
        assert!(poll!(&mut first).is_pending());

        let mut second_event = SubmitEvent::new();
        let mut second = Box::pin(h.controller.handle_search(&mut second_event));
        assert!(poll!(&mut second).is_pending());
        drop(guard);

        assert!(matches!(first.await.unwrap(), SearchOutcome::Superseded { .. }));
        assert!(matches!(
            second.await.unwrap(),
            SearchOutcome::Populated { rows: 1, .. }
        ));

        let doc = doc.lock().await;
        assert_eq!(row_names(&doc), ["Quito"]);
    }
}
