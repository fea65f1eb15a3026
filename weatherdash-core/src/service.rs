//! The weather data service: the facade the dashboard talks to.
//!
//! Every call goes upstream; nothing is cached between calls.

use std::sync::Arc;

use chrono::{Duration, Local, NaiveDate};
use tracing::{info, warn};

use crate::{
    Config,
    error::WeatherError,
    fallback::{best_effort, primary_then_fallback},
    model::{Coordinates, CurrentConditions, DashboardReport, PlaceMatch, SeriesResult},
    provider::{
        HistoryProvider, ProviderId, WeatherProvider, air_quality::AirQualityClient, http_client,
        openmeteo::OpenMeteoProvider, provider_from_config,
    },
};

/// Suggestions returned for autocomplete.
pub const SEARCH_LIMIT: usize = 5;

/// Shorter queries get no suggestions and no upstream call.
pub const MIN_SEARCH_QUERY_LEN: usize = 2;

/// Complete days covered by the history panel.
pub const HISTORY_DAYS: i64 = 7;

/// First and last date of the history window: the `HISTORY_DAYS` complete
/// days ending yesterday.
pub fn history_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let end = today - Duration::days(1);
    let start = today - Duration::days(HISTORY_DAYS);
    (start, end)
}

#[derive(Debug, Clone)]
pub struct WeatherService {
    primary: Option<Arc<dyn WeatherProvider>>,
    secondary: Arc<dyn WeatherProvider>,
    archive: Arc<dyn HistoryProvider>,
}

impl WeatherService {
    pub fn new(
        primary: Option<Arc<dyn WeatherProvider>>,
        secondary: Arc<dyn WeatherProvider>,
        archive: Arc<dyn HistoryProvider>,
    ) -> Self {
        Self { primary, secondary, archive }
    }

    /// OpenWeather is the first choice exactly when its API key is
    /// configured; Open-Meteo is always the fallback and the history source.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let http = http_client(config)?;

        let primary = match config.primary_api_key() {
            Some(_) => Some(provider_from_config(ProviderId::OpenWeather, config, &http)?),
            None => None,
        };

        let air_quality =
            AirQualityClient::new(http.clone(), &config.endpoints.open_meteo_air_quality);
        let open_meteo = Arc::new(OpenMeteoProvider::new(http, &config.endpoints, air_quality));

        Ok(Self::new(primary, open_meteo.clone(), open_meteo))
    }

    pub fn primary_provider(&self) -> Option<ProviderId> {
        self.primary.as_ref().map(|p| p.id())
    }

    /// Best geocoding match for `name`. An empty primary answer counts as a
    /// failure and triggers the fallback; an empty secondary answer is
    /// [`WeatherError::NotFound`].
    pub async fn resolve_place(&self, name: &str) -> Result<PlaceMatch, WeatherError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WeatherError::NotFound(String::new()));
        }

        let place = primary_then_fallback(
            "geocoding",
            self.primary.as_ref(),
            &self.secondary,
            |provider| async move {
                let places = provider.search_places(name, 1).await?;
                places
                    .into_iter()
                    .next()
                    .ok_or_else(|| anyhow::Error::from(WeatherError::NotFound(name.to_string())))
            },
        )
        .await?;

        info!(
            query = name,
            place = %place.display_name,
            lat = place.coordinates.latitude,
            lon = place.coordinates.longitude,
            "resolved place"
        );
        Ok(place)
    }

    /// Autocomplete suggestions. No matches is an empty list, not an error.
    pub async fn search_places(&self, query: &str) -> Result<Vec<PlaceMatch>, WeatherError> {
        let query = query.trim();
        if query.chars().count() < MIN_SEARCH_QUERY_LEN {
            return Ok(Vec::new());
        }

        primary_then_fallback("place search", self.primary.as_ref(), &self.secondary, |provider| {
            async move { provider.search_places(query, SEARCH_LIMIT).await }
        })
        .await
    }

    /// Current conditions; the hints override whatever name and country the
    /// provider reports.
    pub async fn current_conditions(
        &self,
        coords: Coordinates,
        name_hint: Option<&str>,
        country_hint: Option<&str>,
    ) -> Result<CurrentConditions, WeatherError> {
        let reading = primary_then_fallback(
            "current conditions",
            self.primary.as_ref(),
            &self.secondary,
            |provider| async move { provider.current(coords).await },
        )
        .await?;

        Ok(reading.into_conditions(coords, name_hint, country_hint))
    }

    pub async fn forecast(&self, coords: Coordinates) -> Result<SeriesResult, WeatherError> {
        let days = primary_then_fallback(
            "forecast",
            self.primary.as_ref(),
            &self.secondary,
            |provider| async move { provider.daily_forecast(coords).await },
        )
        .await?;

        Ok(SeriesResult::from_days(days))
    }

    /// Observed days ending yesterday, or `None` when the archive fails or
    /// has nothing for the window.
    pub async fn history(&self, coords: Coordinates) -> Option<SeriesResult> {
        self.history_for(coords, Local::now().date_naive()).await
    }

    async fn history_for(&self, coords: Coordinates, today: NaiveDate) -> Option<SeriesResult> {
        let (start, end) = history_window(today);
        let days = best_effort("history", self.archive.daily_history(coords, start, end)).await?;

        let series = SeriesResult::from_days(days);
        if series.is_empty() {
            warn!(%start, %end, "archive returned no days");
            return None;
        }
        Some(series)
    }

    pub async fn by_place_name(&self, name: &str) -> Result<DashboardReport, WeatherError> {
        let place = self.resolve_place(name).await?;
        let country = place.country_code.as_deref().unwrap_or(place.country.as_str());

        let mut report = self
            .report_for(place.coordinates, Some(place.display_name.as_str()), Some(country))
            .await?;
        report.place = Some(place);
        Ok(report)
    }

    /// Device-location flow: no geocoding.
    pub async fn by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
        name_hint: Option<&str>,
        country_hint: Option<&str>,
    ) -> Result<DashboardReport, WeatherError> {
        let coords = Coordinates::new(latitude, longitude)?;
        self.report_for(coords, name_hint, country_hint).await
    }

    async fn report_for(
        &self,
        coords: Coordinates,
        name_hint: Option<&str>,
        country_hint: Option<&str>,
    ) -> Result<DashboardReport, WeatherError> {
        let (current, forecast, history) = tokio::join!(
            self.current_conditions(coords, name_hint, country_hint),
            self.forecast(coords),
            self.history(coords),
        );

        Ok(DashboardReport {
            place: None,
            current: current?,
            forecast: forecast?,
            history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{CurrentReading, DailySummary, MainCategory},
        wmo,
    };
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    fn place(name: &str, country: &str) -> PlaceMatch {
        PlaceMatch {
            coordinates: Coordinates::new(48.8566, 2.3522).unwrap(),
            display_name: name.to_string(),
            country: country.to_string(),
            admin_region: None,
            country_code: Some(country.to_string()),
        }
    }

    fn reading(reported_name: &str) -> CurrentReading {
        CurrentReading {
            reported_name: Some(reported_name.to_string()),
            reported_country: Some("US".into()),
            observed_at_epoch_seconds: 1_792_152_000,
            temperature_c: 17.3,
            feels_like_c: 16.8,
            humidity_pct: 55.0,
            pressure_hpa: 1016.0,
            wind_speed_ms: 3.1,
            air_quality_index: None,
            condition: wmo::map_code(2, true),
        }
    }

    fn day(offset: i64, temp_max_c: f64) -> DailySummary {
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap() + Duration::days(offset);
        DailySummary {
            date,
            date_epoch_seconds: date.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp(),
            temp_max_c,
            temp_min_c: temp_max_c - 6.0,
            wind_speed_max_ms: 4.0,
            precipitation_mm: 0.0,
            precipitation_probability_pct: None,
            air_quality_index: None,
            condition: wmo::map_code(61, true),
        }
    }

    #[derive(Debug)]
    struct FakeProvider {
        id: ProviderId,
        places: Option<Vec<PlaceMatch>>,
        current: Option<CurrentReading>,
        forecast: Option<Vec<DailySummary>>,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn healthy(id: ProviderId, name: &str) -> Self {
            Self {
                id,
                places: Some(vec![place(name, "FR"), place("Other", "FR")]),
                current: Some(reading(name)),
                forecast: Some(vec![day(2, 20.0), day(0, 18.0), day(1, 19.0)]),
                calls: AtomicUsize::new(0),
            }
        }

        fn broken(id: ProviderId) -> Self {
            Self {
                id,
                places: None,
                current: None,
                forecast: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn answer<T: Clone>(&self, value: &Option<T>) -> anyhow::Result<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            value.clone().ok_or_else(|| anyhow!("{} unreachable", self.id))
        }
    }

    #[async_trait]
    impl WeatherProvider for FakeProvider {
        fn id(&self) -> ProviderId {
            self.id
        }

        async fn search_places(
            &self,
            _query: &str,
            limit: usize,
        ) -> anyhow::Result<Vec<PlaceMatch>> {
            let mut places = self.answer(&self.places)?;
            places.truncate(limit);
            Ok(places)
        }

        async fn current(&self, _coords: Coordinates) -> anyhow::Result<CurrentReading> {
            self.answer(&self.current)
        }

        async fn daily_forecast(&self, _coords: Coordinates) -> anyhow::Result<Vec<DailySummary>> {
            self.answer(&self.forecast)
        }
    }

    #[derive(Debug, Default)]
    struct FakeArchive {
        days: Option<Vec<DailySummary>>,
        window: Mutex<Option<(NaiveDate, NaiveDate)>>,
    }

    #[async_trait]
    impl HistoryProvider for FakeArchive {
        async fn daily_history(
            &self,
            _coords: Coordinates,
            start: NaiveDate,
            end: NaiveDate,
        ) -> anyhow::Result<Vec<DailySummary>> {
            *self.window.lock().unwrap() = Some((start, end));
            self.days.clone().ok_or_else(|| anyhow!("archive timed out"))
        }
    }

    struct Harness {
        primary: Arc<FakeProvider>,
        secondary: Arc<FakeProvider>,
        archive: Arc<FakeArchive>,
        service: WeatherService,
    }

    fn harness(primary: FakeProvider, secondary: FakeProvider, archive: FakeArchive) -> Harness {
        let (primary, secondary, archive) =
            (Arc::new(primary), Arc::new(secondary), Arc::new(archive));
        let service = WeatherService::new(
            Some(primary.clone() as Arc<dyn WeatherProvider>),
            secondary.clone(),
            archive.clone(),
        );
        Harness { primary, secondary, archive, service }
    }

    fn healthy_archive() -> FakeArchive {
        FakeArchive {
            days: Some((-7..0).map(|d| day(d, 15.0)).collect()),
            ..Default::default()
        }
    }

    fn paris() -> Coordinates {
        Coordinates::new(48.8566, 2.3522).unwrap()
    }

    #[test]
    fn history_window_spans_seven_days_ending_yesterday() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let (start, end) = history_window(today);

        assert_eq!(end, NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());
        assert_eq!(start, NaiveDate::from_ymd_opt(2026, 2, 22).unwrap());
        assert_eq!((end - start).num_days() + 1, 7);
    }

    #[tokio::test]
    async fn resolve_place_falls_back_when_primary_fails() {
        let h = harness(
            FakeProvider::broken(ProviderId::OpenWeather),
            FakeProvider::healthy(ProviderId::OpenMeteo, "Paris"),
            healthy_archive(),
        );

        let found = h.service.resolve_place("Paris").await.unwrap();

        assert_eq!(found.display_name, "Paris");
        assert_eq!(h.primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.secondary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resolve_place_falls_back_when_primary_is_empty() {
        let mut primary = FakeProvider::healthy(ProviderId::OpenWeather, "Paris");
        primary.places = Some(Vec::new());
        let h = harness(
            primary,
            FakeProvider::healthy(ProviderId::OpenMeteo, "Paris"),
            healthy_archive(),
        );

        let found = h.service.resolve_place("Paris").await.unwrap();

        assert_eq!(found.display_name, "Paris");
        assert_eq!(h.secondary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resolve_place_reports_not_found_when_nothing_matches() {
        let mut primary = FakeProvider::healthy(ProviderId::OpenWeather, "x");
        primary.places = Some(Vec::new());
        let mut secondary = FakeProvider::healthy(ProviderId::OpenMeteo, "x");
        secondary.places = Some(Vec::new());
        let h = harness(primary, secondary, healthy_archive());

        let err = h.service.resolve_place("zzz_no_such_place").await.unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn resolve_place_unavailable_when_both_fail() {
        let h = harness(
            FakeProvider::broken(ProviderId::OpenWeather),
            FakeProvider::broken(ProviderId::OpenMeteo),
            healthy_archive(),
        );

        let err = h.service.resolve_place("Paris").await.unwrap_err();

        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn search_returns_empty_list_for_no_matches() {
        let mut primary = FakeProvider::healthy(ProviderId::OpenWeather, "x");
        primary.places = Some(Vec::new());
        let h = harness(
            primary,
            FakeProvider::healthy(ProviderId::OpenMeteo, "Paris"),
            healthy_archive(),
        );

        let places = h.service.search_places("zzz_no_such_place").await.unwrap();

        assert!(places.is_empty());
        assert_eq!(h.secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn search_skips_short_queries() {
        let h = harness(
            FakeProvider::healthy(ProviderId::OpenWeather, "Paris"),
            FakeProvider::healthy(ProviderId::OpenMeteo, "Paris"),
            healthy_archive(),
        );

        assert!(h.service.search_places(" p ").await.unwrap().is_empty());
        assert_eq!(h.primary.calls.load(Ordering::SeqCst), 0);

        let places = h.service.search_places("pa").await.unwrap();
        assert_eq!(places.len(), 2);
    }

    #[tokio::test]
    async fn name_hint_wins_over_provider_name() {
        let h = harness(
            FakeProvider::healthy(ProviderId::OpenWeather, "Shelbyville"),
            FakeProvider::healthy(ProviderId::OpenMeteo, "Shelbyville"),
            healthy_archive(),
        );

        let current = h
            .service
            .current_conditions(paris(), Some("Springfield"), None)
            .await
            .unwrap();

        assert_eq!(current.place_name, "Springfield");
        assert_eq!(current.country_code, "US");
        assert!(current.temperature_c.is_finite());
    }

    #[tokio::test]
    async fn current_conditions_fall_back_to_secondary() {
        let h = harness(
            FakeProvider::broken(ProviderId::OpenWeather),
            FakeProvider::healthy(ProviderId::OpenMeteo, "Lyon"),
            healthy_archive(),
        );

        let current = h.service.current_conditions(paris(), None, None).await.unwrap();

        assert_eq!(current.place_name, "Lyon");
        assert_eq!(current.condition.main_category, MainCategory::Clouds);
    }

    #[tokio::test]
    async fn forecast_is_sorted_and_unavailable_when_both_fail() {
        let h = harness(
            FakeProvider::healthy(ProviderId::OpenWeather, "Paris"),
            FakeProvider::broken(ProviderId::OpenMeteo),
            healthy_archive(),
        );

        let series = h.service.forecast(paris()).await.unwrap();
        let maxima: Vec<_> = series.iter().map(|d| d.temp_max_c).collect();
        assert_eq!(maxima, [18.0, 19.0, 20.0]);

        let h = harness(
            FakeProvider::broken(ProviderId::OpenWeather),
            FakeProvider::broken(ProviderId::OpenMeteo),
            healthy_archive(),
        );
        let err = h.service.forecast(paris()).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn history_uses_the_trailing_window() {
        let h = harness(
            FakeProvider::healthy(ProviderId::OpenWeather, "Paris"),
            FakeProvider::healthy(ProviderId::OpenMeteo, "Paris"),
            healthy_archive(),
        );
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();

        let series = h.service.history_for(paris(), today).await.expect("history present");

        assert_eq!(series.len(), 7);
        let window = *h.archive.window.lock().unwrap();
        assert_eq!(window, Some(history_window(today)));
    }

    #[tokio::test]
    async fn history_failure_is_absent_not_an_error() {
        let h = harness(
            FakeProvider::healthy(ProviderId::OpenWeather, "Paris"),
            FakeProvider::healthy(ProviderId::OpenMeteo, "Paris"),
            FakeArchive::default(),
        );

        assert!(h.service.history(paris()).await.is_none());
    }

    #[tokio::test]
    async fn by_place_name_uses_resolved_name_and_tolerates_missing_history() {
        let h = harness(
            FakeProvider::healthy(ProviderId::OpenWeather, "Paris"),
            FakeProvider::healthy(ProviderId::OpenMeteo, "Paris"),
            FakeArchive::default(),
        );
        let report = h.service.by_place_name("paris").await.unwrap();

        assert_eq!(report.place.as_ref().map(|p| p.display_name.as_str()), Some("Paris"));
        assert_eq!(report.current.place_name, "Paris");
        assert_eq!(report.current.country_code, "FR");
        assert_eq!(report.forecast.len(), 3);
        assert!(report.history.is_none());
    }

    #[tokio::test]
    async fn by_place_name_propagates_not_found() {
        let mut primary = FakeProvider::healthy(ProviderId::OpenWeather, "x");
        primary.places = Some(Vec::new());
        let mut secondary = FakeProvider::healthy(ProviderId::OpenMeteo, "x");
        secondary.places = Some(Vec::new());
        let h = harness(primary, secondary, healthy_archive());

        let err = h.service.by_place_name("Atlantis").await.unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(h.primary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn by_coordinates_validates_and_labels() {
        let mut primary = FakeProvider::healthy(ProviderId::OpenWeather, "x");
        primary.current = Some(CurrentReading {
            reported_name: None,
            reported_country: None,
            ..reading("x")
        });
        let h = harness(
            primary,
            FakeProvider::healthy(ProviderId::OpenMeteo, "x"),
            healthy_archive(),
        );

        let err = h.service.by_coordinates(123.0, 0.0, None, None).await.unwrap_err();
        assert!(matches!(err, WeatherError::InvalidCoordinates { .. }));

        let report = h.service.by_coordinates(51.5074, -0.1278, None, None).await.unwrap();
        assert_eq!(report.current.place_name, "Lat: 51.51, Lon: -0.13");
        assert!(report.place.is_none());
        assert!(report.history.is_some());
    }

    #[tokio::test]
    async fn required_failure_fails_the_whole_report() {
        let mut secondary = FakeProvider::healthy(ProviderId::OpenMeteo, "x");
        secondary.current = None;
        let h = harness(
            FakeProvider::broken(ProviderId::OpenWeather),
            secondary,
            healthy_archive(),
        );

        let err = h.service.by_coordinates(10.0, 10.0, None, None).await.unwrap_err();

        assert!(err.is_unavailable());
    }

    #[test]
    fn from_config_selects_primary_only_with_credential() {
        let cfg = Config::default();
        assert_eq!(WeatherService::from_config(&cfg).unwrap().primary_provider(), None);

        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "KEY".into());
        assert_eq!(
            WeatherService::from_config(&cfg).unwrap().primary_provider(),
            Some(ProviderId::OpenWeather)
        );
    }
}
