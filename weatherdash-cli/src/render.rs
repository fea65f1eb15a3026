use weatherdash_core::{CurrentConditions, DailySummary, DashboardReport, PlaceMatch, SeriesResult};

pub fn report(report: &DashboardReport) -> String {
    let mut out = String::new();

    current(&mut out, &report.current);

    out.push_str("\nForecast\n");
    series(&mut out, &report.forecast);

    out.push_str("\nLast 7 days\n");
    match &report.history {
        Some(history) => series(&mut out, history),
        None => out.push_str("  history unavailable\n"),
    }

    out
}

pub fn places(places: &[PlaceMatch]) -> String {
    if places.is_empty() {
        return "No matching places.\n".to_string();
    }

    let mut out = String::new();
    for place in places {
        let region = place
            .admin_region
            .as_deref()
            .map(|r| format!(", {r}"))
            .unwrap_or_default();
        out.push_str(&format!(
            "{}{region}, {}  ({:.4}, {:.4})\n",
            place.display_name,
            place.country,
            place.coordinates.latitude,
            place.coordinates.longitude
        ));
    }
    out
}

fn current(out: &mut String, c: &CurrentConditions) {
    let heading = if c.country_code.is_empty() {
        c.place_name.clone()
    } else {
        format!("{}, {}", c.place_name, c.country_code)
    };
    let observed = c
        .observed_at()
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "unknown time".to_string());

    out.push_str(&format!("{heading}  ({observed})\n"));
    out.push_str(&format!(
        "  {:.1}°C (feels like {:.1}°C), {}\n",
        c.temperature_c, c.feels_like_c, c.condition.description
    ));
    out.push_str(&format!(
        "  humidity {:.0}%  pressure {:.0} hPa  wind {:.1} m/s\n",
        c.humidity_pct, c.pressure_hpa, c.wind_speed_ms
    ));
    if let Some(aqi) = c.air_quality_index {
        out.push_str(&format!("  air quality (US AQI) {aqi}\n"));
    }
}

fn series(out: &mut String, series: &SeriesResult) {
    if series.is_empty() {
        out.push_str("  no data\n");
        return;
    }
    for day in series {
        out.push_str(&format!("  {}\n", day_line(day)));
    }
}

fn day_line(day: &DailySummary) -> String {
    let weekday = day.date.format("%a %d %b");

    let mut line = format!(
        "{weekday}  {:>5.1} / {:>5.1} °C  {:<22} wind {:>4.1} m/s  precip {:>4.1} mm",
        day.temp_max_c,
        day.temp_min_c,
        day.condition.description,
        day.wind_speed_max_ms,
        day.precipitation_mm
    );
    if let Some(p) = day.precipitation_probability_pct {
        line.push_str(&format!(" ({p}%)"));
    }
    if let Some(aqi) = day.air_quality_index {
        line.push_str(&format!("  AQI {aqi}"));
    }
    line
}
