use std::time::Duration;

use delivery_planner::ClusterRadius;
use delivery_planner::models::Coordinate;
use jiff::SpanRelativeTo;
use jiff::civil::Date;

/// Accepts `today`, `tomorrow` or an ISO date (`2026-03-02`).
pub fn parse_date(input: &str) -> Result<Date, String> {
    let today = || jiff::Zoned::now().date();
    match input.trim() {
        "today" => Ok(today()),
        "tomorrow" => today().tomorrow().map_err(|err| err.to_string()),
        other => other
            .parse::<Date>()
            .map_err(|err| format!("expected YYYY-MM-DD, today or tomorrow ({err})")),
    }
}

pub fn parse_id(input: &str) -> Result<u64, String> {
    match input.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(format!("invalid id {input:?}, expected a positive integer")),
        Ok(id) => Ok(id),
    }
}

pub fn parse_radius(input: &str) -> Result<ClusterRadius, String> {
    let km = input
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("invalid radius {input:?}"))?;
    ClusterRadius::new(km).map_err(|err| err.to_string())
}

/// Parses `lat,lon` in decimal degrees.
pub fn parse_coordinate(input: &str) -> Result<Coordinate, String> {
    let (lat, lon) = input
        .split_once(',')
        .ok_or_else(|| format!("expected lat,lon, got {input:?}"))?;
    let lat = lat.trim().parse::<f64>().map_err(|_| format!("invalid latitude {lat:?}"))?;
    let lon = lon.trim().parse::<f64>().map_err(|_| format!("invalid longitude {lon:?}"))?;

    let coordinate = Coordinate::new(lat, lon);
    if !coordinate.is_valid() {
        return Err(format!("{coordinate} is outside the valid coordinate range"));
    }
    Ok(coordinate)
}

pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let signed = if let Ok(duration) = input.parse::<jiff::SignedDuration>() {
        duration
    } else if let Ok(duration) = input
        .parse::<jiff::Span>()
        .and_then(|span| span.to_duration(SpanRelativeTo::days_are_24_hours()))
    {
        duration
    } else if let Ok(seconds) = input.parse::<i64>() {
        jiff::SignedDuration::from_secs(seconds)
    } else {
        return Err(String::from("Invalid duration"));
    };

    Duration::try_from(signed).map_err(|_| String::from("Duration must not be negative"))
}
