// Hourly forecast lookup for the city a game is played in.
//
// Weather is optional input: a missing key, a failed request or an
// unparseable forecast all resolve to `None` and the scoring engine falls
// back to its neutral weather factor.

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::model::WeatherReport;

// ---------------------------------------------------------------------------
// WeatherApiClient
// ---------------------------------------------------------------------------

/// Low-level forecast client.
pub struct WeatherApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl WeatherApiClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    /// Fetch the forecast for `city` and pick the hour closest to
    /// `start_epoch` (seconds since the Unix epoch).
    pub async fn forecast_at(&self, city: &str, start_epoch: i64) -> anyhow::Result<Option<WeatherReport>> {
        let url = format!("{}/forecast.json", self.base_url.trim_end_matches('/'));
        let body: Value = self
            .http
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("q", city)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(closest_hour(&body, start_epoch))
    }
}

// ---------------------------------------------------------------------------
// WeatherClient
// ---------------------------------------------------------------------------

/// Forecast access that is either configured or switched off.
pub enum WeatherClient {
    Active(WeatherApiClient),
    Disabled,
}

impl WeatherClient {
    /// Active when `credentials.toml` carries a non-empty weather key.
    pub fn from_config(config: &Config) -> Self {
        match config.credentials.weather_api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => WeatherClient::Active(WeatherApiClient::new(
                config.upstream.weather_base_url.clone(),
                key.trim().to_string(),
            )),
            _ => {
                debug!("no weather API key configured; weather lookups disabled");
                WeatherClient::Disabled
            }
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, WeatherClient::Active(_))
    }

    /// Forecast at first pitch, or `None` when unavailable.
    pub async fn forecast_at(&self, city: &str, start_epoch: i64) -> Option<WeatherReport> {
        match self {
            WeatherClient::Active(client) => match client.forecast_at(city, start_epoch).await {
                Ok(report) => report,
                Err(e) => {
                    warn!("weather lookup failed for {city}: {e}");
                    None
                }
            },
            WeatherClient::Disabled => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Walk every forecast day's hourly entries and return the one whose
/// `time_epoch` is nearest `start_epoch`.
pub fn closest_hour(body: &Value, start_epoch: i64) -> Option<WeatherReport> {
    let days = body.get("forecast")?.get("forecastday")?.as_array()?;
    let hour = days
        .iter()
        .filter_map(|day| day.get("hour")?.as_array())
        .flatten()
        .filter_map(|h| Some((h.get("time_epoch")?.as_i64()?, h)))
        .min_by_key(|(epoch, _)| (epoch - start_epoch).abs())?
        .1;

    let condition = hour.get("condition")?;
    Some(WeatherReport {
        condition: condition.get("text")?.as_str()?.trim().to_string(),
        code: condition.get("code")?.as_u64()? as u32,
        temperature_f: hour.get("temp_f")?.as_f64()?,
        wind_mph: hour.get("wind_mph")?.as_f64()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hour(epoch: i64, text: &str, code: u64, temp: f64) -> Value {
        json!({
            "time_epoch": epoch,
            "temp_f": temp,
            "wind_mph": 8.1,
            "condition": { "text": text, "code": code }
        })
    }

    #[test]
    fn picks_nearest_hour_across_days() {
        let body = json!({
            "forecast": { "forecastday": [
                { "hour": [hour(1_000, "Sunny", 1000, 70.0), hour(4_600, "Cloudy", 1006, 68.0)] },
                { "hour": [hour(8_200, "Patchy rain possible", 1063, 61.0)] }
            ]}
        });
        let report = closest_hour(&body, 7_500).unwrap();
        assert_eq!(report.condition, "Patchy rain possible");
        assert_eq!(report.code, 1063);

        let report = closest_hour(&body, 4_000).unwrap();
        assert_eq!(report.condition, "Cloudy");
        assert_eq!(report.temperature_f, 68.0);
    }

    #[test]
    fn malformed_forecast_is_none() {
        assert!(closest_hour(&json!({}), 0).is_none());
        assert!(closest_hour(&json!({ "forecast": { "forecastday": [] } }), 0).is_none());
        let missing_condition = json!({
            "forecast": { "forecastday": [ { "hour": [ { "time_epoch": 5, "temp_f": 1.0, "wind_mph": 1.0 } ] } ] }
        });
        assert!(closest_hour(&missing_condition, 5).is_none());
    }

    #[tokio::test]
    async fn disabled_client_returns_none() {
        let client = WeatherClient::Disabled;
        assert!(!client.is_active());
        assert!(client.forecast_at("Denver", 0).await.is_none());
    }
}
