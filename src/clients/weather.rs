use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::ExternalError;
use crate::settings::settings;

#[derive(Clone)]
pub struct WeatherClient {
    http: Client,
    api_key: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    pub temp: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub description: String,
    pub icon: String,
    pub humidity: i64,
    pub wind_speed: f64,
    pub place_name: String,
}

#[derive(Debug, Deserialize)]
struct CurrentWeatherResponse {
    main: MainBlock,
    weather: Vec<ConditionBlock>,
    wind: WindBlock,
    name: String,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
    temp_min: f64,
    temp_max: f64,
    humidity: i64,
}

#[derive(Debug, Deserialize)]
struct ConditionBlock {
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct WindBlock {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct GeoPlace {
    name: Option<String>,
    state: Option<String>,
}

fn icon_url(code: &str) -> String {
    format!("https://openweathermap.org/img/wn/{code}@2x.png")
}

impl WeatherClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
        }
    }

    /// Current conditions at a coordinate. The place name prefers the
    /// reverse-geocoding endpoint and falls back to whatever name the
    /// weather payload carries.
    pub async fn current(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<WeatherReport, ExternalError> {
        let s = &settings().weather;
        let response = self
            .http
            .get(format!("{}/weather", s.base_url))
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("appid", self.api_key.clone()),
                ("units", s.units.clone()),
                ("lang", s.lang.clone()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ExternalError::Status(response.status()));
        }
        let payload: CurrentWeatherResponse = response.json().await?;
        let condition = payload
            .weather
            .first()
            .ok_or_else(|| ExternalError::Malformed("missing weather conditions".into()))?;

        let place_name = self
            .reverse_geocode(latitude, longitude)
            .await
            .unwrap_or(None)
            .unwrap_or_else(|| payload.name.clone());

        Ok(WeatherReport {
            temp: payload.main.temp,
            temp_min: payload.main.temp_min,
            temp_max: payload.main.temp_max,
            description: condition.description.clone(),
            icon: icon_url(&condition.icon),
            humidity: payload.main.humidity,
            wind_speed: payload.wind.speed,
            place_name,
        })
    }

    /// Best-effort; any failure just falls back to the weather payload's
    /// own place name.
    async fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<String>, ExternalError> {
        let s = &settings().weather;
        let response = self
            .http
            .get(format!("{}/reverse", s.geocode_url))
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("limit", "1".to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let places: Vec<GeoPlace> = response.json().await.unwrap_or_default();
        Ok(places.into_iter().next().and_then(|p| p.name.or(p.state)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_current_weather_payload() {
        let raw = r#"{
            "main": {"temp": 31.4, "temp_min": 28.0, "temp_max": 33.1, "humidity": 74},
            "weather": [{"description": "scattered clouds", "icon": "03d"}],
            "wind": {"speed": 3.6},
            "name": "Hanoi"
        }"#;
        let payload: CurrentWeatherResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(payload.main.humidity, 74);
        assert_eq!(payload.weather[0].icon, "03d");
        assert_eq!(payload.name, "Hanoi");
    }

    #[test]
    fn test_icon_url() {
        assert_eq!(
            icon_url("10d"),
            "https://openweathermap.org/img/wn/10d@2x.png"
        );
    }

    #[test]
    fn test_parse_geocode_payload() {
        let raw = r#"[{"name": "Dong Da", "state": "Hanoi"}]"#;
        let places: Vec<GeoPlace> = serde_json::from_str(raw).unwrap();
        let best = places.into_iter().next().and_then(|p| p.name.or(p.state));
        assert_eq!(best.as_deref(), Some("Dong Da"));
    }
}
