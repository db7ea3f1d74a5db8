use super::types::*;
use super::{WeatherError, WeatherProvider};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// In-process provider with canned readings for a fixed set of cities.
pub struct MockWeatherProvider {
    cities: HashMap<String, MockCity>,
    calls: AtomicUsize,
    unavailable: AtomicBool,
}

#[derive(Debug, Clone)]
struct MockCity {
    id: i64,
    name: String,
    country: String,
    base_temp: f64,
}

const DEFAULT_CITIES: &[(i64, &str, &str, f64)] = &[
    (1248991, "Colombo", "LK", 30.0),
    (1850147, "Tokyo", "JP", 17.0),
    (2644210, "Liverpool", "GB", 10.0),
    (2643743, "London", "GB", 11.0),
    (2988507, "Paris", "FR", 18.0),
    (2147714, "Sydney", "AU", 22.0),
    (4930956, "Boston", "US", 8.0),
    (1796236, "Shanghai", "CN", 19.0),
    (3143244, "Oslo", "NO", 2.0),
];

impl MockWeatherProvider {
    pub fn new() -> Self {
        Self::with_cities(DEFAULT_CITIES.iter().map(|(_, name, _, _)| *name))
    }

    /// Only the named cities resolve; everything else is `NotFound`.
    pub fn with_cities<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let cities = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| {
                let known = DEFAULT_CITIES
                    .iter()
                    .find(|(_, known, _, _)| known.eq_ignore_ascii_case(name));
                let city = match known {
                    Some((id, name, country, base_temp)) => MockCity {
                        id: *id,
                        name: name.to_string(),
                        country: country.to_string(),
                        base_temp: *base_temp,
                    },
                    None => MockCity {
                        id: 9_000_000 + index as i64,
                        name: name.to_string(),
                        country: "ZZ".to_string(),
                        base_temp: 15.0,
                    },
                };
                (name.to_lowercase(), city)
            })
            .collect();

        Self {
            cities,
            calls: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Number of upstream calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Simulates an upstream outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn lookup(&self, city: &str) -> Result<&MockCity, WeatherError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(WeatherError::ApiError(
                "HTTP 503 Service Unavailable: mock outage".to_string(),
            ));
        }

        self.cities
            .get(&city.trim().to_lowercase())
            .ok_or_else(|| WeatherError::NotFound(city.to_string()))
    }
}

impl Default for MockWeatherProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn readings(base_temp: f64, step: i64) -> MainReadings {
    let swing = 3.0 * (step as f64 * 0.26).sin(); // Diurnal temperature variation
    MainReadings {
        temp: base_temp + swing,
        feels_like: base_temp + swing - 1.5,
        temp_min: base_temp + swing - 2.0,
        temp_max: base_temp + swing + 2.0,
        pressure: 1013.0,
        humidity: (65.0 + 15.0 * (step as f64 * 0.13).cos()).clamp(30.0, 95.0),
    }
}

fn condition(step: i64) -> WeatherCondition {
    if step % 8 == 0 {
        WeatherCondition {
            id: 500,
            main: "Rain".to_string(),
            description: "light rain".to_string(),
            icon: "10d".to_string(),
        }
    } else {
        WeatherCondition {
            id: 802,
            main: "Clouds".to_string(),
            description: "scattered clouds".to_string(),
            icon: "03d".to_string(),
        }
    }
}

#[async_trait]
impl WeatherProvider for MockWeatherProvider {
    async fn current_weather(&self, city: &str) -> Result<CurrentWeatherResponse, WeatherError> {
        let city = self.lookup(city)?;

        Ok(CurrentWeatherResponse {
            id: city.id,
            name: city.name.clone(),
            dt: Utc::now().timestamp(),
            main: readings(city.base_temp, 0),
            weather: vec![condition(1)],
            wind: Wind {
                speed: 3.4,
                deg: Some(220.0),
                gust: None,
            },
            visibility: Some(10_000.0),
            sys: CurrentSys {
                country: Some(city.country.clone()),
                sunrise: None,
                sunset: None,
            },
        })
    }

    async fn forecast(&self, city: &str) -> Result<ForecastResponse, WeatherError> {
        let city = self.lookup(city)?;
        let now = Utc::now();

        // Five days of three-hour steps
        let list: Vec<ForecastItem> = (0..40)
            .map(|step| {
                let at = now + Duration::hours(3 * step);
                ForecastItem {
                    dt: at.timestamp(),
                    main: readings(city.base_temp, step),
                    weather: vec![condition(step)],
                    wind: Wind {
                        speed: 2.0 + (step % 5) as f64 * 0.75,
                        deg: Some(200.0),
                        gust: None,
                    },
                    visibility: Some(10_000.0),
                    pop: Some(if step % 8 == 0 { 0.4 } else { 0.1 }),
                    dt_txt: at.format("%Y-%m-%d %H:00:00").to_string(),
                }
            })
            .collect();

        Ok(ForecastResponse {
            cnt: list.len() as i32,
            list,
            city: ForecastCity {
                id: city.id,
                name: city.name.clone(),
                country: Some(city.country.clone()),
                timezone: Some(0),
            },
        })
    }
}
