use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CitiesError {
    #[error("Failed to read cities file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse cities file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    #[serde(rename = "CityCode", deserialize_with = "code_as_string")]
    pub code: String,
    #[serde(rename = "CityName")]
    pub name: String,
    #[serde(rename = "CountryCode", default)]
    pub country_code: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CitiesFile {
    Wrapped {
        #[serde(rename = "List")]
        list: Vec<City>,
    },
    Bare(Vec<City>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCode {
    Number(i64),
    Text(String),
}

fn code_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match RawCode::deserialize(deserializer)? {
        RawCode::Number(code) => code.to_string(),
        RawCode::Text(code) => code,
    })
}

pub fn parse_cities(raw: &str) -> Result<Vec<City>, CitiesError> {
    Ok(match serde_json::from_str::<CitiesFile>(raw)? {
        CitiesFile::Wrapped { list } => list,
        CitiesFile::Bare(list) => list,
    })
}

/// Reads the city list from disk. Called per request so edits apply live.
pub async fn load_cities(path: impl AsRef<Path>) -> Result<Vec<City>, CitiesError> {
    let raw = tokio::fs::read_to_string(path).await?;
    parse_cities(&raw)
}
