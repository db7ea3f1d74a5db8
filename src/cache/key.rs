use serde_json::{Map, Value};
use std::collections::HashMap;

/// Named request parameters that take part in a cache key.
pub type Params = HashMap<String, Value>;

/// Builds the cache key for a logical request.
///
/// Parameter names are sorted before serialization, so two maps holding the
/// same pairs always produce the same key.
pub fn build_key(endpoint: &str, params: &Params) -> String {
    let mut names: Vec<&String> = params.keys().collect();
    names.sort();

    let canonical: Map<String, Value> = names
        .into_iter()
        .map(|name| (name.clone(), params[name].clone()))
        .collect();

    format!("{}_{}", endpoint, Value::Object(canonical))
}

/// Shorthand for the common single `city` parameter, normalized to lowercase.
pub fn city_params(city: &str) -> Params {
    Params::from([("city".to_string(), Value::from(city.trim().to_lowercase()))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> Params {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_key_is_order_independent() {
        let first = params(&[("a", json!(1)), ("b", json!(2))]);
        let second = params(&[("b", json!(2)), ("a", json!(1))]);

        assert_eq!(build_key("e", &first), build_key("e", &second));
        assert_eq!(build_key("e", &first), r#"e_{"a":1,"b":2}"#);
    }

    #[test]
    fn test_key_depends_on_values_and_endpoint() {
        let a1 = params(&[("a", json!(1))]);
        let a2 = params(&[("a", json!(2))]);

        assert_ne!(build_key("e", &a1), build_key("e", &a2));
        assert_ne!(build_key("e", &a1), build_key("f", &a1));
    }

    #[test]
    fn test_value_types_are_distinguished() {
        let number = params(&[("a", json!(1))]);
        let text = params(&[("a", json!("1"))]);

        assert_ne!(build_key("e", &number), build_key("e", &text));
    }

    #[test]
    fn test_empty_params() {
        assert_eq!(build_key("dashboard", &Params::new()), "dashboard_{}");
        assert_ne!(
            build_key("dashboard", &Params::new()),
            build_key("forecast", &Params::new())
        );
    }

    #[test]
    fn test_city_params_normalizes_case() {
        assert_eq!(
            build_key("current-weather", &city_params("  London ")),
            build_key("current-weather", &city_params("london"))
        );
        assert_eq!(
            build_key("current-weather", &city_params("Paris")),
            r#"current-weather_{"city":"paris"}"#
        );
    }
}
