use crate::{de_count, de_opt_count, de_string};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_aux::field_attributes::deserialize_default_from_null;
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct FacetOption {
    #[serde(deserialize_with = "de_string")]
    pub slug: String,
    #[serde(deserialize_with = "de_string")]
    pub name: String,
    #[serde(deserialize_with = "de_opt_count")]
    pub count: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct FacetGroup {
    #[serde(deserialize_with = "de_string")]
    pub label: String,
    #[serde(deserialize_with = "deserialize_default_from_null")]
    pub options: Vec<FacetOption>,
}

impl FacetGroup {
    pub fn option(&self, slug: &str) -> Option<&FacetOption> {
        self.options.iter().find(|o| o.slug == slug)
    }
}

/// Facet key (`pa_brand`, `pa_condition`, ...) to its available choices.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct FilterOptions(pub BTreeMap<String, FacetGroup>);

impl FilterOptions {
    pub fn get(&self, key: &str) -> Option<&FacetGroup> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FacetGroup)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Facet label, falling back to the key itself.
    pub fn label<'a>(&'a self, key: &'a str) -> &'a str {
        self.get(key)
            .map(|g| g.label.as_str())
            .filter(|l| !l.is_empty())
            .unwrap_or(key)
    }

    /// Display name of an option, falling back to its slug.
    pub fn option_name<'a>(&'a self, key: &str, slug: &'a str) -> &'a str {
        self.get(key)
            .and_then(|g| g.option(slug))
            .map(|o| o.name.as_str())
            .filter(|n| !n.is_empty())
            .unwrap_or(slug)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct FilterOptionsResult {
    #[serde(deserialize_with = "de_string")]
    pub taxonomy: String,
    #[serde(deserialize_with = "de_filter_map")]
    pub filters: FilterOptions,
    #[serde(deserialize_with = "de_count")]
    pub total: u64,
}

// PHP encodes an empty map as `[]`
fn de_filter_map<'de, D>(deserializer: D) -> Result<FilterOptions, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        v @ serde_json::Value::Object(_) => serde_json::from_value(v).map_err(D::Error::custom),
        _ => Ok(FilterOptions::default()),
    }
}

pub fn parse_filter_options_response(
    json: serde_json::Value,
) -> Result<FilterOptionsResult, serde_json::Error> {
    match json {
        serde_json::Value::Null => Ok(FilterOptionsResult::default()),
        json => serde_json::from_value(json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_names_with_fallback() {
        let res = parse_filter_options_response(json!({
            "taxonomy": "equipment-buy",
            "filters": {
                "pa_brand": {
                    "label": "Brand",
                    "options": [
                        {"slug": "heli", "name": "Heli", "count": 4},
                        {"slug": "toyota", "name": "Toyota"}
                    ]
                }
            },
            "total": 2
        }))
        .unwrap();
        let options = res.filters;
        assert_eq!(options.label("pa_brand"), "Brand");
        assert_eq!(options.label("pa_year"), "pa_year");
        assert_eq!(options.option_name("pa_brand", "heli"), "Heli");
        assert_eq!(options.option_name("pa_brand", "linde"), "linde");
        assert_eq!(options.get("pa_brand").unwrap().options[1].count, None);
    }

    #[test]
    fn null_filters_default_to_empty() {
        let res = parse_filter_options_response(json!({"taxonomy": "x", "filters": null})).unwrap();
        assert!(res.filters.is_empty());
        let res = parse_filter_options_response(json!({"taxonomy": "x", "filters": []})).unwrap();
        assert!(res.filters.is_empty());
        assert_eq!(res.total, 0);
    }
}
