use crate::{de_count, de_opt_string, de_string};
use serde::{Deserialize, Serialize};
use serde_aux::field_attributes::deserialize_default_from_null;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Category {
    #[serde(deserialize_with = "de_count")]
    pub id: u64,
    #[serde(deserialize_with = "de_string")]
    pub name: String,
    #[serde(deserialize_with = "de_string")]
    pub slug: String,
    #[serde(deserialize_with = "de_count")]
    pub parent: u64,
    #[serde(deserialize_with = "de_count")]
    pub count: u64,
    #[serde(deserialize_with = "de_opt_string")]
    pub description: Option<String>,
    #[serde(deserialize_with = "de_opt_string")]
    pub image: Option<String>,
}

impl Category {
    pub fn is_top_level(&self) -> bool {
        self.parent == 0
    }
}

/// Returns the direct children of `parent`, preserving response order.
pub fn children_of(categories: &[Category], parent: u64) -> Vec<&Category> {
    categories.iter().filter(|c| c.parent == parent).collect()
}

/// A taxonomy term, e.g. a brand within `pa_brand`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Term {
    #[serde(deserialize_with = "de_count")]
    pub id: u64,
    #[serde(deserialize_with = "de_string")]
    pub name: String,
    #[serde(deserialize_with = "de_string")]
    pub slug: String,
    #[serde(deserialize_with = "de_count")]
    pub count: u64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
    List(Vec<T>),
    Wrapped {
        #[serde(alias = "categories", alias = "terms", alias = "items")]
        #[serde(deserialize_with = "deserialize_default_from_null")]
        data: Vec<T>,
    },
}

/// Accepts either a bare array or an object wrapping it.
pub fn parse_list_response<T>(json: serde_json::Value) -> Result<Vec<T>, serde_json::Error>
where
    T: for<'de> Deserialize<'de>,
{
    match json {
        serde_json::Value::Null => Ok(vec![]),
        json => serde_json::from_value::<ListBody<T>>(json).map(|body| match body {
            ListBody::List(list) => list,
            ListBody::Wrapped { data } => data,
        }),
    }
}
