use crate::{de_count, de_opt_string, de_string, Availability};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_aux::field_attributes::deserialize_default_from_null;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Product {
    #[serde(deserialize_with = "de_count")]
    pub id: u64,
    #[serde(deserialize_with = "de_string")]
    pub name: String,
    #[serde(deserialize_with = "de_string")]
    pub slug: String,
    #[serde(deserialize_with = "de_string")]
    pub permalink: String,
    #[serde(deserialize_with = "de_opt_string")]
    pub sku: Option<String>,
    #[serde(deserialize_with = "de_opt_price")]
    pub price: Option<Decimal>,
    #[serde(deserialize_with = "de_opt_price")]
    pub regular_price: Option<Decimal>,
    #[serde(deserialize_with = "de_opt_price")]
    pub sale_price: Option<Decimal>,
    #[serde(deserialize_with = "de_opt_string")]
    pub short_description: Option<String>,
    #[serde(deserialize_with = "deserialize_default_from_null")]
    pub stock_status: Availability,
    #[serde(deserialize_with = "deserialize_default_from_null")]
    pub images: Vec<ProductImage>,
    #[serde(deserialize_with = "deserialize_default_from_null")]
    pub categories: Vec<TermRef>,
    #[serde(deserialize_with = "deserialize_default_from_null")]
    pub attributes: Vec<ProductAttribute>,
}

impl Product {
    pub fn on_sale(&self) -> bool {
        matches!(
            (self.sale_price, self.regular_price),
            (Some(sale), Some(regular)) if sale < regular
        )
    }

    pub fn main_image(&self) -> Option<&ProductImage> {
        self.images.first()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ProductImage {
    #[serde(deserialize_with = "de_string")]
    pub src: String,
    #[serde(deserialize_with = "de_string")]
    pub alt: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct TermRef {
    #[serde(deserialize_with = "de_count")]
    pub id: u64,
    #[serde(deserialize_with = "de_string")]
    pub name: String,
    #[serde(deserialize_with = "de_string")]
    pub slug: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ProductAttribute {
    #[serde(deserialize_with = "de_string")]
    pub name: String,
    #[serde(deserialize_with = "deserialize_default_from_null")]
    pub options: Vec<String>,
}

/// One page of the remote product listing.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ProductListResult {
    #[serde(deserialize_with = "deserialize_default_from_null")]
    pub products: Vec<Product>,
    #[serde(deserialize_with = "de_count")]
    pub total: u64,
    #[serde(deserialize_with = "de_count")]
    pub total_pages: u64,
    #[serde(deserialize_with = "de_count")]
    pub current_page: u64,
    #[serde(deserialize_with = "de_count")]
    pub per_page: u64,
}

/// Reads a listing body, defaulting every missing field.
/// Only a body that is not a JSON object is rejected.
pub fn parse_product_list_response(
    json: serde_json::Value,
) -> Result<ProductListResult, serde_json::Error> {
    match json {
        serde_json::Value::Null => Ok(ProductListResult::default()),
        json => serde_json::from_value(json),
    }
}

pub fn parse_product_response(json: serde_json::Value) -> Result<Product, serde_json::Error> {
    match json {
        // some endpoints wrap a single product as `{ "product": {...} }`
        serde_json::Value::Object(mut map) if map.contains_key("product") => {
            serde_json::from_value(map.remove("product").unwrap_or_default())
        }
        json => serde_json::from_value(json),
    }
}

pub fn de_opt_price<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StrOrNum {
        Str(String),
        Int(i64),
        Num(f64),
    }

    let v = Option::<StrOrNum>::deserialize(deserializer).unwrap_or(None);
    Ok(v.and_then(|x| match x {
        StrOrNum::Str(s) => Decimal::from_str(s.trim()).ok(),
        StrOrNum::Int(i) => Some(Decimal::from(i)),
        StrOrNum::Num(n) => Decimal::from_f64(n),
    }))
}
