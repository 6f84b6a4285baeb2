use derive_more::Display;
use serde::{Deserialize, Deserializer, Serialize};

pub mod category;
pub mod enquiry;
pub mod facet;
pub mod post;
pub mod product;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display)]
pub enum Availability {
    #[serde(rename = "instock")]
    #[display("In stock")]
    InStock,
    #[serde(rename = "outofstock")]
    #[display("Out of stock")]
    OutOfStock,
    #[serde(rename = "onbackorder")]
    #[display("On order")]
    OnBackorder,
    #[default]
    #[serde(other)]
    #[display("Ask for availability")]
    Unknown,
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::InStock | Self::OnBackorder)
    }
}

/// Parses a human duration such as `10s`, `500ms` or `5m`.
/// A bare number is read as milliseconds.
pub fn parse_duration(duration: &str) -> Result<std::time::Duration, anyhow::Error> {
    let duration = duration.trim().to_lowercase().replace(' ', "");
    if let Ok(ms) = duration.parse::<u64>() {
        return Ok(std::time::Duration::from_millis(ms));
    }
    duration_str::parse(&duration)
        .map_err(|err| anyhow::anyhow!("Unable to parse duration {duration}: {err}"))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StrOrNum {
    Str(String),
    Int(i64),
    Num(f64),
    Bool(bool),
}

/// Lenient count: JSON numbers, numeric strings and `null` are all accepted,
/// anything unreadable becomes `0`.
pub fn de_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<StrOrNum>::deserialize(deserializer).unwrap_or(None);
    Ok(match v {
        Some(StrOrNum::Int(i)) => i.max(0) as u64,
        Some(StrOrNum::Num(n)) if n.is_finite() && n > 0.0 => n as u64,
        Some(StrOrNum::Str(s)) => s.trim().parse::<u64>().unwrap_or_default(),
        _ => 0,
    })
}

pub fn de_opt_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<StrOrNum>::deserialize(deserializer).unwrap_or(None);
    Ok(match v {
        Some(StrOrNum::Int(i)) if i >= 0 => Some(i as u64),
        Some(StrOrNum::Num(n)) if n.is_finite() && n >= 0.0 => Some(n as u64),
        Some(StrOrNum::Str(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    })
}

/// Strings that may arrive as numbers (numeric slugs, ids) or `null`.
pub fn de_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<StrOrNum>::deserialize(deserializer).unwrap_or(None);
    Ok(match v {
        Some(StrOrNum::Str(s)) => s,
        Some(StrOrNum::Int(i)) => i.to_string(),
        Some(StrOrNum::Num(n)) => n.to_string(),
        Some(StrOrNum::Bool(b)) => b.to_string(),
        None => String::new(),
    })
}

pub fn de_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Some(de_string(deserializer)?).filter(|s| !s.trim().is_empty()))
}
