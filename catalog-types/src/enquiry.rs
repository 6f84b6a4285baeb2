use crate::{de_opt_count, de_opt_string};
use serde::{Deserialize, Serialize};

/// Lead-capture payload posted to the enquiry endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Enquiry {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub interest: String,
    pub page_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_page: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct EnquiryReceipt {
    #[serde(deserialize_with = "de_opt_count")]
    pub id: Option<u64>,
    #[serde(deserialize_with = "de_opt_string")]
    pub status: Option<String>,
    #[serde(deserialize_with = "de_opt_string")]
    pub message: Option<String>,
}
