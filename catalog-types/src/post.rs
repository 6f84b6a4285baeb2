use crate::{de_count, de_opt_string, de_string};
use serde::{Deserialize, Deserializer, Serialize};
use serde_aux::field_attributes::deserialize_default_from_null;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct BlogPost {
    #[serde(deserialize_with = "de_count")]
    pub id: u64,
    #[serde(deserialize_with = "de_string")]
    pub slug: String,
    #[serde(deserialize_with = "de_rendered")]
    pub title: String,
    #[serde(deserialize_with = "de_rendered")]
    pub excerpt: String,
    #[serde(deserialize_with = "de_rendered")]
    pub content: String,
    #[serde(deserialize_with = "de_string")]
    pub date: String,
    #[serde(deserialize_with = "de_opt_string")]
    pub featured_image: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct PostListResult {
    #[serde(deserialize_with = "deserialize_default_from_null")]
    pub posts: Vec<BlogPost>,
    #[serde(deserialize_with = "de_count")]
    pub total: u64,
    #[serde(deserialize_with = "de_count")]
    pub total_pages: u64,
}

// WordPress core returns `{"rendered": "..."}`, custom endpoints a plain string
fn de_rendered<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Rendered {
        Plain(String),
        Wrapped { rendered: String },
    }

    Ok(match Option::<Rendered>::deserialize(deserializer).unwrap_or(None) {
        Some(Rendered::Plain(s)) | Some(Rendered::Wrapped { rendered: s }) => s,
        None => String::new(),
    })
}

pub fn parse_post_list_response(
    json: serde_json::Value,
) -> Result<PostListResult, serde_json::Error> {
    match json {
        serde_json::Value::Null => Ok(PostListResult::default()),
        serde_json::Value::Array(posts) => {
            let posts = serde_json::from_value::<Vec<BlogPost>>(serde_json::Value::Array(posts))?;
            Ok(PostListResult {
                total: posts.len() as u64,
                total_pages: u64::from(!posts.is_empty()),
                posts,
            })
        }
        json => serde_json::from_value(json),
    }
}
