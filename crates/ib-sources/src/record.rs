use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use ib_core::{Error, Result};

/// Keys that never reach the prompt.
const DROPPED_KEYS: &[&str] = &["certifications"];

/// A cleaned LinkedIn profile: named attributes in key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileRecord(Map<String, Value>);

impl ProfileRecord {
    /// Build a record from a Scrapin `person` object.
    ///
    /// Top-level entries that are `null`, `""` or `[]` are dropped, as is
    /// `certifications`.
    pub fn from_person(person: Value) -> Result<Self> {
        let Value::Object(fields) = person else {
            return Err(Error::serialization("profile person is not a JSON object"));
        };

        let fields = fields
            .into_iter()
            .filter(|(key, value)| !DROPPED_KEYS.contains(&key.as_str()) && !is_blank(value))
            .collect();
        Ok(Self(fields))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Profile photo, if the source provided one.
    pub fn photo_url(&self) -> Option<&str> {
        ["photoUrl", "PhotoUrl"]
            .iter()
            .find_map(|key| self.0.get(*key).and_then(Value::as_str))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.0)?)
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// One post written by the account owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub text: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn new(handle: &str, id: &str, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: format!("https://twitter.com/{}/status/{}", handle, id),
            created_at: None,
        }
    }

    pub fn with_created_at(mut self, created_at: Option<DateTime<Utc>>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// The recent posts of one handle, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostCollection {
    handle: String,
    posts: Vec<Post>,
}

impl PostCollection {
    pub fn new(handle: impl Into<String>, posts: Vec<Post>) -> Self {
        Self {
            handle: handle.into(),
            posts,
        }
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Post> {
        self.posts.iter()
    }
}

impl<'a> IntoIterator for &'a PostCollection {
    type Item = &'a Post;
    type IntoIter = std::slice::Iter<'a, Post>;

    fn into_iter(self) -> Self::IntoIter {
        self.posts.iter()
    }
}
