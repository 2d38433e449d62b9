//! Prompt composition for the summary call.

use ib_core::Result;
use ib_sources::{PostCollection, ProfileRecord};

use crate::summary::OutputParser;

const NO_POSTS: &str = "(no recent posts)";

/// Build the single user prompt from the fetched data.
///
/// The whole profile and every post go in; nothing is truncated.
pub fn compose(profile: &ProfileRecord, posts: &PostCollection) -> Result<String> {
    let information = profile.to_pretty_json()?;

    let twitter_posts = if posts.is_empty() {
        NO_POSTS.to_string()
    } else {
        posts
            .iter()
            .map(|post| format!("- {}\n  {}", post.text.trim(), post.url))
            .collect::<Vec<_>>()
            .join("\n")
    };

    Ok(format!(
        "Given the information about a person from LinkedIn:\n\
         ```json\n{information}\n```\n\n\
         and their latest Twitter posts (@{handle}):\n\
         {twitter_posts}\n\n\
         I want you to create:\n\
         1. A short summary about the person\n\
         2. Two interesting facts about them\n\
         3. One ice breaker: an opening question or remark that fits them\n\
         4. One topic of interest they would enjoy talking about\n\n\
         Use information from both LinkedIn and Twitter. Focus on professional \
         achievements, interests and recent activity that would suit a networking \
         conversation.\n\n\
         {instructions}",
        handle = posts.handle(),
        instructions = OutputParser::format_instructions(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ib_sources::{fixture_posts, fixture_profile, Post};
    use serde_json::Value;

    /// Every scalar leaf of a JSON value, rendered as it appears in pretty JSON.
    fn leaves(value: &Value, out: &mut Vec<String>) {
        match value {
            Value::Object(map) => map.values().for_each(|v| leaves(v, out)),
            Value::Array(items) => items.iter().for_each(|v| leaves(v, out)),
            Value::Null => {}
            other => out.push(other.to_string()),
        }
    }

    #[test]
    fn test_includes_every_profile_field_and_post() {
        let profile = fixture_profile().unwrap();
        let posts = fixture_posts("jordanavery", 5).unwrap();
        let prompt = compose(&profile, &posts).unwrap();

        for (key, value) in profile.iter() {
            assert!(prompt.contains(&format!("\"{}\"", key)), "missing key {key}");
            let mut values = Vec::new();
            leaves(value, &mut values);
            for leaf in values {
                assert!(prompt.contains(&leaf), "missing value {leaf}");
            }
        }
        for post in posts.iter() {
            assert!(prompt.contains(post.text.trim()));
            assert!(prompt.contains(&post.url));
        }
        assert!(prompt.contains("@jordanavery"));
        assert!(prompt.contains("JSON Schema"));
    }

    #[test]
    fn test_is_deterministic() {
        let profile = fixture_profile().unwrap();
        let posts = fixture_posts("jordanavery", 5).unwrap();
        assert_eq!(
            compose(&profile, &posts).unwrap(),
            compose(&profile, &posts).unwrap()
        );
    }

    #[test]
    fn test_empty_posts() {
        let profile = fixture_profile().unwrap();
        let posts = PostCollection::new("quiet", Vec::<Post>::new());
        let prompt = compose(&profile, &posts).unwrap();
        assert!(prompt.contains(NO_POSTS));
    }
}
