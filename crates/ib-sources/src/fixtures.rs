//! Embedded fixture data for mock mode and fetch fallbacks.
//!
//! Fixtures go through the same parsing as live responses.

use ib_core::Result;

use crate::linkedin::ScrapinResponse;
use crate::record::{PostCollection, ProfileRecord};
use crate::twitter::{collect_posts, Tweet};

const LINKEDIN_PROFILE: &str = include_str!("../fixtures/linkedin_profile.json");
const POSTS: &str = include_str!("../fixtures/posts.json");

/// The fixture LinkedIn profile.
pub fn fixture_profile() -> Result<ProfileRecord> {
    let response: ScrapinResponse = serde_json::from_str(LINKEDIN_PROFILE)?;
    response.into_record()
}

/// The fixture posts, with URLs pointing at `handle`.
pub fn fixture_posts(handle: &str, limit: usize) -> Result<PostCollection> {
    let tweets: Vec<Tweet> = serde_json::from_str(POSTS)?;
    Ok(collect_posts(handle, tweets, limit))
}
