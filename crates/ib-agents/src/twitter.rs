//! Twitter/X handle lookup agent.

use std::sync::LazyLock;

use regex::Regex;

use crate::{with_context, LookupAgent};

const SYSTEM_PROMPT: &str = r#"You find Twitter/X accounts for people.

## How to work
1. Call `web_search` with the person's full name and "Twitter" or "X".
2. Pick the result that is the person's own profile page (x.com/USERNAME or
   twitter.com/USERNAME), not a post about them or a fan account.
3. If several accounts match, prefer the one that fits any extra context you
   were given.

## Final answer
Reply with the username only, without the @ symbol. For example, if the
profile is https://x.com/johndoe, reply: johndoe

If you cannot find an account you are confident about, reply with exactly:
NOT_FOUND"#;

/// Path segments on x.com that are not user handles.
const RESERVED: &[&str] = &[
    "home", "search", "intent", "i", "share", "explore", "hashtag", "login",
];

static PROFILE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:www\.|mobile\.)?(?:x|twitter)\.com/@?([A-Za-z0-9_]{1,15})\b")
        .expect("twitter profile regex")
});

static MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)@([A-Za-z0-9_]{1,15})\b").expect("twitter mention regex")
});

static BARE_HANDLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@?([A-Za-z0-9_]{1,15})$").expect("twitter handle regex"));

pub struct TwitterLookupAgent;

impl TwitterLookupAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TwitterLookupAgent {
    fn default() -> Self {
        Self::new()
    }
}

fn accept(handle: &str) -> Option<String> {
    if RESERVED.iter().any(|r| r.eq_ignore_ascii_case(handle)) {
        None
    } else {
        Some(handle.to_string())
    }
}

impl LookupAgent for TwitterLookupAgent {
    fn name(&self) -> &str {
        "twitter"
    }

    fn description(&self) -> &str {
        "Finds the most likely Twitter/X username for a person's name"
    }

    fn system_prompt(&self) -> &str {
        SYSTEM_PROMPT
    }

    fn task(&self, name: &str, context: Option<&str>) -> String {
        with_context(
            format!(
                "Given the name {}, find a link to their Twitter/X profile page \
                 and extract their username from it.",
                name.trim()
            ),
            context,
        )
    }

    fn extract(&self, answer: &str) -> Option<String> {
        // The first usable match wins; reserved paths like /search are skipped.
        if let Some(handle) = PROFILE_URL
            .captures_iter(answer)
            .find_map(|caps| accept(&caps[1]))
        {
            return Some(handle);
        }
        if let Some(handle) = MENTION.captures_iter(answer).find_map(|caps| accept(&caps[1])) {
            return Some(handle);
        }
        let token = answer
            .trim()
            .trim_matches(|c: char| matches!(c, '.' | '`' | '"' | '\''));
        BARE_HANDLE.captures(token).and_then(|caps| accept(&caps[1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twitter_agent() {
        let agent = TwitterLookupAgent::new();
        assert_eq!(agent.name(), "twitter");
        assert!(agent
            .task("Jane Doe", Some("data engineer"))
            .contains("data engineer"));
    }

    #[test]
    fn test_extract_forms() {
        let agent = TwitterLookupAgent::new();
        assert_eq!(agent.extract("janedoe").as_deref(), Some("janedoe"));
        assert_eq!(agent.extract("@jane_doe").as_deref(), Some("jane_doe"));
        assert_eq!(agent.extract("`janedoe`.").as_deref(), Some("janedoe"));
        assert_eq!(agent.extract("https://x.com/JaneDoe").as_deref(), Some("JaneDoe"));
        assert_eq!(
            agent
                .extract("Found it: https://twitter.com/janedoe/status/12345")
                .as_deref(),
            Some("janedoe")
        );
        assert_eq!(
            agent.extract("Her handle is @janedoe on X").as_deref(),
            Some("janedoe")
        );
    }

    #[test]
    fn test_extract_skips_reserved_matches() {
        let agent = TwitterLookupAgent::new();
        assert_eq!(
            agent
                .extract("checked https://x.com/search?q=Jane then found https://x.com/janedoe")
                .as_deref(),
            Some("janedoe")
        );
        assert_eq!(
            agent.extract("not @home right now, try @janedoe").as_deref(),
            Some("janedoe")
        );
    }

    #[test]
    fn test_extract_rejects_invalid() {
        let agent = TwitterLookupAgent::new();
        assert_eq!(agent.extract("I could not find any account for her"), None);
        assert_eq!(agent.extract("https://x.com/search?q=jane"), None);
        assert_eq!(agent.extract("a_handle_that_is_far_too_long"), None);
        assert_eq!(agent.extract("https://www.netflix.com/title"), None);
    }
}
