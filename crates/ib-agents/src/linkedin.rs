//! LinkedIn profile lookup agent.

use std::sync::LazyLock;

use regex::Regex;

use crate::{with_context, LookupAgent};

const SYSTEM_PROMPT: &str = r#"You find LinkedIn profile pages for people.

## How to work
1. Call `web_search` with the person's full name and the word "LinkedIn".
2. Pick the result that is a personal profile page (linkedin.com/in/...), not a
   company page, post, or directory listing.
3. If several profiles match, prefer the one that fits any extra context you
   were given, then the most complete and current one.
4. Search again with a refined query only if the first results contain no
   personal profile.

## Final answer
Reply with the profile URL only, in the form:
https://www.linkedin.com/in/profile-name/

If you cannot find a profile you are confident about, reply with exactly:
NOT_FOUND"#;

static PROFILE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:[a-z]{2,3}\.)?linkedin\.com/in/([A-Za-z0-9_%-]+)")
        .expect("linkedin profile regex")
});

pub struct LinkedInLookupAgent;

impl LinkedInLookupAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LinkedInLookupAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupAgent for LinkedInLookupAgent {
    fn name(&self) -> &str {
        "linkedin"
    }

    fn description(&self) -> &str {
        "Finds the most likely LinkedIn profile URL for a person's name"
    }

    fn system_prompt(&self) -> &str {
        SYSTEM_PROMPT
    }

    fn task(&self, name: &str, context: Option<&str>) -> String {
        with_context(
            format!(
                "Given the full name {}, get me a link to their LinkedIn profile page.",
                name.trim()
            ),
            context,
        )
    }

    fn extract(&self, answer: &str) -> Option<String> {
        let slug = PROFILE_URL.captures(answer)?.get(1)?.as_str();
        Some(format!("https://www.linkedin.com/in/{}/", slug))
    }
}
