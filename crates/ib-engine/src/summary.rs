//! The structured answer the model must produce, and the parser that
//! turns raw model text into it.

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use ib_core::{Error, Result};

/// Conversation material about one person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct IceBreakerResult {
    /// A short summary of the person based on their LinkedIn profile and recent posts.
    pub summary: String,
    /// Exactly two interesting facts about the person.
    pub facts: [String; 2],
    /// One opening question or remark to start a conversation with them.
    pub ice_breaker: String,
    /// One topic the person is likely to enjoy talking about.
    pub topic_of_interest: String,
}

const SUMMARY_KEYS: &[&str] = &["summary"];
const FACTS_KEYS: &[&str] = &["facts", "interesting_facts"];
const ICE_BREAKER_KEYS: &[&str] = &["ice_breaker", "ice_breakers", "icebreaker"];
const TOPIC_KEYS: &[&str] = &["topic_of_interest", "topics_of_interest", "topic"];

/// Describes [`IceBreakerResult`] to the model and validates its answers.
pub struct OutputParser;

impl OutputParser {
    /// Instructions appended to the prompt, carrying the JSON Schema of the result.
    pub fn format_instructions() -> String {
        let schema = schema_for!(IceBreakerResult);
        format!(
            "Answer with a single JSON object that conforms to the JSON Schema below. \
             Do not include the schema itself, any explanation, or any text outside the object.\n\
             `facts` must contain exactly two strings.\n\n\
             ```json\n{:#}\n```",
            schema.as_value()
        )
    }

    /// Parse raw model output into a validated result.
    ///
    /// Accepts a fenced ```json block or the outermost `{...}` in the text.
    /// Fails with `Error::Validation` naming the first bad field.
    pub fn parse(raw: &str) -> Result<IceBreakerResult> {
        let json = extract_json(raw)
            .ok_or_else(|| Error::validation("no JSON object found in model output"))?;
        let value: Value = serde_json::from_str(json)
            .map_err(|e| Error::validation(format!("model output is not valid JSON: {}", e)))?;
        let Value::Object(fields) = value else {
            return Err(Error::validation("model output is not a JSON object"));
        };

        Ok(IceBreakerResult {
            summary: text_field(&fields, "summary", SUMMARY_KEYS, false)?,
            facts: facts_field(&fields)?,
            ice_breaker: text_field(&fields, "ice_breaker", ICE_BREAKER_KEYS, true)?,
            topic_of_interest: text_field(&fields, "topic_of_interest", TOPIC_KEYS, true)?,
        })
    }
}

fn extract_json(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();

    if let Some(start) = trimmed.find("```json") {
        let body = &trimmed[start + 7..];
        if let Some(end) = body.find("```") {
            return Some(body[..end].trim());
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

/// First non-null value under any of `keys`.
fn lookup<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .find(|value| !value.is_null())
}

fn text_field(
    fields: &Map<String, Value>,
    name: &str,
    keys: &[&str],
    allow_list: bool,
) -> Result<String> {
    let value = lookup(fields, keys)
        .ok_or_else(|| Error::validation(format!("missing field `{}`", name)))?;

    let text = match value {
        Value::String(s) => s.trim(),
        Value::Array(items) if allow_list => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or_default(),
        _ => {
            return Err(Error::validation(format!(
                "field `{}` must be a string",
                name
            )))
        }
    };

    if text.is_empty() {
        return Err(Error::validation(format!("field `{}` is empty", name)));
    }
    Ok(text.to_string())
}

fn facts_field(fields: &Map<String, Value>) -> Result<[String; 2]> {
    let value =
        lookup(fields, FACTS_KEYS).ok_or_else(|| Error::validation("missing field `facts`"))?;
    let Value::Array(items) = value else {
        return Err(Error::validation("field `facts` must be a list of two strings"));
    };

    let facts = items
        .iter()
        .map(|item| match item.as_str().map(str::trim) {
            Some(fact) if !fact.is_empty() => Ok(fact.to_string()),
            _ => Err(Error::validation(
                "field `facts` must contain only non-empty strings",
            )),
        })
        .collect::<Result<Vec<_>>>()?;

    <[String; 2]>::try_from(facts).map_err(|facts| {
        Error::validation(format!(
            "field `facts` must contain exactly 2 entries, got {}",
            facts.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "summary": "Jane is a data engineer at Acme.",
        "facts": ["She runs marathons.", "She mentors at a coding bootcamp."],
        "ice_breaker": "What got you into running marathons?",
        "topic_of_interest": "Data pipelines"
    }"#;

    #[test]
    fn test_parse_valid() {
        let result = OutputParser::parse(VALID).unwrap();
        assert_eq!(result.summary, "Jane is a data engineer at Acme.");
        assert_eq!(result.facts[1], "She mentors at a coding bootcamp.");
        assert_eq!(result.topic_of_interest, "Data pipelines");
    }

    #[test]
    fn test_parse_fenced_with_prose() {
        let raw = format!("Here you go:\n```json\n{}\n```\nHope this helps!", VALID);
        let result = OutputParser::parse(&raw).unwrap();
        assert_eq!(result.ice_breaker, "What got you into running marathons?");
    }

    #[test]
    fn test_parse_trims_and_accepts_aliases() {
        let raw = r#"{
            "summary": "  Jane.  ",
            "interesting_facts": [" one ", "two"],
            "ice_breakers": ["", "  Ask about Lisbon "],
            "topic": "Rust"
        }"#;
        let result = OutputParser::parse(raw).unwrap();
        assert_eq!(result.summary, "Jane.");
        assert_eq!(result.facts, ["one".to_string(), "two".to_string()]);
        assert_eq!(result.ice_breaker, "Ask about Lisbon");
        assert_eq!(result.topic_of_interest, "Rust");
    }

    #[test]
    fn test_missing_fields_are_validation_errors() {
        for field in ["summary", "facts", "ice_breaker", "topic_of_interest"] {
            let mut value: Value = serde_json::from_str(VALID).unwrap();
            value.as_object_mut().unwrap().remove(field);
            let err = OutputParser::parse(&value.to_string()).unwrap_err();
            assert!(err.is_validation(), "{field}: {err}");
            assert!(err.to_string().contains(field), "{field}: {err}");
        }
    }

    #[test]
    fn test_null_and_blank_fields_rejected() {
        let err = OutputParser::parse(
            r#"{"summary": null, "facts": ["a","b"], "ice_breaker": "q", "topic_of_interest": "t"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("summary"));

        let err = OutputParser::parse(
            r#"{"summary": "s", "facts": ["a","b"], "ice_breaker": "   ", "topic_of_interest": "t"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("ice_breaker"));
    }

    #[test]
    fn test_facts_shape_enforced() {
        let cases = [
            r#""a single fact""#,
            r#"["only one"]"#,
            r#"["a", "b", "c"]"#,
            r#"["a", ""]"#,
            r#"["a", 3]"#,
        ];
        for facts in cases {
            let raw = format!(
                r#"{{"summary": "s", "facts": {}, "ice_breaker": "q", "topic_of_interest": "t"}}"#,
                facts
            );
            let err = OutputParser::parse(&raw).unwrap_err();
            assert!(err.is_validation(), "{facts}");
            assert!(err.to_string().contains("facts"), "{facts}");
        }
    }

    #[test]
    fn test_no_json_is_validation_error() {
        let err = OutputParser::parse("I'm sorry, I can't help with that.").unwrap_err();
        assert!(err.is_validation());
        let err = OutputParser::parse("{not json}").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_format_instructions_describe_every_field() {
        let instructions = OutputParser::format_instructions();
        for field in ["summary", "facts", "ice_breaker", "topic_of_interest"] {
            assert!(instructions.contains(field), "{field}");
        }
        assert!(instructions.contains("exactly two"));
    }

    #[test]
    fn test_result_json_round_trip() {
        let result = OutputParser::parse(VALID).unwrap();
        let json = serde_json::to_string(&result).unwrap();
        let back: IceBreakerResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
        assert_eq!(OutputParser::parse(&json).unwrap(), result);
    }
}
