//! Decoding of free-text model replies.
//!
//! The completion service offers no schema enforcement, so every reply is
//! treated as untrusted text. Decoding never fails: it always yields a
//! tagged [`Decoded`] value, and the caller decides what to log.

use serde_json::{Map, Value};

use crate::models::{InsightDraft, Sector, Tone};

/// Outcome of decoding an extraction reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A complete, in-range insight.
    Insight(InsightDraft),
    /// The model decided the post is not worth an insight.
    Skip,
    /// The reply could not be turned into an insight.
    Malformed { raw: String, reason: String },
}

/// Strip an optional Markdown code fence (```` ```json ```` or ```` ``` ````)
/// wrapped around a reply.
pub fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an info string such as `json` on the opening fence line.
    let rest = match rest.find('\n') {
        Some(idx) if rest[..idx].chars().all(|c| c.is_ascii_alphanumeric()) => &rest[idx + 1..],
        _ => rest
            .trim_start_matches(|c: char| c.is_ascii_alphabetic())
            .trim_start(),
    };
    rest.trim_end().trim_end_matches("```").trim()
}

/// Decode an extraction reply into a [`Decoded`] value.
///
/// An empty reply, a literal `null`, or an empty object mean "no insight".
/// Unknown extra keys are ignored; missing keys, wrong types, values
/// outside the closed enums, and out-of-range scores are malformed.
pub fn decode_insight(response: &str) -> Decoded {
    let body = strip_code_fences(response);
    if body.is_empty() {
        return Decoded::Skip;
    }

    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => return malformed(response, format!("invalid JSON: {}", e)),
    };

    let obj = match value {
        Value::Null => return Decoded::Skip,
        Value::Object(obj) if obj.is_empty() => return Decoded::Skip,
        Value::Object(obj) => obj,
        other => {
            return malformed(
                response,
                format!("expected a JSON object, got {}", json_type(&other)),
            )
        }
    };

    match insight_from_object(&obj) {
        Ok(draft) => Decoded::Insight(draft),
        Err(reason) => malformed(response, reason),
    }
}

/// Whether a draft clears the low-value thresholds.
pub fn passes_thresholds(draft: &InsightDraft, min_novelty: u8, min_urgency: u8) -> bool {
    draft.novelty_score >= min_novelty && draft.urgency_score >= min_urgency
}

/// Decode a channel discovery reply into at most `max` channel names.
///
/// Expects a JSON array of strings. Names are trimmed, a leading `r/` is
/// removed, invalid names are dropped, and duplicates are collapsed
/// case-insensitively. Returns `None` when nothing usable remains.
pub fn decode_channel_list(response: &str, max: usize) -> Option<Vec<String>> {
    let body = strip_code_fences(response);
    let values: Vec<Value> = serde_json::from_str(body).ok()?;

    let mut channels: Vec<String> = Vec::new();
    for value in values {
        let Some(name) = value.as_str() else {
            continue;
        };
        let name = name.trim();
        let name = name
            .strip_prefix("/r/")
            .or_else(|| name.strip_prefix("r/"))
            .unwrap_or(name);
        if !is_valid_channel_name(name) {
            continue;
        }
        if channels.iter().any(|c| c.eq_ignore_ascii_case(name)) {
            continue;
        }
        channels.push(name.to_string());
        if channels.len() == max {
            break;
        }
    }

    if channels.is_empty() {
        None
    } else {
        Some(channels)
    }
}

/// Forum names are 2–21 characters of ASCII letters, digits, and `_`.
pub fn is_valid_channel_name(name: &str) -> bool {
    (2..=21).contains(&name.len()) && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn insight_from_object(obj: &Map<String, Value>) -> Result<InsightDraft, String> {
    let sector: Sector = required_text(obj, "sector")?.parse()?;
    let tone: Tone = required_text(obj, "tone")?.parse()?;

    Ok(InsightDraft {
        signal: required_text(obj, "signal")?,
        why_it_matters: required_text(obj, "whyItMatters")?,
        action_angle: required_text(obj, "actionAngle")?,
        sector,
        tone,
        urgency_score: required_score(obj, "urgencyScore", 10)?,
        novelty_score: required_score(obj, "noveltyScore", 10)?,
        interesting_score: required_score(obj, "interestingScore", 100)?,
    })
}

fn required_text(obj: &Map<String, Value>, key: &str) -> Result<String, String> {
    match obj.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) => Err(format!("{} is empty", key)),
        Some(other) => Err(format!("{} must be a string, got {}", key, json_type(other))),
        None => Err(format!("missing key: {}", key)),
    }
}

fn required_score(obj: &Map<String, Value>, key: &str, max: i64) -> Result<u8, String> {
    let value = obj
        .get(key)
        .ok_or_else(|| format!("missing key: {}", key))?;

    let n = match value {
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i,
            (None, Some(f)) if f.fract() == 0.0 && f.abs() <= i64::MAX as f64 => f as i64,
            _ => return Err(format!("{} must be an integer, got {}", key, n)),
        },
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("{} must be an integer, got {:?}", key, s))?,
        other => return Err(format!("{} must be an integer, got {}", key, json_type(other))),
    };

    if !(1..=max).contains(&n) {
        return Err(format!("{} out of range 1..={}: {}", key, max, n));
    }
    // max <= 100 so the cast cannot truncate
    Ok(n as u8)
}

fn malformed(raw: &str, reason: String) -> Decoded {
    Decoded::Malformed {
        raw: raw.to_string(),
        reason,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = r#"{
        "signal": "Solo founders can't tell why users churn",
        "whyItMatters": "Churn tooling is priced for teams",
        "actionAngle": "Ship a one-click exit survey for indie SaaS",
        "sector": "SaaS",
        "tone": "Frustrated",
        "urgencyScore": 8,
        "noveltyScore": 6,
        "interestingScore": 74
    }"#;

    fn expect_insight(decoded: Decoded) -> InsightDraft {
        match decoded {
            Decoded::Insight(d) => d,
            other => panic!("expected insight, got {:?}", other),
        }
    }

    fn expect_malformed(decoded: Decoded) -> String {
        match decoded {
            Decoded::Malformed { reason, .. } => reason,
            other => panic!("expected malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("```JSON\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("```json {} ```"), "{}");
        assert_eq!(strip_code_fences("  {}  "), "{}");
        assert_eq!(strip_code_fences("null"), "null");
    }

    #[test]
    fn test_decode_valid_object() {
        let draft = expect_insight(decode_insight(GOOD));
        assert_eq!(draft.sector, Sector::SaaS);
        assert_eq!(draft.tone, Tone::Frustrated);
        assert_eq!(draft.urgency_score, 8);
        assert_eq!(draft.novelty_score, 6);
        assert_eq!(draft.interesting_score, 74);
        assert_eq!(draft.action_angle, "Ship a one-click exit survey for indie SaaS");
    }

    #[test]
    fn test_decode_fenced_object() {
        let fenced = format!("```json\n{}\n```", GOOD);
        expect_insight(decode_insight(&fenced));
    }

    #[test]
    fn test_decode_null_and_empty_are_skip() {
        assert_eq!(decode_insight("null"), Decoded::Skip);
        assert_eq!(decode_insight("```json\nnull\n```"), Decoded::Skip);
        assert_eq!(decode_insight(""), Decoded::Skip);
        assert_eq!(decode_insight("{}"), Decoded::Skip);
    }

    #[test]
    fn test_decode_prose_is_malformed() {
        let reason = expect_malformed(decode_insight("Sure! Here's the analysis: ..."));
        assert!(reason.contains("invalid JSON"));
    }

    #[test]
    fn test_decode_missing_key_is_malformed() {
        let reply = GOOD.replace("\"actionAngle\"", "\"action\"");
        let reason = expect_malformed(decode_insight(&reply));
        assert!(reason.contains("actionAngle"));
    }

    #[test]
    fn test_decode_out_of_range_score_is_malformed() {
        let reply = GOOD.replace("\"urgencyScore\": 8", "\"urgencyScore\": 11");
        let reason = expect_malformed(decode_insight(&reply));
        assert!(reason.contains("urgencyScore"));

        let reply = GOOD.replace("\"interestingScore\": 74", "\"interestingScore\": 0");
        expect_malformed(decode_insight(&reply));
    }

    #[test]
    fn test_decode_score_coercions() {
        let reply = GOOD
            .replace("\"urgencyScore\": 8", "\"urgencyScore\": \"9\"")
            .replace("\"noveltyScore\": 6", "\"noveltyScore\": 7.0");
        let draft = expect_insight(decode_insight(&reply));
        assert_eq!(draft.urgency_score, 9);
        assert_eq!(draft.novelty_score, 7);

        let reply = GOOD.replace("\"noveltyScore\": 6", "\"noveltyScore\": 6.5");
        expect_malformed(decode_insight(&reply));
    }

    #[test]
    fn test_decode_unknown_sector_is_malformed() {
        let reply = GOOD.replace("\"sector\": \"SaaS\"", "\"sector\": \"Crypto\"");
        let reason = expect_malformed(decode_insight(&reply));
        assert!(reason.contains("sector"));
    }

    #[test]
    fn test_decode_array_is_malformed() {
        let reason = expect_malformed(decode_insight("[1, 2, 3]"));
        assert!(reason.contains("array"));
    }

    #[test]
    fn test_passes_thresholds() {
        let mut draft = expect_insight(decode_insight(GOOD));
        assert!(passes_thresholds(&draft, 3, 5));
        draft.novelty_score = 2;
        draft.urgency_score = 9;
        assert!(!passes_thresholds(&draft, 3, 5));
    }

    #[test]
    fn test_decode_channel_list() {
        let channels =
            decode_channel_list(r#"["r/SaaS", "indiehackers", "saas", "bad name!", 7]"#, 5)
                .unwrap();
        assert_eq!(channels, vec!["SaaS", "indiehackers"]);
    }

    #[test]
    fn test_decode_channel_list_caps_and_rejects() {
        let channels = decode_channel_list("```json\n[\"aa\", \"bb\", \"cc\"]\n```", 2).unwrap();
        assert_eq!(channels, vec!["aa", "bb"]);
        assert!(decode_channel_list("['startups', 'SaaS']", 5).is_none());
        assert!(decode_channel_list("[]", 5).is_none());
        assert!(decode_channel_list("{\"channels\": []}", 5).is_none());
    }
}
