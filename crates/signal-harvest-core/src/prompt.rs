//! Prompt builders for the completion service.
//!
//! Both builders are pure functions: the same input always yields the same
//! prompt text, so a prompt can be logged, diffed, and replayed.

use crate::models::{ContentItem, Sector, Tone};

/// Novelty below this value means the model should answer `null`.
pub const PROMPT_MIN_NOVELTY: u8 = 3;

/// Urgency below this value means the model should answer `null`.
pub const PROMPT_MIN_URGENCY: u8 = 5;

/// Build the insight extraction prompt for a post.
///
/// Depends only on the post's channel, title, and content.
pub fn build_extraction_prompt(item: &ContentItem) -> String {
    let sectors = join_names(Sector::ALL.iter().map(|s| s.as_str()));
    let tones = join_names(Tone::ALL.iter().map(|t| t.as_str()));

    format!(
        r#"Forum post from r/{channel}:
Title: {title}
Content: {content}

You are a market analyst looking for early product and business signals.
Read the post and describe what it reveals:
- "signal": one or two sentences naming the underlying need, pain, or shift.
- "whyItMatters": why this matters to someone building a product or business.
- "actionAngle": a concrete, opinionated recommendation for acting on it.
- "sector": exactly one of {sectors}.
- "tone": exactly one of {tones}.
- "urgencyScore": integer from 1 to 10, how pressing the need is.
- "noveltyScore": integer from 1 to 10, how new or under-served the idea is.
- "interestingScore": integer from 1 to 100, overall interest to an analyst.

If noveltyScore would be below {min_novelty} or urgencyScore would be below {min_urgency}, respond with null and nothing else.

Otherwise respond with a single JSON object with exactly the keys signal, whyItMatters, actionAngle, sector, tone, urgencyScore, noveltyScore, interestingScore. Do not write any text outside the JSON object."#,
        channel = item.channel,
        title = item.title,
        content = item.content,
        sectors = sectors,
        tones = tones,
        min_novelty = PROMPT_MIN_NOVELTY,
        min_urgency = PROMPT_MIN_URGENCY,
    )
}

/// Build the channel discovery prompt for a free-text search query.
pub fn build_discovery_prompt(query: &str, count: usize) -> String {
    format!(
        r#"Identify {count} of the most relevant, active, and public subreddits where people discuss topics related to the following subject:

"{query}"

Focus on subreddits that:
- Are currently active (recent posts in the past month)
- Are public and not restricted or banned
- Attract discussion from real users, not just news or link dumps
- Are relevant even for complex or niche topics

Respond with only a JSON array of subreddit names without the r/ prefix, for example:
["example1", "example2", "example3"]"#,
        count = count,
        query = query.trim(),
    )
}

fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names
        .map(|n| format!("\"{}\"", n))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Scope;
    use chrono::Utc;

    fn item(title: &str) -> ContentItem {
        ContentItem {
            id: "id-1".to_string(),
            url: "https://reddit.com/r/SaaS/comments/1/".to_string(),
            title: title.to_string(),
            content: "We churn 8% monthly and nobody knows why.".to_string(),
            channel: "SaaS".to_string(),
            source: Scope::background().source_tag().to_string(),
            created_at: Utc::now(),
            score: 10,
            scope_query: None,
            scope_user_id: None,
        }
    }

    #[test]
    fn test_extraction_prompt_is_deterministic() {
        let a = build_extraction_prompt(&item("Churn is killing us"));
        let mut other = item("Churn is killing us");
        other.id = "id-2".to_string();
        other.score = 999;
        let b = build_extraction_prompt(&other);
        assert_eq!(a, b);
    }

    #[test]
    fn test_extraction_prompt_embeds_post_and_contract() {
        let prompt = build_extraction_prompt(&item("Churn is killing us"));
        assert!(prompt.contains("r/SaaS"));
        assert!(prompt.contains("Title: Churn is killing us"));
        assert!(prompt.contains("nobody knows why"));
        assert!(prompt.contains("\"Creator Tools\""));
        assert!(prompt.contains("\"Sarcastic\""));
        assert!(prompt.contains("interestingScore"));
        assert!(prompt.contains("respond with null"));
        assert!(prompt.contains("below 3"));
        assert!(prompt.contains("below 5"));
    }

    #[test]
    fn test_discovery_prompt_mentions_query_and_count() {
        let prompt = build_discovery_prompt("  meal prep for shift workers ", 5);
        assert!(prompt.contains("\"meal prep for shift workers\""));
        assert!(prompt.starts_with("Identify 5 "));
        assert!(prompt.contains("JSON array"));
    }
}
