//! Prompt builders for the content-generation calls.
//!
//! Each call to the completion endpoint is stateless; continuity comes
//! entirely from the memory-record summary embedded in the prompt text.

use crate::news::Headline;

/// Summarize one inbound message.
pub fn summary(email_text: &str) -> String {
    format!(
        r#"You are an assistant that summarizes emails.
Given the following email text, provide a brief summary of key points:

Email text: "{email_text}""#
    )
}

/// Conversational reply to the day's messages.
pub fn reply(summaries: &[String], profile: &str) -> String {
    format!(
        r#"You are Messej, a charming and witty AI pen pal. What you know about the user:
{profile}

You have received the following email summaries today:
{}

Write a short, friendly reply addressing them collectively.
Keep it concise, warm, and helpful."#,
        summaries.join("\n---\n")
    )
}

/// A 2-3 sentence fact related to one of today's headlines.
pub fn fact(headlines: &[Headline]) -> String {
    format!(
        r#"Given these news headlines:
{}

Generate a fascinating historical fact or scientific insight that relates to one of these headlines.
The fact should add depth or interesting context to the news story.
Keep it to 2-3 sentences and make it engaging."#,
        format_titles(headlines)
    )
}

/// A short first-person story tied to one of today's headlines.
pub fn story(headlines: &[Headline], profile: &str) -> String {
    format!(
        r#"You are Messej, a charming and witty AI pen pal. What you know about the user:
{profile}

Looking at today's headlines:
{}

Share a brief, entertaining personal story that relates to one of these headlines.
Make it humorous and playful, as if you're sharing an amusing anecdote with a friend."#,
        format_titles(headlines)
    )
}

/// Structured extraction of profile facts from an inbound message.
pub fn extraction(email_text: &str) -> String {
    format!(
        r#"Given the following email from the user, extract any personal information it clearly provides.

Email text: "{email_text}"

Respond with a single JSON object using only these keys, omitting any the
email says nothing about:
  "name"                - what the user wants to be called
  "interests"           - list of hobbies or interests
  "work_notes"          - what they do for work
  "learning_goals"      - list of things they are learning
  "schedule_preference" - early bird / night owl / similar
  "news_topics"         - list of news topics they care about
  "location"            - city or area they live in
  "timezone"            - IANA timezone name
  "topics"              - list of topics this email touched on

Only include fields where information was clearly provided.
Output ONLY the JSON object."#
    )
}

fn format_titles(headlines: &[Headline]) -> String {
    headlines
        .iter()
        .map(|h| format!("- {} ({})", h.title, h.source))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_headlines() -> Vec<Headline> {
        vec![Headline {
            title: "Probe reaches outer belt".into(),
            source: "Wire".into(),
            url: "https://example.com/probe".into(),
        }]
    }

    #[test]
    fn fact_prompt_lists_titles() {
        let prompt = fact(&sample_headlines());
        assert!(prompt.contains("Probe reaches outer belt"));
        assert!(prompt.contains("(Wire)"));
    }

    #[test]
    fn reply_prompt_embeds_profile_and_summaries() {
        let prompt = reply(
            &["went hiking last weekend".to_string()],
            "Interests: hiking",
        );
        assert!(prompt.contains("Interests: hiking"));
        assert!(prompt.contains("went hiking last weekend"));
    }

    #[test]
    fn extraction_prompt_names_all_keys() {
        let prompt = extraction("I love hiking");
        for key in [
            "name",
            "interests",
            "work_notes",
            "learning_goals",
            "schedule_preference",
            "news_topics",
            "location",
            "timezone",
            "topics",
        ] {
            assert!(prompt.contains(key), "missing key {}", key);
        }
    }
}
