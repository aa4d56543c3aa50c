//! Question-and-answer assistant over a text-generation API.
//!
//! One blocking request per question. Failures never propagate: a missing
//! key or a transport error comes back as a reply the user can read.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variables searched for the API key, in order.
pub const KEY_VARS: [&str; 2] = ["LEVELER_API_KEY", "API_KEY"];

const INSTRUCTION: &str = "You are a senior audio engineer and an expert on the classic \
optical leveling amplifier. Teach the user how it works. The threshold is fixed near -30 dB; \
peak reduction is an input gain that pushes the signal into that ceiling, and the gain knob \
only makes up level after compression. Gain reduction comes from an optical cell that reacts \
to light, so its behaviour depends on program history. The knee is soft and the ratio rises \
with level, from about 3:1 on quiet material to beyond 5:1 on loud peaks. Attack averages \
about 10 ms, slow enough to keep transients. Release happens in two stages: roughly half the \
reduction recovers within 60 to 100 ms, the rest over half a second to several seconds. Light \
compression lets the fast stage dominate and the sound breathes; heavy compression engages \
the slow stage and the sound becomes dense and steady. Answer in plain text without markdown \
emphasis; use quotes to highlight terms and hyphens for lists.";

const NO_KEY_REPLY: &str = "The assistant is not configured: no API key was found.\n\
Set LEVELER_API_KEY (or API_KEY) in the environment and try again.";

const TRANSPORT_REPLY: &str = "The assistant could not be reached. Check that the API key is \
valid, that the account has quota left and that the service is up.";

const EMPTY_REPLY: &str = "The assistant had nothing to say this time.";

/// `[assistant]` settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Model name.
    pub model: String,
    /// API base URL.
    pub endpoint: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: [Content<'a>; 1],
}

impl<'a> GenerateRequest<'a> {
    fn new(prompt: &'a str) -> Self {
        Self {
            system_instruction: Content {
                parts: [Part { text: INSTRUCTION }],
            },
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ReplyContent>,
}

#[derive(Debug, Deserialize)]
struct ReplyContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Debug, Deserialize)]
struct ReplyPart {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    /// Text of the first candidate, parts joined.
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().map(|p| p.text.as_str()).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

/// Pick the API key from `lookup`, trying [`KEY_VARS`] in order.
pub fn find_key(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    KEY_VARS
        .iter()
        .filter_map(|var| lookup(var))
        .find(|key| !key.trim().is_empty())
}

/// Blocking assistant client.
#[derive(Debug, Clone)]
pub struct Assistant {
    config: AssistantConfig,
    key: Option<String>,
}

impl Assistant {
    /// Assistant using the key from the environment.
    pub fn from_env(config: AssistantConfig) -> Self {
        Self::new(config, find_key(|var| std::env::var(var).ok()))
    }

    /// Assistant with an explicit key.
    pub fn new(config: AssistantConfig, key: Option<String>) -> Self {
        Self { config, key }
    }

    /// Whether a key is available.
    pub fn is_configured(&self) -> bool {
        self.key.is_some()
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Ask one question. Always returns something to show.
    pub fn ask(&self, prompt: &str) -> String {
        let Some(key) = &self.key else {
            tracing::warn!("assistant asked without an API key");
            return NO_KEY_REPLY.to_string();
        };
        match self.send(key, prompt) {
            Ok(Some(text)) => text,
            Ok(None) => EMPTY_REPLY.to_string(),
            Err(err) => {
                tracing::error!(error = %err, "assistant request failed");
                TRANSPORT_REPLY.to_string()
            }
        }
    }

    fn send(&self, key: &str, prompt: &str) -> reqwest::Result<Option<String>> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs.max(1)))
            .build()?;
        let response: GenerateResponse = client
            .post(self.url())
            .header("x-goog-api-key", key)
            .json(&GenerateRequest::new(prompt))
            .send()?
            .error_for_status()?
            .json()?;
        Ok(response.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn leveler_key_wins_over_generic_key() {
        let lookup = env(&[("API_KEY", "generic"), ("LEVELER_API_KEY", "specific")]);
        assert_eq!(find_key(lookup).as_deref(), Some("specific"));
        assert_eq!(find_key(env(&[("API_KEY", "generic")])).as_deref(), Some("generic"));
        assert_eq!(find_key(env(&[("LEVELER_API_KEY", "  ")])), None);
    }

    #[test]
    fn missing_key_explains_itself() {
        let assistant = Assistant::new(AssistantConfig::default(), None);
        assert!(!assistant.is_configured());
        let reply = assistant.ask("what does peak reduction do?");
        assert!(reply.contains("LEVELER_API_KEY"));
    }

    #[test]
    fn unreachable_service_gives_a_reply() {
        let config = AssistantConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            ..AssistantConfig::default()
        };
        let reply = Assistant::new(config, Some("key".into())).ask("hello");
        assert_eq!(reply, TRANSPORT_REPLY);
    }

    #[test]
    fn request_carries_instruction_and_prompt() {
        let body = serde_json::to_value(GenerateRequest::new("why two stages?")).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "why two stages?");
        let instruction = body["systemInstruction"]["parts"][0]["text"].as_str().unwrap();
        assert!(instruction.contains("fixed"));
    }

    #[test]
    fn reply_text_is_joined_from_parts() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Half "},{"text":"fast."}]}}]}"#,
        )
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("Half fast."));

        let blocked: GenerateResponse = serde_json::from_str(r#"{"candidates":[{}]}"#).unwrap();
        assert_eq!(blocked.text(), None);
        assert_eq!(GenerateResponse::default().text(), None);
    }

    #[test]
    fn url_joins_endpoint_and_model() {
        let config = AssistantConfig {
            endpoint: "https://api.example/v1/".into(),
            model: "m".into(),
            timeout_secs: 5,
        };
        assert_eq!(
            Assistant::new(config, None).url(),
            "https://api.example/v1/models/m:generateContent"
        );
    }
}
