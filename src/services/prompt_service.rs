//! Turns a short description of a drawing into a video animation prompt.
//!
//! Results are cached per `description|details` pair so repeated requests for
//! the same drawing do not hit the language model again.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clients::{ResponseBody, ResponseRequest, TextGenerator};
use crate::config::OpenAiConfig;
use crate::services::PromptCache;

pub const PROMPT_INSTRUCTIONS: &str = r#"You are an expert at creating focused, magical animation prompts for 6-second videos.

Write ONE concise flowing paragraph that includes these elements (DO NOT label or number them):

- START with "Animate this child's drawing of [subject]"
- THEN state "Keep the hand-drawn, playful style but make the animation feel smooth, lively, and cinematic"
- ADD 2-3 KEY movements/actions maximum (choose the most impactful ones: a primary movement, an expression change, and one special moment)
- INCLUDE 2-3 CHARACTER-SPECIFIC cartoon effects that match the subject's theme/personality:
  * Electric characters (Pikachu): electric sparks, lightning bolts, glowing cheeks, zapping effects
  * Water creatures (fish, whale): water splashes, bubbles, ripples, droplets
  * Fire characters (dragon): smoke puffs, tiny flames, warm glows, embers
  * Flying things (bird, plane): swoosh lines, air currents, feathers/leaves trailing
  * Space themes: stars, planets, sparkles, cosmic dust
  * Generic/cute: hearts, musical notes, sparkles, gentle glows
- DESCRIBE the background in ONE sentence (colorful, simple layers)
- ADD 2-3 CONTEXTUALLY APPROPRIATE small details that FIT the subject and scene:
  * DON'T just default to "butterfly" - be creative and relevant!
  * For electric characters: tiny lightning bugs, glowing fireflies, static sparkles
  * For ocean scenes: fish, seashells, seaweed, coral, waves
  * For sky/air: clouds, birds, balloons, kites, paper planes
  * For forest: leaves, acorns, squirrels, mushrooms, flowers
  * For space: stars, planets, asteroids, comets, moon
  * For city: cars, buildings, streetlights, windows with lights
- END with a short magical phrase like "as if the drawing is leaping off the page into an animated world"

CRITICAL RULES FOR 6-SECOND VIDEOS:
- Keep it SHORT and FOCUSED - less is more!
- Maximum 2-3 main actions that can happen in 6 seconds
- Make effects and details MATCH the character/scene theme - be contextually creative!
- Write as ONE continuous flowing paragraph with NO labels, NO numbers, NO section headers
- NEVER use realistic descriptors like "glossy", "photorealistic", "realistic textures"
- ALWAYS maintain child-like, hand-drawn, cartoon style
- Prioritize ONE hero moment over many small actions"#;

const PROMPT_GUIDELINES: &str = "Keep it SHORT and impactful:
- Pick 2-3 KEY movements only (one main action + expression/reaction + hero moment)
- Add 2-3 effects that MATCH the character's theme (electric sparks for Pikachu, water splashes for fish, flames for dragons, etc.)
- Brief background description (one sentence)
- Add 2-3 small details that FIT the context (DON'T just use generic butterflies - think creatively about what belongs in this scene!)
- Short magical ending

Keep the hand-drawn, child-like style - NEVER make it realistic. Write as one flowing, concise paragraph optimized for 6 seconds.";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Failed to generate prompt: {0}")]
    Provider(String),

    #[error("Failed to generate prompt: OpenAI returned an empty response")]
    Empty,
}

impl From<anyhow::Error> for PromptError {
    fn from(err: anyhow::Error) -> Self {
        Self::Provider(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhancedPrompt {
    pub prompt: String,
    pub cached: bool,
}

pub struct PromptService {
    generator: Arc<dyn TextGenerator>,
    cache: Arc<PromptCache>,
    model: String,
    max_output_tokens: u32,
}

impl PromptService {
    #[must_use]
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        cache: Arc<PromptCache>,
        config: &OpenAiConfig,
    ) -> Self {
        Self {
            generator,
            cache,
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &PromptCache {
        &self.cache
    }

    /// Asks the language model for a fresh prompt. Never consults the cache.
    pub async fn synthesize(&self, description: &str, details: &str) -> Result<String, PromptError> {
        let request = ResponseRequest {
            model: self.model.clone(),
            instructions: PROMPT_INSTRUCTIONS.to_string(),
            input: build_user_message(description, details),
            max_output_tokens: self.max_output_tokens,
        };

        let response = self.generator.respond(&request).await?;

        extract_prompt(&response).ok_or_else(|| {
            warn!(description, "Language model returned no usable text");
            PromptError::Empty
        })
    }

    /// Returns the cached prompt for this pair, or synthesizes and caches one.
    pub async fn enhance(
        &self,
        description: &str,
        details: &str,
    ) -> Result<EnhancedPrompt, PromptError> {
        let key = PromptCache::key(description, details);

        if let Some(prompt) = self.cache.get(&key) {
            debug!(description, "Prompt cache hit");
            metrics::counter!("prompt_cache_requests_total", "result" => "hit").increment(1);
            return Ok(EnhancedPrompt {
                prompt,
                cached: true,
            });
        }

        metrics::counter!("prompt_cache_requests_total", "result" => "miss").increment(1);

        let prompt = self.synthesize(description, details).await?;
        self.cache.set(key, prompt.clone());

        info!(description, prompt_len = prompt.len(), "Generated animation prompt");

        Ok(EnhancedPrompt {
            prompt,
            cached: false,
        })
    }
}

/// User message for the language model. Mentions the requested animation only
/// when the caller gave one.
#[must_use]
pub fn build_user_message(description: &str, details: &str) -> String {
    let details = details.trim();
    if details.is_empty() {
        format!(
            "Create a focused 6-second animation prompt for this child's drawing: \"{description}\".\n\n{PROMPT_GUIDELINES}"
        )
    } else {
        format!(
            "Create a focused 6-second animation prompt for this child's drawing: \"{description}\". The user wants: {details}. \n\n{PROMPT_GUIDELINES}"
        )
    }
}

/// First non-empty text among `output_text`, the concatenated output parts,
/// and `choices[0].message.content`.
#[must_use]
pub fn extract_prompt(response: &ResponseBody) -> Option<String> {
    let non_empty = |text: &str| {
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    };

    if let Some(text) = response.output_text.as_deref().and_then(non_empty) {
        return Some(text);
    }

    if let Some(output) = &response.output {
        let stitched: String = output
            .iter()
            .filter_map(|item| item.content.as_ref())
            .flatten()
            .filter_map(|part| part.text())
            .collect();
        if let Some(text) = non_empty(&stitched) {
            return Some(text);
        }
    }

    response
        .choices
        .as_ref()
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.message.as_ref())
        .and_then(|message| message.content.as_ref())
        .and_then(|content| content.as_str())
        .and_then(non_empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedGenerator {
        body: serde_json::Value,
        calls: AtomicUsize,
    }

    impl ScriptedGenerator {
        fn new(body: serde_json::Value) -> Arc<Self> {
            Arc::new(Self {
                body,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn respond(&self, _request: &ResponseRequest) -> anyhow::Result<ResponseBody> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::from_value(self.body.clone())?)
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        async fn respond(&self, _request: &ResponseRequest) -> anyhow::Result<ResponseBody> {
            anyhow::bail!("OpenAI API error: 401 Unauthorized - Incorrect API key")
        }
    }

    fn body(value: serde_json::Value) -> ResponseBody {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_extract_prefers_output_text() {
        let response = body(json!({
            "output_text": "  Animate this dragon  ",
            "choices": [{ "message": { "content": "ignored" } }]
        }));
        assert_eq!(extract_prompt(&response).as_deref(), Some("Animate this dragon"));
    }

    #[test]
    fn test_extract_stitches_output_parts() {
        let response = body(json!({
            "output_text": "",
            "output": [
                { "content": [{ "text": "Animate this " }] },
                { "content": [{ "text": { "value": "fish" } }] }
            ]
        }));
        assert_eq!(extract_prompt(&response).as_deref(), Some("Animate this fish"));
    }

    #[test]
    fn test_extract_falls_back_to_choices() {
        let response = body(json!({
            "output": [{ "content": [{ "text": "   " }] }],
            "choices": [{ "message": { "content": "Animate this rocket" } }]
        }));
        assert_eq!(extract_prompt(&response).as_deref(), Some("Animate this rocket"));
    }

    #[test]
    fn test_extract_empty() {
        assert_eq!(extract_prompt(&body(json!({}))), None);
        assert_eq!(
            extract_prompt(&body(json!({ "choices": [{ "message": { "content": 42 } }] }))),
            None
        );
    }

    #[test]
    fn test_user_message_variants() {
        let plain = build_user_message("a red dragon", "   ");
        assert!(plain.contains("\"a red dragon\"."));
        assert!(!plain.contains("The user wants"));

        let detailed = build_user_message("a red dragon", "breathes fire");
        assert!(detailed.contains("The user wants: breathes fire."));
        assert!(detailed.contains("NEVER make it realistic"));
    }

    #[tokio::test]
    async fn test_enhance_uses_cache() {
        let generator = ScriptedGenerator::new(json!({ "output_text": "Animate this cat" }));
        let service = PromptService::new(
            generator.clone(),
            Arc::new(PromptCache::default()),
            &OpenAiConfig::default(),
        );

        let first = service.enhance("a cat", "").await.unwrap();
        assert!(!first.cached);
        assert_eq!(first.prompt, "Animate this cat");

        let second = service.enhance("a cat", "").await.unwrap();
        assert!(second.cached);
        assert_eq!(second.prompt, first.prompt);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

        service.enhance("a cat", "jumps").await.unwrap();
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_response_is_an_error_and_not_cached() {
        let service = PromptService::new(
            ScriptedGenerator::new(json!({ "output_text": "" })),
            Arc::new(PromptCache::default()),
            &OpenAiConfig::default(),
        );

        let err = service.enhance("a cat", "").await.unwrap_err();
        assert!(matches!(err, PromptError::Empty));
        assert!(service.cache().is_empty());
    }

    #[tokio::test]
    async fn test_provider_error_keeps_message() {
        let service = PromptService::new(
            Arc::new(FailingGenerator),
            Arc::new(PromptCache::default()),
            &OpenAiConfig::default(),
        );

        let err = service.synthesize("a cat", "").await.unwrap_err();
        assert!(err.to_string().contains("Incorrect API key"));
    }
}
