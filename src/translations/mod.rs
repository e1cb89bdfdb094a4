use tera::{Context as TeraContext, Tera};

use crate::error::TranslateError;
use crate::providers::GenerationConfig;

mod parse;

pub use parse::{parse_translations, reconcile};

const BATCH_PROMPT: &str = include_str!("prompts/batch_prompt.tera");
const SELECTION_PROMPT: &str = include_str!("prompts/selection_prompt.tera");
const QUESTION_PROMPT: &str = include_str!("prompts/question_prompt.tera");

pub const BATCH_GENERATION: GenerationConfig = GenerationConfig {
    temperature: 0.2,
    top_p: 0.8,
    top_k: 40,
    max_output_tokens: None,
};

pub const SELECTION_GENERATION: GenerationConfig = GenerationConfig {
    temperature: 0.1,
    top_p: 0.9,
    top_k: 20,
    max_output_tokens: Some(1000),
};

pub const QUESTION_GENERATION: GenerationConfig = GenerationConfig {
    temperature: 0.4,
    top_p: 0.9,
    top_k: 40,
    max_output_tokens: Some(2048),
};

/// A prompt together with the sampling parameters of its mode.
#[derive(Debug, Clone)]
pub struct PromptRequest {
    pub prompt: String,
    pub generation: GenerationConfig,
}

/// Builds the batch prompt: every fragment tagged with its index inside the
/// chunk, answer expected as a JSON array in the same order.
pub fn render_batch_prompt(
    fragments: &[String],
    target_lang: &str,
) -> Result<PromptRequest, TranslateError> {
    let segments = fragments
        .iter()
        .enumerate()
        .map(|(index, fragment)| format!("[{}] {}", index, fragment))
        .collect::<Vec<_>>()
        .join("\n\n");
    let mut context = TeraContext::new();
    context.insert("target_lang", target_lang);
    context.insert("segments", &segments);
    Ok(PromptRequest {
        prompt: Tera::one_off(BATCH_PROMPT, &context, false)?,
        generation: BATCH_GENERATION,
    })
}

pub fn render_selection_prompt(
    text: &str,
    target_lang: &str,
) -> Result<PromptRequest, TranslateError> {
    let mut context = TeraContext::new();
    context.insert("target_lang", target_lang);
    context.insert("text", text);
    Ok(PromptRequest {
        prompt: Tera::one_off(SELECTION_PROMPT, &context, false)?,
        generation: SELECTION_GENERATION,
    })
}

pub fn render_question_prompt(
    selected_text: &str,
    question: &str,
    response_lang: &str,
) -> Result<PromptRequest, TranslateError> {
    let mut context = TeraContext::new();
    context.insert("selected_text", selected_text);
    context.insert("question", question);
    context.insert("response_lang", response_lang);
    Ok(PromptRequest {
        prompt: Tera::one_off(QUESTION_PROMPT, &context, false)?,
        generation: QUESTION_GENERATION,
    })
}
