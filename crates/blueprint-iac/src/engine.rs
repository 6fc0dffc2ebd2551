use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;

use blueprint_core::AiSettings;

use crate::IacFormat;

/// Templates must come out the same way run after run, so generation runs
/// near-deterministic rather than at chat defaults.
const TEMPERATURE: f32 = 0.2;
/// A full landing-zone template with parameters can run long.
const MAX_OUTPUT_TOKENS: u32 = 8192;

fn backend_for(provider: &str) -> Result<LLMBackend, String> {
    match provider {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "ollama" => Ok(LLMBackend::Ollama),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(format!(
            "unknown AI provider '{other}' (expected one of: openai, anthropic, google, ollama, groq, mistral, deepseek)"
        )),
    }
}

/// One chat round against the configured provider, tuned for template
/// generation: low temperature, bounded output.
pub async fn generate(
    settings: &AiSettings,
    format: IacFormat,
    system: &str,
    user_msg: &str,
) -> Result<String, String> {
    let backend = backend_for(&settings.provider)?;

    let mut builder = LLMBuilder::new()
        .backend(backend)
        .model(&settings.model)
        .system(system)
        .temperature(TEMPERATURE)
        .max_tokens(MAX_OUTPUT_TOKENS);

    if !settings.api_key.is_empty() {
        builder = builder.api_key(&settings.api_key);
    }

    let llm = builder.build().map_err(|e| {
        format!(
            "{} generation: could not configure {} client: {e}",
            format.as_str(),
            settings.provider
        )
    })?;

    let messages = vec![ChatMessage::user().content(user_msg).build()];

    let response = llm.chat(&messages).await.map_err(|e| {
        format!(
            "{} generation via {} failed: {e}",
            format.as_str(),
            settings.provider
        )
    })?;

    match response.text() {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(format!(
            "model returned an empty {} response",
            format.as_str()
        )),
    }
}
