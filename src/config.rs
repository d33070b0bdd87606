//! Configuration helpers: provider presets and environment overrides

use std::env;

/// Environment variable overriding the endpoint URL
pub const BASE_URL_ENV: &str = "LLM_WRAPPER_BASE_URL";

/// Environment variable supplying the model name
pub const MODEL_ENV: &str = "LLM_WRAPPER_MODEL";

/// Environment variable supplying the API key
pub const API_KEY_ENV: &str = "LLM_WRAPPER_API_KEY";

/// Key sent when none is configured; LM Studio accepts any value
pub const DEFAULT_API_KEY: &str = "lm-studio";

/// Supported provider shortcuts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    LMStudio,
    Ollama,
    LlamaCpp,
    VLLM,
    OpenAI,
}

impl Provider {
    /// Get the default base URL for this provider
    pub fn default_url(&self) -> &'static str {
        match self {
            Provider::LMStudio => "http://localhost:1234/v1",
            Provider::Ollama => "http://localhost:11434/v1",
            Provider::LlamaCpp => "http://localhost:8080/v1",
            Provider::VLLM => "http://localhost:8000/v1",
            Provider::OpenAI => "https://api.openai.com/v1",
        }
    }

    /// Whether the server needs local images inlined as data URLs
    pub fn needs_inline_images(&self) -> bool {
        matches!(self, Provider::VLLM | Provider::LlamaCpp)
    }

    /// Parse a provider from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "lmstudio" | "lm-studio" | "lm_studio" => Some(Provider::LMStudio),
            "ollama" => Some(Provider::Ollama),
            "llamacpp" | "llama-cpp" | "llama_cpp" | "llama.cpp" => Some(Provider::LlamaCpp),
            "vllm" => Some(Provider::VLLM),
            "openai" => Some(Provider::OpenAI),
            _ => None,
        }
    }
}

/// Get the base URL from environment variable or provider default
///
/// Priority:
/// 1. `LLM_WRAPPER_BASE_URL` environment variable
/// 2. Provider default URL (if provider is Some)
/// 3. fallback parameter
/// 4. LM Studio's default URL
pub fn get_base_url(provider: Option<Provider>, fallback: Option<&str>) -> String {
    resolve_base_url(|key| env::var(key).ok(), provider, fallback)
}

/// Get the model name from environment variable or fallback
///
/// When `prefer_env` is true, `LLM_WRAPPER_MODEL` wins over the fallback.
pub fn get_model(fallback: Option<&str>, prefer_env: bool) -> Option<String> {
    resolve_model(|key| env::var(key).ok(), fallback, prefer_env)
}

/// Get the API key from `LLM_WRAPPER_API_KEY`, or the LM Studio placeholder
pub fn get_api_key() -> String {
    env::var(API_KEY_ENV).unwrap_or_else(|_| DEFAULT_API_KEY.to_string())
}

fn resolve_base_url(
    lookup: impl Fn(&str) -> Option<String>,
    provider: Option<Provider>,
    fallback: Option<&str>,
) -> String {
    if let Some(url) = lookup(BASE_URL_ENV).filter(|u| !u.is_empty()) {
        return url;
    }

    if let Some(p) = provider {
        return p.default_url().to_string();
    }

    fallback
        .unwrap_or(Provider::LMStudio.default_url())
        .to_string()
}

fn resolve_model(
    lookup: impl Fn(&str) -> Option<String>,
    fallback: Option<&str>,
    prefer_env: bool,
) -> Option<String> {
    if prefer_env {
        if let Some(model) = lookup(MODEL_ENV).filter(|m| !m.is_empty()) {
            return Some(model);
        }
    }

    fallback.map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_provider_default_urls() {
        assert_eq!(Provider::LMStudio.default_url(), "http://localhost:1234/v1");
        assert_eq!(Provider::Ollama.default_url(), "http://localhost:11434/v1");
        assert_eq!(Provider::LlamaCpp.default_url(), "http://localhost:8080/v1");
        assert_eq!(Provider::VLLM.default_url(), "http://localhost:8000/v1");
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(Provider::parse("lmstudio"), Some(Provider::LMStudio));
        assert_eq!(Provider::parse("LM-Studio"), Some(Provider::LMStudio));
        assert_eq!(Provider::parse("ollama"), Some(Provider::Ollama));
        assert_eq!(Provider::parse("llama.cpp"), Some(Provider::LlamaCpp));
        assert_eq!(Provider::parse("vLLM"), Some(Provider::VLLM));
        assert_eq!(Provider::parse("unknown"), None);
    }

    #[test]
    fn test_inline_images_for_vllm() {
        assert!(Provider::VLLM.needs_inline_images());
        assert!(!Provider::OpenAI.needs_inline_images());
    }

    #[test]
    fn test_resolve_base_url_priority() {
        let env = |key: &str| (key == BASE_URL_ENV).then(|| "http://env:9000/v1".to_string());
        assert_eq!(
            resolve_base_url(env, Some(Provider::Ollama), None),
            "http://env:9000/v1"
        );
        assert_eq!(
            resolve_base_url(no_env, Some(Provider::Ollama), None),
            "http://localhost:11434/v1"
        );
        assert_eq!(
            resolve_base_url(no_env, None, Some("http://custom:8080/v1")),
            "http://custom:8080/v1"
        );
        assert_eq!(
            resolve_base_url(no_env, None, None),
            "http://localhost:1234/v1"
        );
    }

    #[test]
    fn test_resolve_model() {
        let env = |key: &str| (key == MODEL_ENV).then(|| "env-model".to_string());
        assert_eq!(
            resolve_model(env, Some("fallback"), true),
            Some("env-model".to_string())
        );
        assert_eq!(
            resolve_model(env, Some("fallback"), false),
            Some("fallback".to_string())
        );
        assert_eq!(resolve_model(no_env, None, true), None);
    }
}
