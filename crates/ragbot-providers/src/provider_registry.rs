//! Provider registry — maps provider names to endpoint configurations.
//!
//! Every entry speaks the OpenAI wire format and serves both `/embeddings`
//! and `/chat/completions`; the unified `OpenAiCompatibleProvider` uses these
//! configs to reach any of them.

/// How to attach auth credentials to requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// No authentication required (local servers).
    None,
}

/// Configuration for a single provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Provider identifier.
    pub name: &'static str,
    /// Base URL for the API.
    pub base_url: &'static str,
    /// Path for chat completions endpoint (appended to base_url).
    pub chat_path: &'static str,
    /// Path for the embeddings endpoint (appended to base_url).
    pub embeddings_path: &'static str,
    /// Environment variable names to try for the API key (in order).
    pub env_keys: &'static [&'static str],
    /// How to send auth credentials.
    pub auth_style: AuthStyle,
    /// Environment variable to override the base URL (e.g., OLLAMA_HOST).
    pub base_url_env: Option<&'static str>,
}

impl ProviderConfig {
    /// Whether requests must carry a key.
    pub fn requires_api_key(&self) -> bool {
        self.auth_style == AuthStyle::Bearer
    }

    /// The configured key if set, otherwise the first non-empty variable
    /// from this provider's own `env_keys`.
    pub fn resolve_api_key(&self, configured: &str, env: impl Fn(&str) -> Option<String>) -> String {
        if !configured.trim().is_empty() {
            return configured.to_string();
        }
        self.env_keys
            .iter()
            .find_map(|key| env(key).filter(|v| !v.trim().is_empty()))
            .unwrap_or_default()
    }
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// All known providers.
static PROVIDERS: &[ProviderConfig] = &[
    ProviderConfig {
        name: "openai",
        base_url: "https://api.openai.com/v1",
        chat_path: "/chat/completions",
        embeddings_path: "/embeddings",
        env_keys: &["OPENAI_API_KEY"],
        auth_style: AuthStyle::Bearer,
        base_url_env: Some("OPENAI_API_BASE"),
    },
    ProviderConfig {
        name: "mistral",
        base_url: "https://api.mistral.ai/v1",
        chat_path: "/chat/completions",
        embeddings_path: "/embeddings",
        env_keys: &["MISTRAL_API_KEY"],
        auth_style: AuthStyle::Bearer,
        base_url_env: None,
    },
    ProviderConfig {
        name: "ollama",
        base_url: "http://localhost:11434/v1",
        chat_path: "/chat/completions",
        embeddings_path: "/embeddings",
        env_keys: &[],
        auth_style: AuthStyle::None,
        base_url_env: Some("OLLAMA_HOST"),
    },
    ProviderConfig {
        name: "llamacpp",
        base_url: "http://localhost:8080/v1",
        chat_path: "/chat/completions",
        embeddings_path: "/embeddings",
        env_keys: &[],
        auth_style: AuthStyle::None,
        base_url_env: Some("LLAMACPP_HOST"),
    },
];

/// Look up a provider config by name.
pub fn get_provider_config(name: &str) -> Option<&'static ProviderConfig> {
    let lookup = match name {
        "llama.cpp" => "llamacpp",
        other => other,
    };
    PROVIDERS.iter().find(|p| p.name == lookup)
}

/// List all known provider names.
pub fn all_provider_names() -> Vec<&'static str> {
    PROVIDERS.iter().map(|p| p.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_alias() {
        assert_eq!(get_provider_config("openai").unwrap().auth_style, AuthStyle::Bearer);
        assert_eq!(get_provider_config("llama.cpp").unwrap().name, "llamacpp");
        assert!(get_provider_config("nope").is_none());
    }

    #[test]
    fn test_local_providers_need_no_auth() {
        for name in ["ollama", "llamacpp"] {
            assert_eq!(get_provider_config(name).unwrap().auth_style, AuthStyle::None);
        }
    }

    #[test]
    fn test_resolve_api_key_uses_own_env_only() {
        let env = |key: &str| match key {
            "OPENAI_API_KEY" => Some("sk-openai".to_string()),
            "MISTRAL_API_KEY" => Some("msk-mistral".to_string()),
            _ => None,
        };
        let mistral = get_provider_config("mistral").unwrap();
        assert_eq!(mistral.resolve_api_key("", env), "msk-mistral");
        assert_eq!(mistral.resolve_api_key("from-file", env), "from-file");

        let openai = get_provider_config("openai").unwrap();
        assert_eq!(openai.resolve_api_key("", env), "sk-openai");

        let ollama = get_provider_config("ollama").unwrap();
        assert_eq!(ollama.resolve_api_key("", env), "");
        assert!(!ollama.requires_api_key());
    }

    #[test]
    fn test_names_are_unique() {
        let mut names = all_provider_names();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
    }
}
