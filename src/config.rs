use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_CHAT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_VISION_MODEL: &str = "llama-3.2-90b-vision-preview";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-large-v3";

/// Process-wide settings, read once at startup and handed to the router.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub demo_mode: bool,
    pub port: u16,
    pub chat_model: String,
    pub vision_model: String,
    pub transcription_model: String,
    pub extract_demo_delay: Duration,
    pub generate_demo_delay: Duration,
    pub max_upload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            demo_mode: false,
            port: 8080,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            extract_demo_delay: Duration::from_millis(800),
            generate_demo_delay: Duration::from_millis(1000),
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. Blank values count as unset and
    /// unparseable numbers fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Self {
            api_key: get("GROQ_API_KEY"),
            api_base: get("GROQ_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            demo_mode: get("DEMO_MODE").as_deref() == Some("true"),
            port: get("PORT").and_then(|v| v.parse().ok()).unwrap_or(defaults.port),
            chat_model: get("GROQ_CHAT_MODEL").unwrap_or(defaults.chat_model),
            vision_model: get("GROQ_VISION_MODEL").unwrap_or(defaults.vision_model),
            transcription_model: get("GROQ_TRANSCRIPTION_MODEL").unwrap_or(defaults.transcription_model),
            extract_demo_delay: get("DEMO_EXTRACT_DELAY_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.extract_demo_delay),
            generate_demo_delay: get("DEMO_GENERATE_DELAY_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.generate_demo_delay),
            max_upload_bytes: get("MAX_UPLOAD_BYTES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_upload_bytes),
        }
    }

    /// Short, log-safe form of the API key.
    pub fn masked_api_key(&self) -> String {
        match &self.api_key {
            Some(key) => format!("{}...", key.chars().take(6).collect::<String>()),
            None => "<unset>".to_string(),
        }
    }
}
