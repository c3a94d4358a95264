// Provider defaults, overridable from the environment (or .env).

use std::env;

/// Sampling temperature sent with every completion request.
pub const TEMPERATURE: f32 = 0.8;

/// Upper bound on generated tokens per reply.
pub const MAX_COMPLETION_TOKENS: u32 = 200;

/// Environment variable holding the provider credential.
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// Cookie naming a browser's session.
pub const SESSION_COOKIE: &str = "sync_session";

// Use lazy_static to initialize static variables safely.
lazy_static::lazy_static! {
    pub static ref GROQ_API_URL: String = env::var("GROQ_API_URL").unwrap_or_else(|_| "https://api.groq.com/openai/v1".to_string());
    pub static ref SYNC_CHAT_MODEL: String = env::var("SYNC_CHAT_MODEL").unwrap_or_else(|_| "llama-3.3-70b-versatile".to_string());
    pub static ref REQUEST_TIMEOUT_SECS: u64 = env::var("SYNC_REQUEST_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(60);
    pub static ref SESSION_TTL_SECS: u64 = env::var("SYNC_SESSION_TTL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3600);
}
