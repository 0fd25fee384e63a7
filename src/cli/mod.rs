use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (groq, openai, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "groq")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., https://api.groq.com)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider. Required for every provider except Ollama.
    #[arg(long, env = "CHAT_API_KEY", default_value = "", hide_env_values = true)]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., mixtral-8x7b-32768, gpt-4o-mini, llama3)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Seconds to wait for a reply before the turn fails with a timeout.
    #[arg(long, env = "CHAT_TIMEOUT_SECS", default_value = "60")]
    pub chat_timeout_secs: u64,

    // --- Document Store Args ---
    /// Transcript document store type (redis, memory)
    #[arg(long, env = "STORE_TYPE", default_value = "redis")]
    pub store_type: String,

    /// JSON credential bundle for the document store,
    /// e.g. {"url":"redis://127.0.0.1:6379","password":"..."}
    #[arg(long, env = "STORE_CREDENTIALS", hide_env_values = true)]
    pub store_credentials: Option<String>,

    /// Prefix for transcript document keys.
    #[arg(long, env = "STORE_KEY_PREFIX", default_value = "chat:")]
    pub store_key_prefix: String,

    /// How transcript writes reconcile with the stored copy (last-writer-wins, compare-and-swap)
    #[arg(long, env = "STORE_WRITE_MODE", default_value = "last-writer-wins")]
    pub store_write_mode: String,

    // --- General App Args ---
    /// Optional path to a JSON persona catalog replacing the built-in one.
    #[arg(long, env = "PERSONAS_PATH")]
    pub personas_path: Option<String>,

    /// Host address and port for the WebSocket server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Port for the HTTP API. The API is disabled when unset.
    #[arg(long, env = "HTTP_PORT")]
    pub http_port: Option<u16>,

    /// Optional API Key required for clients to connect to the WebSocket server. If set, clients must provide this key.
    #[arg(long, env = "SERVER_API_KEY", hide_env_values = true)]
    pub server_api_key: Option<String>,

    /// Optional path to the TLS certificate file (PEM format) for enabling WSS. Requires --tls-key.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling WSS. Requires --tls-cert.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}
