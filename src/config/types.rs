use serde::Deserialize;

/// Main configuration structure for Site-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub target: TargetConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl Config {
    /// Returns the URL the dynamic renderer should load
    pub fn render_url(&self) -> &str {
        self.target
            .render_url
            .as_deref()
            .unwrap_or(&self.target.seed_url)
    }
}

/// What to harvest
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Seed URL; its host establishes the allowed-domain set
    #[serde(rename = "seed-url")]
    pub seed_url: String,

    /// Page loaded by the dynamic renderer (defaults to the seed URL)
    #[serde(rename = "render-url", default)]
    pub render_url: Option<String>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum link depth to follow from the seed URL
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum number of in-flight requests
    #[serde(
        rename = "max-concurrent-requests",
        default = "default_max_concurrent_requests"
    )]
    pub max_concurrent_requests: u32,

    /// Minimum time between requests to the same host (milliseconds)
    #[serde(rename = "politeness-delay-ms", default = "default_politeness_delay_ms")]
    pub politeness_delay_ms: u64,

    /// Whether robots.txt directives are honored
    #[serde(rename = "obey-robots", default = "default_true")]
    pub obey_robots: bool,

    /// Whole-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_concurrent_requests: default_max_concurrent_requests(),
            politeness_delay_ms: default_politeness_delay_ms(),
            obey_robots: true,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

impl UserAgentConfig {
    /// Formats the user agent header: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "site-harvest".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/site-harvest".to_string(),
        }
    }
}

/// Output locations
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Root directory of the mirrored content
    #[serde(rename = "content-dir", default = "default_content_dir")]
    pub content_dir: String,

    /// SQLite index of the corpus and the analysis session log
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,

    /// JSON array of discovered API endpoint literals
    #[serde(rename = "api-endpoints-path", default = "default_api_endpoints_path")]
    pub api_endpoints_path: String,

    /// JSON array of messages buffered by the rendered page
    #[serde(rename = "message-log-path", default = "default_message_log_path")]
    pub message_log_path: String,

    /// Directory receiving one report file per analysis turn
    #[serde(rename = "reports-dir", default = "default_reports_dir")]
    pub reports_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            content_dir: default_content_dir(),
            database_path: default_database_path(),
            api_endpoints_path: default_api_endpoints_path(),
            message_log_path: default_message_log_path(),
            reports_dir: default_reports_dir(),
        }
    }
}

/// Dynamic rendering pass configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Wait after navigation (milliseconds)
    #[serde(rename = "settle-ms", default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Wait after scrolling to the bottom (milliseconds)
    #[serde(rename = "scroll-settle-ms", default = "default_scroll_settle_ms")]
    pub scroll_settle_ms: u64,

    #[serde(
        rename = "navigation-timeout-ms",
        default = "default_navigation_timeout_ms"
    )]
    pub navigation_timeout_ms: u64,

    /// Explicit Chromium executable; auto-detected when absent
    #[serde(rename = "chrome-path", default)]
    pub chrome_path: Option<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            settle_ms: default_settle_ms(),
            scroll_settle_ms: default_scroll_settle_ms(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            chrome_path: None,
        }
    }
}

/// How token costs are obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenCounterKind {
    /// Ask the analysis service
    Service,
    /// Approximate locally (about four characters per token)
    Estimate,
}

/// Analysis session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the generative language API
    #[serde(rename = "api-base", default = "default_api_base")]
    pub api_base: String,

    /// Environment variable holding the API key
    #[serde(rename = "api-key-env", default = "default_api_key_env")]
    pub api_key_env: String,

    /// Maximum summed token cost per batch
    #[serde(rename = "token-ceiling", default = "default_token_ceiling")]
    pub token_ceiling: u64,

    /// Fixed delay between consecutive turns (seconds)
    #[serde(rename = "turn-delay-secs", default = "default_turn_delay_secs")]
    pub turn_delay_secs: u64,

    #[serde(rename = "token-counter", default = "default_token_counter")]
    pub token_counter: TokenCounterKind,

    /// File extensions left out of the analysis corpus
    #[serde(rename = "skip-extensions", default = "default_skip_extensions")]
    pub skip_extensions: Vec<String>,

    #[serde(rename = "framing-prompt", default)]
    pub framing_prompt: Option<String>,

    #[serde(rename = "final-prompt", default)]
    pub final_prompt: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: default_model(),
            api_base: default_api_base(),
            api_key_env: default_api_key_env(),
            token_ceiling: default_token_ceiling(),
            turn_delay_secs: default_turn_delay_secs(),
            token_counter: default_token_counter(),
            skip_extensions: default_skip_extensions(),
            framing_prompt: None,
            final_prompt: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_depth() -> u32 {
    1000
}

fn default_max_concurrent_requests() -> u32 {
    2
}

fn default_politeness_delay_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_content_dir() -> String {
    "downloaded_content".to_string()
}

fn default_database_path() -> String {
    "site_harvest.db".to_string()
}

fn default_api_endpoints_path() -> String {
    "api_endpoints.json".to_string()
}

fn default_message_log_path() -> String {
    "websocket_traffic.json".to_string()
}

fn default_reports_dir() -> String {
    "ai_responses".to_string()
}

fn default_settle_ms() -> u64 {
    5000
}

fn default_scroll_settle_ms() -> u64 {
    2000
}

fn default_navigation_timeout_ms() -> u64 {
    30_000
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_token_ceiling() -> u64 {
    530_000
}

fn default_turn_delay_secs() -> u64 {
    60
}

fn default_token_counter() -> TokenCounterKind {
    TokenCounterKind::Service
}

fn default_skip_extensions() -> Vec<String> {
    vec!["css".to_string()]
}
