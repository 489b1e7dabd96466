use dotenvy::dotenv;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use teams_digital_agent::agent::DigitalAgent;
use teams_digital_agent::bot::{router, AppState, ConnectorClient, TokenValidator};
use teams_digital_agent::config::Settings;
use tracing::{error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting credentials from log output
struct RedactionPatterns {
    api_key_query: Regex,
    bearer: Regex,
    client_secret: Regex,
    env_keys: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            api_key_query: Regex::new(r"([?&]key=)[A-Za-z0-9_-]+")?,
            bearer: Regex::new(r"(?i)(bearer\s+)[A-Za-z0-9._~+/=-]+")?,
            client_secret: Regex::new(r"(client_secret=)[^\s&]+")?,
            env_keys: Regex::new(r"((?:GEMINI_API_KEY|MICROSOFT_APP_PASSWORD)=)[^\s&]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .api_key_query
            .replace_all(&output, "$1[REDACTED]")
            .to_string();
        output = self.bearer.replace_all(&output, "$1[REDACTED]").to_string();
        output = self
            .client_secret
            .replace_all(&output, "$1[REDACTED]")
            .to_string();
        output = self
            .env_keys
            .replace_all(&output, "$1[REDACTED]")
            .to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // The original buffer length satisfies the contract even when
        // the redacted string length differs.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Initialize redaction patterns early (before logging)
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    // Setup logging with redaction
    init_logging(patterns);

    info!("Starting Teams Digital Agent...");

    // Load settings
    let settings = init_settings();

    // Initialize the agent (validates the model configuration)
    let agent = init_agent(&settings);

    // Outbound connector and inbound validation
    let connector = Arc::new(ConnectorClient::new(&settings));
    let validator = init_validator(&settings);

    let state = Arc::new(AppState {
        settings: settings.clone(),
        agent,
        connector,
        validator,
        http: reqwest::Client::new(),
    });

    let app = router(state);

    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        "Listening on {} (messaging endpoint: POST /api/messages)",
        addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_agent(settings: &Settings) -> Arc<DigitalAgent> {
    match DigitalAgent::new(settings) {
        Ok(agent) => {
            info!("Agent initialized (model: {}).", settings.gemini_model);
            Arc::new(agent)
        }
        Err(e) => {
            error!("Failed to initialize agent: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_validator(settings: &Settings) -> Option<Arc<TokenValidator>> {
    if settings.auth_configured() {
        let app_id = settings.microsoft_app_id.clone().unwrap_or_default();
        info!("Inbound token validation enabled (app id: {}).", app_id);
        Some(Arc::new(TokenValidator::new(app_id)))
    } else {
        warn!(
            "MICROSOFT_APP_ID/MICROSOFT_APP_PASSWORD not configured; \
             running in local emulator mode without inbound auth"
        );
        None
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received.");
    }
}
