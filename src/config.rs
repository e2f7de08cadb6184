use anyhow::{Context, Result};
use clap::Parser;
use std::env;

pub const DEFAULT_AUTH_BASE_URL: &str = "https://api.backblazeb2.com";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments; store credentials are
/// accepted from the environment only.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// B2 application key id (`B2_KEY_ID`).
    pub key_id: String,
    /// B2 application key secret (`B2_APPLICATION_KEY`).
    pub application_key: String,
    /// Bucket identifier used by listing/upload/delete calls (`B2_BUCKET_ID`).
    pub bucket_id: String,
    /// Bucket name, used to build public download URLs (`B2_BUCKET_NAME`).
    pub bucket_name: String,
    /// Base URL prepended to `<bucket>/<key>` for public file links.
    pub public_base_url: String,
    /// Account authorization endpoint base; overridable for tests.
    pub auth_base_url: String,
    /// Directory holding per-ingest scratch files.
    pub scratch_dir: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "B2 storage gateway — flat bucket as a file tree")]
pub struct Args {
    /// Host to bind to (overrides GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides GATEWAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Base URL for public file links (overrides GATEWAY_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Directory for in-flight transfer scratch files (overrides GATEWAY_SCRATCH_DIR)
    #[arg(long)]
    pub scratch_dir: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("GATEWAY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("GATEWAY_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing GATEWAY_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 5005,
            Err(err) => return Err(err).context("reading GATEWAY_PORT"),
        };
        let env_public = env::var("GATEWAY_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "https://f005.backblazeb2.com/file".into());
        let env_scratch =
            env::var("GATEWAY_SCRATCH_DIR").unwrap_or_else(|_| "./data/scratch".into());

        // --- Required store identity ---
        let key_id = env::var("B2_KEY_ID").context("B2_KEY_ID must be set")?;
        let application_key =
            env::var("B2_APPLICATION_KEY").context("B2_APPLICATION_KEY must be set")?;
        let bucket_id = env::var("B2_BUCKET_ID").context("B2_BUCKET_ID must be set")?;
        let bucket_name = env::var("B2_BUCKET_NAME").context("B2_BUCKET_NAME must be set")?;
        let auth_base_url =
            env::var("B2_AUTH_BASE_URL").unwrap_or_else(|_| DEFAULT_AUTH_BASE_URL.into());

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            key_id,
            application_key,
            bucket_id,
            bucket_name,
            public_base_url: args.public_base_url.unwrap_or(env_public),
            auth_base_url,
            scratch_dir: args.scratch_dir.unwrap_or(env_scratch),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
