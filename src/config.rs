// src/config.rs
use crate::constants::{DEFAULT_API_HOST, DEFAULT_DOMAIN, DEFAULT_RETRY_ATTEMPTS};
use crate::error::AppError;
use clap::{Parser, Subcommand};
use std::fmt;

/// Parsed command-line input. Every credential flag falls back to its
/// environment variable.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CommandLineInput {
    /// Enable verbose logging (debug level)
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Open platform base URL
    #[arg(long, env = "LARK_HOST")]
    pub host: Option<String>,

    /// App ID of the custom app
    #[arg(long, env = "LARK_APP_ID")]
    pub app_id: Option<String>,

    /// App secret, needed to issue tenant access tokens
    #[arg(long, env = "LARK_APP_SECRET", hide_env_values = true)]
    pub app_secret: Option<String>,

    /// Tenant domain used in generated links (e.g. "example.feishu.cn")
    #[arg(long, env = "LARK_DOMAIN")]
    pub domain: Option<String>,

    /// Act as a user with this token instead of as the app
    #[arg(long, env = "LARK_USER_ACCESS_TOKEN", hide_env_values = true)]
    pub user_access_token: Option<String>,

    /// Attempts per request when the network fails
    #[arg(long, default_value_t = DEFAULT_RETRY_ATTEMPTS)]
    pub retries: u32,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print a document's blocks with references resolved
    Document {
        /// Document ID
        id: String,

        /// Print the nested tree instead of the flat reading order
        #[arg(long, default_value_t = false)]
        tree: bool,
    },

    /// List the tables of a bitable app
    Tables {
        /// Bitable app token
        app: String,
    },

    /// List the records of one table
    Records {
        /// Bitable app token
        app: String,

        /// Table ID
        table: String,

        /// Field filter as KEY=VALUE; repeat for more clauses
        #[arg(long = "filter", value_parser = parse_key_value)]
        filters: Vec<(String, String)>,

        /// Read a saved view instead of filtering
        #[arg(long)]
        view: Option<String>,
    },

    /// Walk the node tree of a wiki space
    Wiki {
        /// Wiki space ID
        space: String,
    },
}

fn parse_key_value(input: &str) -> Result<(String, String), String> {
    match input.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got \"{}\"", input)),
    }
}

/// Resolved client configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct LarkConfig {
    pub host: String,
    pub app_id: String,
    /// Only required once a tenant token is actually requested.
    pub app_secret: Option<String>,
    pub domain: String,
    pub user_access_token: Option<String>,
    pub retry_attempts: u32,
}

impl fmt::Debug for LarkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("LarkConfig")
            .field("host", &self.host)
            .field("app_id", &self.app_id)
            .field("app_secret", &redact(&self.app_secret))
            .field("domain", &self.domain)
            .field("user_access_token", &redact(&self.user_access_token))
            .field("retry_attempts", &self.retry_attempts)
            .finish()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl LarkConfig {
    pub fn new(app_id: impl Into<String>, app_secret: Option<String>) -> Self {
        Self {
            host: DEFAULT_API_HOST.to_string(),
            app_id: app_id.into(),
            app_secret,
            domain: DEFAULT_DOMAIN.to_string(),
            user_access_token: None,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }

    /// Resolves a configuration from CLI input (flags, then environment,
    /// then defaults).
    pub fn resolve(cli: &CommandLineInput) -> Result<Self, AppError> {
        let app_id = non_blank(cli.app_id.clone()).ok_or_else(|| {
            AppError::MissingConfiguration(
                "LARK_APP_ID environment variable or --app-id not set".to_string(),
            )
        })?;

        let host = non_blank(cli.host.clone()).unwrap_or_else(|| DEFAULT_API_HOST.to_string());
        url::Url::parse(&host)
            .map_err(|e| AppError::Configuration(format!("Invalid host \"{}\": {}", host, e)))?;

        Ok(Self {
            host,
            app_id,
            app_secret: non_blank(cli.app_secret.clone()),
            domain: non_blank(cli.domain.clone()).unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
            user_access_token: non_blank(cli.user_access_token.clone()),
            retry_attempts: cli.retries.max(1),
        })
    }

    /// Resolves a configuration from the environment alone.
    pub fn from_env() -> Result<Self, AppError> {
        let var = |name: &str| std::env::var(name).ok();
        let app_id = non_blank(var("LARK_APP_ID")).ok_or_else(|| {
            AppError::MissingConfiguration("LARK_APP_ID environment variable not set".to_string())
        })?;
        let mut config = Self::new(app_id, non_blank(var("LARK_APP_SECRET")));
        if let Some(host) = non_blank(var("LARK_HOST")) {
            config.host = host;
        }
        if let Some(domain) = non_blank(var("LARK_DOMAIN")) {
            config.domain = domain;
        }
        config.user_access_token = non_blank(var("LARK_USER_ACCESS_TOKEN"));
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CommandLineInput {
        CommandLineInput::try_parse_from(std::iter::once("lark-kit").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn flags_override_defaults() {
        let cli = parse(&[
            "--app-id", "cli_a1", "--app-secret", "s3cret", "--domain", "example.feishu.cn",
            "records", "bas1", "tbl1", "--filter", "Tag=rust", "--filter", "Owner=Ada",
        ]);
        let config = LarkConfig::resolve(&cli).unwrap();
        assert_eq!(config.app_id, "cli_a1");
        assert_eq!(config.app_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.domain, "example.feishu.cn");
        assert_eq!(config.host, DEFAULT_API_HOST);
        assert!(!format!("{:?}", config).contains("s3cret"));
        assert_eq!(
            cli.command,
            Command::Records {
                app: "bas1".into(),
                table: "tbl1".into(),
                filters: vec![("Tag".into(), "rust".into()), ("Owner".into(), "Ada".into())],
                view: None,
            }
        );
    }

    #[test]
    fn malformed_filter_is_rejected_by_the_parser() {
        assert!(parse_key_value("no-equals").is_err());
        assert!(parse_key_value("=x").is_err());
        assert_eq!(parse_key_value("a=b=c"), Ok(("a".into(), "b=c".into())));
    }

    #[test]
    fn invalid_host_fails_fast() {
        let cli = parse(&["--app-id", "cli_a1", "--host", "not a url", "wiki", "sp1"]);
        assert!(matches!(LarkConfig::resolve(&cli), Err(AppError::Configuration(_))));
    }
}
