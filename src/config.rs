use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::{Input, Password};
use reqwest::Method;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::LoginCredentials;

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://test.payplan.zerolafrica.com/api/v1";

/// Admin session client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// API base URL
    #[arg(short = 'u', long, env = "API_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Path to the persisted session file
    #[arg(short = 's', long, env = "SESSION_FILE")]
    pub session_file: Option<String>,

    /// Route the caller is on; forced logouts do not redirect from signup
    #[arg(long, env = "CURRENT_ROUTE", default_value = "/dashboard")]
    pub route: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP connect timeout in seconds
    #[arg(long, env = "HTTP_CONNECT_TIMEOUT", default_value = "10")]
    pub connect_timeout: u64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    /// Token refresh timeout in seconds
    #[arg(long, env = "REFRESH_TIMEOUT", default_value = "30")]
    pub refresh_timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Log in with a management account
    Login {
        /// Account email (prompted when omitted)
        #[arg(short, long, env = "ADMIN_EMAIL")]
        email: Option<String>,

        /// Account password (prompted when omitted)
        #[arg(short, long, env = "ADMIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Clear the stored session
    Logout,

    /// Show the stored user
    Whoami,

    /// Send an authenticated request and print the response body
    Request {
        /// GET, POST, PUT or DELETE
        method: String,

        /// Path relative to the base URL
        path: String,

        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,

        /// Query parameter as key=value, repeatable
        #[arg(short, long = "query")]
        query: Vec<String>,
    },

    /// Fetch one page of a list endpoint
    List {
        /// Path relative to the base URL
        path: String,

        #[arg(long, default_value = "1")]
        page: u32,

        #[arg(long, default_value = "10")]
        page_size: u32,

        #[arg(long)]
        search: Option<String>,

        #[arg(long)]
        order_by: Option<String>,

        #[arg(long)]
        sort_order: Option<String>,
    },
}

impl CliArgs {
    /// Parse arguments after loading `.env`
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::parse()
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub base_url: String,
    pub session_file: PathBuf,
    pub route: String,
    pub log_level: String,

    // HTTP client
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,
    pub refresh_timeout: Duration,
}

impl Config {
    /// Build configuration with priority: CLI > ENV > defaults
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let session_file = match args.session_file.as_deref() {
            Some(path) => expand_tilde(path),
            None => default_session_file()
                .context("Could not determine a session file location, set SESSION_FILE")?,
        };

        Ok(Config {
            base_url: args.base_url.trim_end_matches('/').to_string(),
            session_file,
            route: args.route.clone(),
            log_level: args.log_level.clone(),
            http_connect_timeout: args.connect_timeout,
            http_request_timeout: args.http_timeout,
            refresh_timeout: Duration::from_secs(args.refresh_timeout),
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.base_url)
            .with_context(|| format!("API_BASE_URL is not a valid URL: {}", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("API_BASE_URL must use http or https: {}", self.base_url);
        }
        if self.http_connect_timeout == 0 || self.http_request_timeout == 0 {
            anyhow::bail!("HTTP timeouts must be greater than zero");
        }
        if self.refresh_timeout.is_zero() {
            anyhow::bail!("REFRESH_TIMEOUT must be greater than zero");
        }
        Ok(())
    }
}

/// Default session file under the user's local data directory
pub fn default_session_file() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("admin-session").join("session.json"))
}

/// Resolve a leading `~/` in a session file path against the home directory
fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Parse an HTTP method name
pub fn parse_method(s: &str) -> Result<Method> {
    match s.to_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "DELETE" => Ok(Method::DELETE),
        other => anyhow::bail!("Unsupported method: {} (use GET, POST, PUT or DELETE)", other),
    }
}

/// Parse a `key=value` query parameter
pub fn parse_query_pair(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .with_context(|| format!("Query parameter must be key=value: {}", s))?;
    if key.is_empty() {
        anyhow::bail!("Query parameter has an empty key: {}", s);
    }
    Ok((key.to_string(), value.to_string()))
}

/// Fill in missing login fields interactively
pub fn resolve_login_credentials(
    email: Option<String>,
    password: Option<String>,
) -> Result<LoginCredentials> {
    let email = match email {
        Some(email) => email,
        None => Input::new()
            .with_prompt("Email")
            .interact_text()
            .context("Failed to read email")?,
    };

    let password = match password {
        Some(password) => password,
        None => Password::new()
            .with_prompt("Password")
            .interact()
            .context("Failed to read password")?,
    };

    if email.trim().is_empty() || password.is_empty() {
        anyhow::bail!("Email and password are required");
    }

    Ok(LoginCredentials {
        email: email.trim().to_string(),
        password,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_session_file_under_home_is_expanded() {
        let args = parse(&[
            "admin-session",
            "--session-file",
            "~/.admin-session/session.json",
            "whoami",
        ]);
        let config = Config::from_args(&args).unwrap();

        if let Some(home) = dirs::home_dir() {
            assert_eq!(config.session_file, home.join(".admin-session/session.json"));
        }
        assert!(config.session_file.ends_with(".admin-session/session.json"));
    }

    #[test]
    fn test_session_file_without_home_prefix_is_kept() {
        assert_eq!(expand_tilde("~"), PathBuf::from("~"));
        assert_eq!(expand_tilde("~admin/session.json"), PathBuf::from("~admin/session.json"));
        assert_eq!(
            expand_tilde("/var/lib/admin-session/session.json"),
            PathBuf::from("/var/lib/admin-session/session.json")
        );
    }

    #[test]
    fn test_default_session_file_location() {
        if let Some(path) = default_session_file() {
            assert!(path.ends_with("admin-session/session.json"));
        }
    }

    #[test]
    fn test_parse_method() {
        assert_eq!(parse_method("get").unwrap(), Method::GET);
        assert_eq!(parse_method("Post").unwrap(), Method::POST);
        assert_eq!(parse_method("PUT").unwrap(), Method::PUT);
        assert_eq!(parse_method("delete").unwrap(), Method::DELETE);
        assert!(parse_method("PATCH").is_err());
    }

    #[test]
    fn test_parse_query_pair() {
        assert_eq!(
            parse_query_pair("pageSize=10").unwrap(),
            ("pageSize".to_string(), "10".to_string())
        );
        assert_eq!(
            parse_query_pair("search=a=b").unwrap(),
            ("search".to_string(), "a=b".to_string())
        );
        assert_eq!(
            parse_query_pair("search=").unwrap(),
            ("search".to_string(), String::new())
        );
        assert!(parse_query_pair("novalue").is_err());
        assert!(parse_query_pair("=x").is_err());
    }

    #[test]
    fn test_from_args_explicit_values() {
        let args = parse(&[
            "admin-session",
            "--base-url",
            "http://localhost:5000/api/",
            "--session-file",
            "/tmp/session.json",
            "--refresh-timeout",
            "7",
            "whoami",
        ]);
        let config = Config::from_args(&args).unwrap();

        assert_eq!(config.base_url, "http://localhost:5000/api");
        assert_eq!(config.session_file, PathBuf::from("/tmp/session.json"));
        assert_eq!(config.refresh_timeout, Duration::from_secs(7));
        assert_eq!(args.command, Command::Whoami);
        config.validate().unwrap();
    }

    #[test]
    fn test_request_subcommand() {
        let args = parse(&[
            "admin-session",
            "--session-file",
            "/tmp/s.json",
            "request",
            "post",
            "/accounts/activation",
            "--body",
            "{\"userId\":1}",
            "-q",
            "a=1",
            "-q",
            "b=2",
        ]);
        match args.command {
            Command::Request {
                method,
                path,
                body,
                query,
            } => {
                assert_eq!(method, "post");
                assert_eq!(path, "/accounts/activation");
                assert_eq!(body.as_deref(), Some("{\"userId\":1}"));
                assert_eq!(query, vec!["a=1", "b=2"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let args = parse(&[
            "admin-session",
            "--base-url",
            "ftp://example.com",
            "--session-file",
            "/tmp/s.json",
            "logout",
        ]);
        assert!(Config::from_args(&args).unwrap().validate().is_err());

        let args = parse(&[
            "admin-session",
            "--base-url",
            "not a url",
            "--session-file",
            "/tmp/s.json",
            "logout",
        ]);
        assert!(Config::from_args(&args).unwrap().validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let args = parse(&[
            "admin-session",
            "--session-file",
            "/tmp/s.json",
            "--refresh-timeout",
            "0",
            "logout",
        ]);
        assert!(Config::from_args(&args).unwrap().validate().is_err());
    }

    #[test]
    fn test_resolve_login_credentials_without_prompt() {
        let creds =
            resolve_login_credentials(Some(" a@b.com ".to_string()), Some("x".to_string()))
                .unwrap();
        assert_eq!(creds.email, "a@b.com");
        assert_eq!(creds.password, "x");

        assert!(resolve_login_credentials(Some("a@b.com".to_string()), Some(String::new())).is_err());
    }
}
