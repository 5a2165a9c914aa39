use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;

use admin_session::auth::{CredentialStore, FileStorage};
use admin_session::config::{self, CliArgs, Command, Config};
use admin_session::models::PaginationQuery;
use admin_session::navigation::{Navigator, RouteTracker};
use admin_session::transport::{ApiRequest, ReqwestTransport};
use admin_session::ApiClient;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::load();
    let config = Config::from_args(&args)?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::debug!("API base URL: {}", config.base_url);
    tracing::debug!("Session file: {}", config.session_file.display());

    let storage = Arc::new(FileStorage::new(config.session_file.clone()));
    let store = Arc::new(CredentialStore::load(storage));
    let transport = Arc::new(ReqwestTransport::new(
        &config.base_url,
        config.http_connect_timeout,
        config.http_request_timeout,
    )?);
    let navigator = Arc::new(RouteTracker::new(config.route.clone()));

    let client = ApiClient::new(transport, store, navigator.clone(), config.refresh_timeout);

    let result = run(&client, args.command).await;

    if navigator.current_path() != config.route {
        eprintln!("Session expired. Log in again with: admin-session login");
    }
    result
}

async fn run(client: &ApiClient, command: Command) -> Result<()> {
    match command {
        Command::Login { email, password } => {
            let credentials = config::resolve_login_credentials(email, password)?;
            client.session().login(&credentials).await?;
            match client.session().current_user() {
                Some(user) => println!("Logged in as user {}", user.id),
                None => println!("Login request completed but no user was returned"),
            }
        }

        Command::Logout => {
            client.session().logout();
            println!("Logged out");
        }

        Command::Whoami => match client.session().current_user() {
            Some(user) => print_json(&serde_json::to_value(&user)?)?,
            None => println!("Not logged in"),
        },

        Command::Request {
            method,
            path,
            body,
            query,
        } => {
            let method = config::parse_method(&method)?;
            let params = query
                .iter()
                .map(|pair| config::parse_query_pair(pair))
                .collect::<Result<Vec<_>>>()?;

            let mut request = ApiRequest::new(method, path).with_query(params);
            if let Some(body) = body {
                let body: Value =
                    serde_json::from_str(&body).context("Request body is not valid JSON")?;
                request = request.with_body(body);
            }

            let response = client.execute(request).await?;
            print_json(&response.body)?;
        }

        Command::List {
            path,
            page,
            page_size,
            search,
            order_by,
            sort_order,
        } => {
            let query = PaginationQuery {
                page_number: page,
                page_size,
                sort_order,
                order_by,
                search,
            };
            let envelope = client.get_page::<Value>(&path, &query).await?;
            if !envelope.is_success {
                anyhow::bail!(
                    "List request failed: {}",
                    envelope.message.unwrap_or_else(|| "no message".to_string())
                );
            }
            match envelope.data {
                Some(page) => {
                    for item in &page.items {
                        print_json(item)?;
                    }
                    println!(
                        "Page {}/{} ({} total)",
                        page.current_page, page.total_pages, page.total_count
                    );
                }
                None => println!("No data"),
            }
        }
    }

    Ok(())
}

fn print_json(value: &Value) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to format JSON")?
    );
    Ok(())
}
