//! CLI commands

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use fitmarket_http::{ApiClient, RequestOptions};
use reqwest::Method;
use serde_json::{Value, json};
use tracing::info;

use crate::config::Settings;

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the token pair in the session file
    Login {
        /// Account username
        username: String,

        /// Account password
        #[arg(long, env = "FITMARKET_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Clear the stored session
    Logout,

    /// Show the configured endpoint and whether a session is stored
    Status,

    /// Send a GET request
    Get(RequestArgs),

    /// Send a POST request
    Post(RequestArgs),

    /// Send a PUT request
    Put(RequestArgs),

    /// Send a PATCH request
    Patch(RequestArgs),

    /// Send a DELETE request
    Delete(RequestArgs),
}

#[derive(Args)]
pub struct RequestArgs {
    /// Path relative to the base URL, e.g. /api/courses/
    path: String,

    /// JSON request body
    #[arg(short = 'd', long)]
    data: Option<String>,

    /// Do not show the loading indicator
    #[arg(long)]
    background: bool,
}

impl Commands {
    pub async fn execute(self, client: &ApiClient, settings: &Settings) -> Result<()> {
        match self {
            Commands::Login { username, password } => {
                client
                    .login(username.as_str(), password)
                    .await
                    .context("Login failed")?;
                println!("Logged in as {username}");
                Ok(())
            }
            Commands::Logout => {
                client.logout();
                println!("Logged out");
                Ok(())
            }
            Commands::Status => {
                let status = json!({
                    "base_url": client.base_url(),
                    "session_file": settings.session_file.display().to_string(),
                    "authenticated": client.session().is_authenticated(),
                    "refresh_token": client.session().refresh_token().is_some(),
                });
                println!("{}", serde_json::to_string_pretty(&status)?);
                Ok(())
            }
            Commands::Get(args) => args.send(client, Method::GET).await,
            Commands::Post(args) => args.send(client, Method::POST).await,
            Commands::Put(args) => args.send(client, Method::PUT).await,
            Commands::Patch(args) => args.send(client, Method::PATCH).await,
            Commands::Delete(args) => args.send(client, Method::DELETE).await,
        }
    }
}

impl RequestArgs {
    async fn send(self, client: &ApiClient, method: Method) -> Result<()> {
        let mut request = client.request(method.clone(), &self.path);
        if let Some(data) = &self.data {
            let body: Value = serde_json::from_str(data).context("--data is not valid JSON")?;
            request = request.json(&body);
        }

        let options = RequestOptions {
            suppress_loading: self.background,
        };
        let response = client
            .send_with(request, options)
            .await
            .with_context(|| format!("{method} {} failed", self.path))?;

        let status = response.status();
        let text = response.text().await?;
        info!(%status, path = %self.path, "Request completed");

        match serde_json::from_str::<Value>(&text) {
            Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            Err(_) if text.is_empty() => {}
            Err(_) => println!("{text}"),
        }
        Ok(())
    }
}
