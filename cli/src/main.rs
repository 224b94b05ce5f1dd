use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::{json, Value};

/// Pull, push and sync page documents on a pagesync server.
#[derive(Debug, Parser)]
#[command(name = "pagesync-ctl", version, about)]
struct Cli {
    /// Base URL of the pagesync server
    #[arg(long, env = "PAGESYNC_URL", default_value = "http://127.0.0.1:3000")]
    url: String,

    /// Bearer token (editor or admin)
    #[arg(long, env = "PAGESYNC_TOKEN")]
    token: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch a page document and print it (or write it to a file)
    Pull {
        slug: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Save a page document from a JSON file
    Push { slug: String, file: PathBuf },
    /// Trigger a reconciliation sweep of every page (admin only)
    Sync,
}

/// Response envelope of the page endpoints.
#[derive(Debug, Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl Envelope {
    fn into_data(self, status: reqwest::StatusCode) -> Result<Value> {
        match (self.ok, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => bail!("Server returned no data ({status})"),
            (false, _) => bail!(
                "Server rejected the request ({status}): {}",
                self.error.unwrap_or_else(|| "unknown error".to_string())
            ),
        }
    }
}

struct Client {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl Client {
    fn new(base_url: &str, token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn page_url(&self, slug: &str) -> String {
        format!("{}/seo/pages/{}", self.base_url, slug)
    }

    fn sync_url(&self) -> String {
        format!("{}/seo/sync", self.base_url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .context("Failed to reach server")?;
        let status = response.status();
        let envelope: Envelope = response
            .json()
            .await
            .with_context(|| format!("Unexpected response body ({status})"))?;
        envelope.into_data(status)
    }

    async fn pull(&self, slug: &str) -> Result<Value> {
        self.send(self.http.get(self.page_url(slug))).await
    }

    async fn push(&self, slug: &str, data: Value) -> Result<Value> {
        self.send(self.http.post(self.page_url(slug)).json(&json!({ "data": data })))
            .await
    }

    async fn sync(&self) -> Result<Value> {
        self.send(self.http.post(self.sync_url())).await
    }
}

/// Read the document to push. Must be a JSON object.
fn read_payload(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    if !value.is_object() {
        bail!("{} must contain a JSON object", path.display());
    }
    Ok(value)
}

fn format_sync_report(report: &Value) -> Vec<String> {
    if report["skipped"].as_bool().unwrap_or(false) {
        return vec!["Sync skipped: a sweep ran recently".to_string()];
    }

    report["pages"]
        .as_array()
        .map(|pages| {
            pages
                .iter()
                .map(|page| {
                    let slug = page["slug"].as_str().unwrap_or("?");
                    match page["error"].as_str() {
                        Some(error) => format!("{slug}: failed ({error})"),
                        None => format!(
                            "{slug}: {}{}",
                            page["outcome"]["kind"].as_str().unwrap_or("unknown"),
                            if page["mirrored"].as_bool().unwrap_or(false) {
                                ", mirror written"
                            } else {
                                ""
                            }
                        ),
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new(&cli.url, cli.token);

    match cli.command {
        Command::Pull { slug, out } => {
            let document = client.pull(&slug).await?;
            let pretty = serde_json::to_string_pretty(&document)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, format!("{pretty}\n"))
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Saved '{slug}' to {}", path.display());
                }
                None => println!("{pretty}"),
            }
        }
        Command::Push { slug, file } => {
            let data = read_payload(&file)?;
            let saved = client.push(&slug, data).await?;
            println!(
                "Saved '{slug}' at revision {}",
                saved["updatedAt"].as_str().unwrap_or("?")
            );
        }
        Command::Sync => {
            let report = client.sync().await?;
            for line in format_sync_report(&report) {
                println!("{line}");
            }
        }
    }

    Ok(())
}
