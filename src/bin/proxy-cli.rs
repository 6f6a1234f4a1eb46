use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use url::Url;

#[derive(Parser)]
#[command(name = "feature-proxy-cli")]
#[command(about = "Management CLI for the feature proxy", long_about = None)]
struct Cli {
    /// Base URL of the proxy.
    #[arg(short, long, default_value = "http://localhost:18080")]
    url: String,

    /// Admin API key.
    #[arg(short, long)]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check proxy system status
    Status,
    /// List registered subdomains and patterns
    Subdomains,
    /// Show whether a subdomain resolves and its live backends
    Show { subdomain: String },
    /// Register (or refresh) a backend for a subdomain
    Add {
        subdomain: String,
        address: String,
        port: u16,
    },
    /// Remove a backend from a subdomain
    Remove {
        subdomain: String,
        address: String,
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );
    let client = Client::builder().default_headers(headers).build()?;
    let admin = format!("{}/proxy/admin", cli.url.trim_end_matches('/'));

    let request = match cli.command {
        Commands::Status => client.get(format!("{admin}/status")),
        Commands::Subdomains => client.get(format!("{admin}/subdomains")),
        Commands::Show { subdomain } => client.get(subdomain_url(&admin, &subdomain)?),
        Commands::Add {
            subdomain,
            address,
            port,
        } => control(&client, &admin, "Add", &subdomain, &address, port),
        Commands::Remove {
            subdomain,
            address,
            port,
        } => control(&client, &admin, "Remove", &subdomain, &address, port),
    };

    print_response(request.send().await?).await
}

fn control(
    client: &Client,
    admin: &str,
    action: &str,
    subdomain: &str,
    address: &str,
    port: u16,
) -> RequestBuilder {
    client.post(format!("{admin}/control")).json(&json!({
        "action": action,
        "subdomain": subdomain,
        "address": address,
        "port": port,
    }))
}

/// `{admin}/subdomains/{subdomain}` with the pattern encoded as one path
/// segment, so glob characters like `?` stay part of the path.
fn subdomain_url(admin: &str, subdomain: &str) -> Result<Url, Box<dyn std::error::Error>> {
    let mut url = Url::parse(admin)?;
    url.path_segments_mut()
        .map_err(|_| format!("{admin} cannot be a base URL"))?
        .pop_if_empty()
        .extend(["subdomains", subdomain]);
    Ok(url)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
