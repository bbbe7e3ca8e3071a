use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Url;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "breaker-cli")]
#[command(about = "Management CLI for the fault-breaker service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service status
    Status,
    /// List persisted circuits
    Circuits,
    /// List remediation workflows
    Remediations,
    /// Show one circuit
    Show { circuit: String },
    /// Force a circuit open (no remediation)
    Open { circuit: String },
    /// Close a circuit
    Close { circuit: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = match &cli.command {
        Commands::Status => client.get(format!("{}/admin/status", base)).headers(headers),
        Commands::Circuits => client.get(format!("{}/admin/circuits", base)).headers(headers),
        Commands::Remediations => client.get(format!("{}/admin/remediations", base)).headers(headers),
        Commands::Show { circuit } => client.get(circuit_url(base, circuit, None)?),
        Commands::Open { circuit } => client.put(circuit_url(base, circuit, Some("open"))?),
        Commands::Close { circuit } => client.put(circuit_url(base, circuit, Some("close"))?),
    };

    print_response(request.send().await?).await
}

/// Circuit keys are opaque; `push` percent-encodes any `/` inside them.
fn circuit_url(base: &str, circuit: &str, action: Option<&str>) -> Result<Url, Box<dyn std::error::Error>> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| format!("{} cannot be a base URL", base))?
        .pop_if_empty()
        .push("circuit-breaker")
        .push(circuit)
        .extend(action);
    Ok(url)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
