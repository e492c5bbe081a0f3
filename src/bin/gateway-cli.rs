use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Introspection CLI for the context gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:80")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show application name, version and build commit
    Info,
    /// Show the loaded configuration
    Config,
    /// Show health, latency and balancer state of all services, or of one
    Inspect {
        /// Service name
        name: Option<String>,
    },
}

impl Commands {
    fn path(&self) -> String {
        match self {
            Commands::Info => "/gateway/info".to_string(),
            Commands::Config => "/gateway/config".to_string(),
            Commands::Inspect { name: None } => "/gateway/inspect".to_string(),
            Commands::Inspect { name: Some(name) } => format!("/gateway/inspect/{name}"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let url = format!("{}{}", cli.url.trim_end_matches('/'), cli.command.path());
    let res = client.get(url).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
