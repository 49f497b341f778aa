use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "collab-cli")]
#[command(about = "Management CLI for the collaboration gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:1234")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a project and print its token and owner key
    Create,
    /// Show a project's lock state and last activity
    Show { token: String },
    /// Lock a project
    Lock {
        token: String,
        #[arg(long)]
        owner_key: String,
    },
    /// Unlock a project
    Unlock {
        token: String,
        #[arg(long)]
        owner_key: String,
    },
    /// Check gateway liveness
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Create => client.post(format!("{}/projects", base)).send().await?,
        Commands::Show { token } => client.get(format!("{}/projects/{}", base, token)).send().await?,
        Commands::Lock { token, owner_key } => {
            client
                .post(format!("{}/projects/{}/lock", base, token))
                .json(&json!({ "ownerKey": owner_key }))
                .send()
                .await?
        }
        Commands::Unlock { token, owner_key } => {
            client
                .post(format!("{}/projects/{}/unlock", base, token))
                .json(&json!({ "ownerKey": owner_key }))
                .send()
                .await?
        }
        Commands::Health => client.get(format!("{}/healthz", base)).send().await?,
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
