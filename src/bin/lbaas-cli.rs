use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "lbaas-cli")]
#[command(about = "Management CLI for the HAProxy LBaaS daemon", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:9876")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show store and applied revisions, pending changes, last error
    Status,
    /// Regenerate the HAProxy config and reload now
    Apply,
    /// List listeners with their members
    Listeners,
    /// Manage a single listener
    #[command(subcommand)]
    Listener(ListenerCommand),
    /// List members of all listeners
    Members,
    /// Manage a single member
    #[command(subcommand)]
    Member(MemberCommand),
}

#[derive(Subcommand)]
enum ListenerCommand {
    Get { name: String },
    Create {
        name: String,
        #[arg(long)]
        protocol: String,
        #[arg(long)]
        port: u16,
        #[command(flatten)]
        options: ListenerOptions,
    },
    Update {
        name: String,
        #[arg(long)]
        protocol: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[command(flatten)]
        options: ListenerOptions,
    },
    Delete { name: String },
}

#[derive(Args)]
struct ListenerOptions {
    /// roundrobin, static-rr, leastconn, first or source
    #[arg(long)]
    algorithm: Option<String>,
    #[arg(long)]
    description: Option<String>,
}

#[derive(Subcommand)]
enum MemberCommand {
    Get { name: String },
    Create {
        listener: String,
        name: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        port: u16,
        #[command(flatten)]
        options: MemberOptions,
    },
    Update {
        name: String,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[command(flatten)]
        options: MemberOptions,
    },
    Delete { name: String },
}

#[derive(Args)]
struct MemberOptions {
    /// Repeatable
    #[arg(long = "tag")]
    tags: Vec<String>,
    #[arg(long)]
    description: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let request = match cli.command {
        Commands::Status => client.get(format!("{}/v1/status", base)),
        Commands::Apply => client.post(format!("{}/v1/apply", base)),
        Commands::Listeners => client.get(format!("{}/v1/listeners", base)),
        Commands::Members => client.get(format!("{}/v1/members", base)),

        Commands::Listener(ListenerCommand::Get { name }) => {
            client.get(format!("{}/v1/listeners/{}", base, name))
        }
        Commands::Listener(ListenerCommand::Create {
            name,
            protocol,
            port,
            options,
        }) => client.post(format!("{}/v1/listeners", base)).json(&json!({
            "name": name,
            "protocol": protocol,
            "port": port,
            "algorithm": options.algorithm,
            "description": options.description,
        })),
        Commands::Listener(ListenerCommand::Update {
            name,
            protocol,
            port,
            options,
        }) => client
            .put(format!("{}/v1/listeners/{}", base, name))
            .json(&json!({
                "protocol": protocol,
                "port": port,
                "algorithm": options.algorithm,
                "description": options.description,
            })),
        Commands::Listener(ListenerCommand::Delete { name }) => {
            client.delete(format!("{}/v1/listeners/{}", base, name))
        }

        Commands::Member(MemberCommand::Get { name }) => {
            client.get(format!("{}/v1/members/{}", base, name))
        }
        Commands::Member(MemberCommand::Create {
            listener,
            name,
            address,
            port,
            options,
        }) => client
            .post(format!("{}/v1/listeners/{}/members", base, listener))
            .json(&json!({
                "name": name,
                "address": address,
                "port": port,
                "tags": options.tags,
                "description": options.description,
            })),
        Commands::Member(MemberCommand::Update {
            name,
            address,
            port,
            options,
        }) => {
            let tags = (!options.tags.is_empty()).then_some(options.tags);
            client
                .put(format!("{}/v1/members/{}", base, name))
                .json(&json!({
                    "address": address,
                    "port": port,
                    "tags": tags,
                    "description": options.description,
                }))
        }
        Commands::Member(MemberCommand::Delete { name }) => {
            client.delete(format!("{}/v1/members/{}", base, name))
        }
    };

    print_response(request.send().await?).await
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

    // Committed but not live: make it visible to scripts.
    if json.pointer("/apply/ok") == Some(&Value::Bool(false)) {
        eprintln!("Warning: change committed but apply failed");
        std::process::exit(2);
    }
    Ok(())
}
