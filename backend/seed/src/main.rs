use clap::Parser;

use gestor_seed::SeedOptions;

/// Registers a demo company and fills it with sample data.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Base URL of a running server.
    #[arg(default_value = "http://localhost:8080")]
    base_url: String,

    /// Number of clients to create.
    #[arg(long, default_value_t = 20)]
    clients: usize,

    /// Login of the demo owner, generated when omitted.
    #[arg(long)]
    email: Option<String>,

    #[arg(long, default_value = "demo-password")]
    password: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let report = gestor_seed::seed(SeedOptions {
        base_url: args.base_url,
        clients: args.clients,
        email: args.email,
        password: args.password,
    })
    .await?;

    println!("Seeded tenant for {}", report.email);
    println!("Requests sent: {}", report.requests);
    println!(
        "Goals synced: {} ({} key results)",
        report.goals_updated, report.key_results_updated
    );

    Ok(())
}
