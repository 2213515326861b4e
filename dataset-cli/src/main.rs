use clap::Parser;
use dataset_cli::{init_tracing, run, Args};
use tracing::error;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(args.verbose, args.json_logs)?;

    if let Err(e) = run(&args).await {
        error!("❌ {:#}", e);
        return Err(e);
    }

    Ok(())
}
