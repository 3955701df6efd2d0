use std::path::PathBuf;

use clap::Parser;

use okta_user_import::{ImportConfig, ImportRun, OktaClient, init_logger};

#[derive(Parser, Debug)]
#[command(
    name = "okta-user-import",
    about = "Bulk-create Okta users from a CSV file"
)]
struct Args {
    /// CSV file to import. Overrides OKTA_IMPORT_CSV_FILE.
    #[arg(long)]
    csv_file: Option<PathBuf>,

    /// File that failure rows and the run summary are appended to.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Number of concurrent workers. Overrides OKTA_MAX_CONCURRENT_SESSIONS.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Only validate the input header against the user schema.
    #[arg(long)]
    check_only: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();
    let args = Args::parse();

    log::info!("loading configuration");
    let mut config = ImportConfig::from_env()?;
    if let Some(csv_file) = args.csv_file {
        config.csv_file = csv_file;
    }
    if let Some(log_file) = args.log_file {
        config.log_file = log_file;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }

    let client = OktaClient::new(&config)?;
    let run = ImportRun::new(config, client);

    if args.check_only {
        run.check().await?;
        log::info!("pre-flight check passed");
        return Ok(());
    }

    let summary = run.run().await?;
    println!(
        "Imported {} of {} users in {}s",
        summary.imported,
        summary.streamed,
        summary.elapsed.as_secs()
    );
    Ok(())
}
