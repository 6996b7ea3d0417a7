use tracing_subscriber::EnvFilter;

use velib_snapshot::config::AppConfig;
use velib_snapshot::pipeline;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env();

    match pipeline::run(&config).await {
        Ok(summary) => {
            println!(
                "[OK] snapshot stations={} -> {}",
                summary.stations,
                summary.snapshot_path.display()
            );
        }
        Err(e) => {
            eprintln!("snapshot run failed: {e}");
            std::process::exit(1);
        }
    }
}
