#[tokio::main]
async fn main() {
    if let Err(error) = telemetry_sync_lib::run().await {
        eprintln!("telemetry-sync failed: {error}");
        std::process::exit(1);
    }
}
