#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = pulse_connect_rust::run().await {
        eprintln!("pulse-connect-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
