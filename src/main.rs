#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = verso::run().await {
        eprintln!("verso fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
