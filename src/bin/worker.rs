#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = verso::run_worker().await {
        eprintln!("verso-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
