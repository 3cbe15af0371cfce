#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = gradeflow_rust::run().await {
        eprintln!("gradeflow-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
