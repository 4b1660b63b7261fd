//! Coordinator - Entry Point

#[tokio::main]
async fn main() -> eyre::Result<()> {
    coordinator::run().await
}
