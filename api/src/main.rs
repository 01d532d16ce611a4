#[tokio::main]
async fn main() -> anyhow::Result<()> {
    festy_api::run().await
}
