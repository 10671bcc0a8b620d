#[cfg(feature = "server")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    matchgate::server::run().await
}
