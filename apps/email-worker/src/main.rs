use eyre::Result;

#[tokio::main]
async fn main() -> Result<()> {
    email_worker::run().await
}
