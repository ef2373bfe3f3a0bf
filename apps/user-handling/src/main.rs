use eyre::Result;

#[tokio::main]
async fn main() -> Result<()> {
    user_handling::run().await
}
