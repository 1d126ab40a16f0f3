use crypto_bot::CryptoBot;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the variables may come from the process environment.
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let bot = CryptoBot::from_env().inspect_err(|e| {
        tracing::error!(target = "main", error = %e, "refusing to start");
    })?;

    bot.run().await.inspect_err(|e| {
        tracing::error!(target = "main", error = %e, "bot exited with an error");
    })?;
    Ok(())
}
