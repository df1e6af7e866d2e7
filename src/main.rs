use dotenvy::dotenv;

use vrhub::error::ApplicationError;
use vrhub::{config, logger, server};

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    dotenv().ok();

    let config = config::load()?;

    let _guard = logger::init(&config)?;

    server::run(config).await
}
