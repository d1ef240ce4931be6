use restwire_core::prelude::DebugLevel;
use restwire_examples::placeholder::tour;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tour(DebugLevel::V).await?;
    Ok(())
}
