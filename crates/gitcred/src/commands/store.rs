//! Store command - persist the credential Git reports as working.

use anyhow::Result;

use super::Context;
use crate::protocol;

pub async fn run(ctx: &Context) -> Result<()> {
    let request = protocol::read_request(std::io::stdin().lock())?;
    let registry = ctx.registry()?;
    let provider = registry.resolve(&request.input).await?;
    tracing::info!(provider = provider.id(), "Storing credential");

    provider
        .store_credential(&ctx.provider_context()?, &request.input)
        .await?;
    Ok(())
}
