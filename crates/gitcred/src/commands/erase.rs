//! Erase command - forget the credential Git reports as rejected.

use anyhow::Result;

use super::Context;
use crate::protocol;

pub async fn run(ctx: &Context) -> Result<()> {
    let request = protocol::read_request(std::io::stdin().lock())?;
    let registry = ctx.registry()?;
    let provider = registry.resolve(&request.input).await?;
    tracing::info!(provider = provider.id(), "Erasing credential");

    provider
        .erase_credential(&ctx.provider_context()?, &request.input)
        .await?;
    Ok(())
}
