//! Get command - return a credential for the request on stdin.

use anyhow::Result;

use super::Context;
use crate::protocol;

pub async fn run(ctx: &Context) -> Result<()> {
    let request = protocol::read_request(std::io::stdin().lock())?;
    let registry = ctx.registry()?;
    let provider = registry.resolve(&request.input).await?;
    tracing::info!(provider = provider.id(), "Getting credential");

    let credential = provider
        .get_credential(&ctx.provider_context()?, &request.input)
        .await?;
    protocol::write_credential(&mut std::io::stdout().lock(), &credential)
}
