//! Providers command - list host providers in resolution order.

use anyhow::Result;

use super::Context;

pub async fn run(ctx: &Context) -> Result<()> {
    let registry = ctx.registry()?;

    println!("Host providers (resolution order)");
    println!("---------------------------------");
    for provider in registry.providers() {
        println!("{:<12} {}", provider.id(), provider.name());
    }

    if let Some(id) = ctx.settings.provider_override() {
        println!();
        println!("Forced provider: {} (from {})", id.value, id.source);
    }
    Ok(())
}
