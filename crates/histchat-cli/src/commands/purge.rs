use crate::context::CliContext;
use anyhow::Result;

pub async fn run(ctx: &CliContext) -> Result<()> {
    let removed = ctx.offline_manager().purge_expired().await?;
    println!("Purged {} expired guest session(s)", removed);
    Ok(())
}
