use super::parse_token;
use crate::context::CliContext;
use anyhow::Result;
use histchat_core::thread::UserId;

pub async fn run(ctx: &CliContext, token: &str, user: i64) -> Result<()> {
    let token = parse_token(token)?;
    let outcome = ctx
        .migration_coordinator()
        .upgrade(&token, UserId(user))
        .await?;

    println!(
        "✅ Saved {} message(s) to thread {} for user {}",
        outcome.transferred_messages, outcome.thread_id, user
    );

    if let Some(thread) = ctx.threads().find_thread(outcome.thread_id).await? {
        println!("   {}", thread.title);
    }
    Ok(())
}
