use super::parse_token;
use crate::context::CliContext;
use anyhow::Result;
use chrono::Utc;
use histchat_application::{AskRequest, AskResponse, GuestSessionManager};
use histchat_core::HistchatError;
use histchat_core::guest::SessionToken;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Starts a session and reads questions from stdin until the trial ends.
pub async fn run(
    ctx: &CliContext,
    figure: &str,
    model: Option<String>,
    mode: Option<String>,
) -> Result<()> {
    let manager = ctx.session_manager().await?;
    let started = manager.start(figure).await?;

    println!(
        "🎭 Guest trial with {} ({} questions, until {})",
        started.figure_slug,
        started.max_questions,
        started.expires_at.format("%H:%M UTC")
    );
    println!("   token: {}", started.token.as_str());
    println!("   Empty line or Ctrl-D to leave.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            break;
        }

        let mut request = AskRequest::new(line);
        if let Some(model) = &model {
            request = request.with_model(model.clone());
        }
        if let Some(mode) = &mode {
            request = request.with_interaction_mode(mode.clone());
        }

        match manager.ask(&started.token, request).await {
            Ok(response) => print_answer(&response),
            Err(err) if err.is_policy_boundary() => {
                print_call_to_action(&err);
                break;
            }
            Err(err @ HistchatError::UpstreamUnavailable { .. }) => {
                eprintln!("⚠️  {}", err);
                eprintln!("   The question still counts toward the trial.");
            }
            Err(err) => return Err(err.into()),
        }
    }

    println!(
        "\nKeep this conversation: histchat upgrade --token {} --user <id>",
        started.token.as_str()
    );
    Ok(())
}

pub async fn ask_once(
    ctx: &CliContext,
    token: &str,
    message: &str,
    model: Option<String>,
    json: bool,
) -> Result<()> {
    let token = parse_token(token)?;
    let manager = ctx.session_manager().await?;

    let mut request = AskRequest::new(message);
    if let Some(model) = model {
        request = request.with_model(model);
    }

    match manager.ask(&token, request).await {
        Ok(response) if json => println!("{}", serde_json::to_string_pretty(&response)?),
        Ok(response) => print_answer(&response),
        Err(err) if err.is_policy_boundary() && !json => print_call_to_action(&err),
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

pub async fn status(ctx: &CliContext, token: &str, json: bool) -> Result<()> {
    let token: SessionToken = parse_token(token)?;
    let manager: GuestSessionManager = ctx.offline_manager();
    let status = manager.status(&token).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("figure:    {}", status.figure_slug);
    println!("state:     {:?}", status.state);
    println!(
        "questions: {}/{} used, {} left",
        status.question_count, status.max_questions, status.remaining_questions
    );
    println!(
        "expires:   {} ({}s)",
        status.expires_at.to_rfc3339(),
        status.seconds_remaining
    );
    Ok(())
}

fn print_prompt() {
    use std::io::Write;
    print!("> ");
    // A failed flush only delays the prompt
    let _ = std::io::stdout().flush();
}

fn print_answer(response: &AskResponse) {
    println!("\n{}\n", response.answer);

    if !response.sources.is_empty() {
        let names: Vec<&str> = response
            .sources
            .iter()
            .map(|s| s.source_name.as_str())
            .collect();
        println!("📚 {}", names.join(", "));
    }
    if response.retrieval_degraded {
        println!("   (retrieval unavailable, answered from stored documents)");
    }
    if response.blocked {
        println!("   (not counted toward the trial)");
    }
    println!(
        "💬 {} of {} questions left\n",
        response.remaining_questions, response.max_questions
    );
}

fn print_call_to_action(err: &HistchatError) {
    println!("\n🔒 {}", err);
    match err.seconds_until_expiry(Utc::now()) {
        Some(secs) if secs > 0 => println!(
            "   Sign up within {} minute(s) to keep this conversation and continue.",
            (secs + 59) / 60
        ),
        _ => println!("   Sign up to keep chatting with historical figures."),
    }
}
