//! Guest trial use case.
//!
//! `GuestSessionManager` creates time-boxed guest sessions, meters their
//! questions and answers them through the prompt assembler and the
//! completion service.

use crate::context_resolver::ContextResolver;
use crate::start_throttle::StartThrottle;
use chrono::{DateTime, Utc};
use histchat_core::completion::{ChatMessage, CompletionRequest, CompletionService, TokenUsage};
use histchat_core::config::{AppConfig, GuestConfig, LlmConfig};
use histchat_core::context::ContextStore;
use histchat_core::error::{HistchatError, Result};
use histchat_core::figure::FigureCatalog;
use histchat_core::guest::{
    GuestCookie, GuestSession, GuestSessionStore, GuestState, NewGuestMessage, SessionToken,
};
use histchat_core::prompt::{ContextOrigin, PromptAssembler, PromptBundle, SourceRef};
use histchat_core::safety::{self, AgeProfile, SafetyVerdict};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Result of `Start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartedSession {
    pub token: SessionToken,
    pub figure_slug: String,
    pub max_questions: u32,
    pub expires_at: DateTime<Utc>,
    /// `Set-Cookie` header value carrying the token
    #[serde(skip)]
    pub set_cookie: String,
}

/// A guest question.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AskRequest {
    pub message: String,
    /// Overrides the configured model for this question
    pub model: Option<String>,
    /// UI interaction mode, mapped to an age profile when safety is on
    pub interaction_mode: Option<String>,
}

impl AskRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_interaction_mode(mut self, mode: impl Into<String>) -> Self {
        self.interaction_mode = Some(mode.into());
        self
    }
}

/// Result of `Ask`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub usage: TokenUsage,
    pub remaining_questions: u32,
    pub max_questions: u32,
    pub model: String,
    pub context_origin: ContextOrigin,
    /// Retrieval errored or timed out and the fallback path was used
    pub retrieval_degraded: bool,
    /// The safety filter refused the question; no quota was used
    pub blocked: bool,
}

/// Snapshot for rendering a call to action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub state: GuestState,
    pub figure_slug: String,
    pub question_count: u32,
    pub max_questions: u32,
    pub remaining_questions: u32,
    pub expires_at: DateTime<Utc>,
    pub seconds_remaining: i64,
}

/// Orchestrates guest session creation, metering and answering.
///
/// # Responsibilities
///
/// - `start`: verify the figure, allocate a session, issue the cookie
/// - `ask`: safety screen, atomic quota consume, transcript, retrieval,
///   prompt assembly, bounded completion
/// - `status` / `purge_expired`: read-side helpers and garbage collection
///
/// Quota state is only ever mutated through `GuestSessionStore`; this type
/// holds no per-session state of its own.
pub struct GuestSessionManager {
    store: Arc<dyn GuestSessionStore>,
    figures: Arc<dyn FigureCatalog>,
    completion: Arc<dyn CompletionService>,
    resolver: ContextResolver,
    assembler: PromptAssembler,
    guest: GuestConfig,
    llm: LlmConfig,
    prompt_debug: bool,
    throttle: Option<StartThrottle>,
}

impl GuestSessionManager {
    pub fn new(
        store: Arc<dyn GuestSessionStore>,
        figures: Arc<dyn FigureCatalog>,
        completion: Arc<dyn CompletionService>,
        context_store: Option<Arc<dyn ContextStore>>,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            figures,
            completion,
            resolver: ContextResolver::from_config(context_store, &config.prompt),
            assembler: PromptAssembler::new(config.prompt.context_budget_chars),
            guest: config.guest.clone(),
            llm: config.llm.clone(),
            prompt_debug: config.prompt.debug,
            throttle: config.guest.start_limit.as_ref().map(StartThrottle::from_config),
        }
    }

    pub fn guest_config(&self) -> &GuestConfig {
        &self.guest
    }

    /// Starts a guest session bound to `figure_slug`.
    pub async fn start(&self, figure_slug: &str) -> Result<StartedSession> {
        self.start_from(figure_slug, None).await
    }

    /// Starts a session, applying the start throttle to `client_key`.
    pub async fn start_from(
        &self,
        figure_slug: &str,
        client_key: Option<&str>,
    ) -> Result<StartedSession> {
        if let (Some(throttle), Some(key)) = (&self.throttle, client_key) {
            throttle.check(key, Instant::now())?;
        }

        let slug = figure_slug.trim();
        let figure = self
            .figures
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| HistchatError::not_found("figure", slug))?;

        let ttl = self.guest.ttl()?;
        let session = GuestSession::new(
            SessionToken::generate(),
            figure.slug,
            Utc::now(),
            ttl,
            self.guest.max_questions,
        )?;
        self.store.insert_session(&session).await?;

        tracing::info!(
            "Started guest session {} for '{}' (max_questions={}, expires_at={})",
            session.token.redacted(),
            session.figure_slug,
            session.max_questions,
            session.expires_at
        );

        let set_cookie = GuestCookie::new(&self.guest.cookie).issue(&session.token, ttl);
        Ok(StartedSession {
            token: session.token,
            figure_slug: session.figure_slug,
            max_questions: session.max_questions,
            expires_at: session.expires_at,
            set_cookie,
        })
    }

    /// Reads the guest token from a `Cookie` request header.
    pub fn token_from_cookie(&self, header: &str) -> Option<SessionToken> {
        GuestCookie::new(&self.guest.cookie).token_from_header(header)
    }

    /// Answers one guest question.
    ///
    /// The quota counter is consumed before any upstream call and is not
    /// refunded if the completion fails or the caller goes away.
    pub async fn ask(&self, token: &SessionToken, request: AskRequest) -> Result<AskResponse> {
        let profile = AgeProfile::from_interaction_mode(request.interaction_mode.as_deref());
        if self.guest.safety_enabled {
            if let SafetyVerdict::Blocked { refusal } = safety::pre_filter(&request.message, profile) {
                return self.refuse(token, refusal).await;
            }
        }

        let session = self.store.consume_question(token, Utc::now()).await?;

        let history: Vec<ChatMessage> = self
            .store
            .transcript(token)
            .await?
            .iter()
            .map(ChatMessage::from)
            .collect();

        let model = request
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.llm.model.as_str())
            .to_string();

        self.store
            .append_message(
                token,
                NewGuestMessage::user(request.message.clone(), Some(model.clone())),
                Utc::now(),
            )
            .await?;

        let figure = self.figures.find_by_slug(&session.figure_slug).await?;
        if figure.is_none() {
            tracing::warn!(
                "Figure '{}' for guest session {} is gone, using guide instruction",
                session.figure_slug,
                token.redacted()
            );
        }

        let retrieval = self
            .resolver
            .resolve(figure.as_ref().map(|f| f.slug.as_str()), &request.message)
            .await;
        let bundle = self.assembler.build(
            figure.as_ref(),
            &request.message,
            &history,
            retrieval.chunks(),
        );
        if self.prompt_debug {
            log_prompt(&bundle);
        }

        let completion_request = CompletionRequest {
            messages: bundle.messages,
            model: model.clone(),
            temperature: self.llm.temperature,
            top_p: self.llm.top_p,
            max_tokens: self.llm.max_tokens,
        };

        let completion = match tokio::time::timeout(
            self.llm.timeout(),
            self.completion.generate(&completion_request),
        )
        .await
        {
            Ok(Ok(completion)) => completion,
            Ok(Err(err)) => {
                tracing::warn!(
                    "Completion failed for guest session {}: {}",
                    token.redacted(),
                    err
                );
                return Err(match err {
                    HistchatError::UpstreamUnavailable { .. } => err,
                    other => HistchatError::upstream("completion", other.to_string()),
                });
            }
            Err(_) => {
                tracing::warn!(
                    "Completion timed out after {}s for guest session {}",
                    self.llm.timeout_secs,
                    token.redacted()
                );
                return Err(HistchatError::upstream(
                    "completion",
                    format!("timed out after {}s", self.llm.timeout_secs),
                ));
            }
        };

        let answer = if self.guest.safety_enabled {
            safety::post_filter(&completion.text, profile)
        } else {
            completion.text
        };

        self.store
            .append_message(
                token,
                NewGuestMessage::assistant(answer.clone(), Some(completion.model.clone())),
                Utc::now(),
            )
            .await?;

        tracing::info!(
            "Answered guest question for {} ({} remaining, context={:?})",
            token.redacted(),
            session.remaining_questions(),
            bundle.context_origin
        );

        Ok(AskResponse {
            answer,
            sources: bundle.sources,
            usage: completion.usage,
            remaining_questions: session.remaining_questions(),
            max_questions: session.max_questions,
            model: completion.model,
            context_origin: bundle.context_origin,
            retrieval_degraded: retrieval.is_degraded(),
            blocked: false,
        })
    }

    /// Refusal path: validates the session but consumes and records nothing.
    async fn refuse(&self, token: &SessionToken, refusal: &str) -> Result<AskResponse> {
        let session = self
            .store
            .find_session(token)
            .await?
            .ok_or(HistchatError::InvalidSession)?;
        session.check_ask(Utc::now())?;

        tracing::warn!(
            "Safety filter blocked a question for guest session {}",
            token.redacted()
        );
        Ok(AskResponse {
            answer: refusal.to_string(),
            sources: Vec::new(),
            usage: TokenUsage::default(),
            remaining_questions: session.remaining_questions(),
            max_questions: session.max_questions,
            model: self.llm.model.clone(),
            context_origin: ContextOrigin::None,
            retrieval_degraded: false,
            blocked: true,
        })
    }

    /// Current state of a session.
    pub async fn status(&self, token: &SessionToken) -> Result<SessionStatus> {
        let session = self
            .store
            .find_session(token)
            .await?
            .ok_or(HistchatError::InvalidSession)?;
        let now = Utc::now();

        Ok(SessionStatus {
            state: session.state_at(now),
            figure_slug: session.figure_slug.clone(),
            question_count: session.question_count,
            max_questions: session.max_questions,
            remaining_questions: session.remaining_questions(),
            expires_at: session.expires_at,
            seconds_remaining: (session.expires_at - now).num_seconds().max(0),
        })
    }

    /// Deletes expired sessions and their transcripts.
    pub async fn purge_expired(&self) -> Result<usize> {
        let removed = self.store.purge_expired(Utc::now()).await?;
        if removed > 0 {
            tracing::info!("Purged {} expired guest sessions", removed);
        }
        if let Some(throttle) = &self.throttle {
            throttle.prune(Instant::now());
        }
        Ok(removed)
    }
}

fn log_prompt(bundle: &PromptBundle) {
    let shape: Vec<String> = bundle
        .messages
        .iter()
        .map(|m| format!("{:?}:{}", m.role, m.content.chars().count()))
        .collect();
    let sources: Vec<&str> = bundle
        .sources
        .iter()
        .map(|s| s.source_name.as_str())
        .collect();
    tracing::debug!(
        "Assembled prompt [{}] context={:?} sources={:?}",
        shape.join(", "),
        bundle.context_origin,
        sources
    );
}
