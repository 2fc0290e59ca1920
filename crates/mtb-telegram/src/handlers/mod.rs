//! The dispatch boundary: auth, rate limiting, command parsing, and the
//! store-failure catch.
//!
//! Unmatched text never gets a reply; a store failure is logged, audited,
//! and answered with a generic retry-later message.

use std::sync::Arc;

use teloxide::prelude::*;

use mtb_core::{
    domain::{ChatId, UserId},
    security::is_authorized,
    utils::AuditEvent,
};

use crate::router::AppState;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let user_id = user.id.0 as i64;
    let username = user
        .username
        .clone()
        .unwrap_or_else(|| "unknown".to_string());
    let chat_id = ChatId(msg.chat.id.0);

    if !is_authorized(Some(UserId(user_id)), &state.cfg.telegram_allowed_users) {
        let _ = state.audit.write(AuditEvent::auth(user_id, &username, false));
        send(&state, chat_id, "Unauthorized. Contact the bot owner for access.").await;
        return Ok(());
    }

    // No pattern match: no handler fires, no reply.
    let Some(cmd) = state.parser.parse(text) else {
        return Ok(());
    };

    let (allowed, retry_after) = state.rate_limiter.lock().await.check(UserId(user_id));
    if !allowed {
        let secs = retry_after.map(|d| d.as_secs_f64()).unwrap_or_default();
        let _ = state
            .audit
            .write(AuditEvent::rate_limit(user_id, &username, secs));
        send(
            &state,
            chat_id,
            &format!("⏳ Rate limit exceeded. Try again in {}s.", secs.ceil() as u64),
        )
        .await;
        return Ok(());
    }

    let _ = state
        .audit
        .write(AuditEvent::command(user_id, &username, text));

    match state.handlers.dispatch(UserId(user_id), cmd).await {
        Ok(reply) => send(&state, chat_id, &reply).await,
        Err(e) => {
            tracing::error!(user_id, error = %e, "command failed");
            let _ = state
                .audit
                .write(AuditEvent::error(user_id, &username, &e.to_string()));
            send(
                &state,
                chat_id,
                "❌ Something went wrong. Please try again later.",
            )
            .await;
        }
    }

    Ok(())
}

async fn send(state: &AppState, chat_id: ChatId, html: &str) {
    if let Err(e) = state.messenger.send_html(chat_id, html).await {
        tracing::warn!(chat_id = chat_id.0, error = %e, "failed to send reply");
    }
}
