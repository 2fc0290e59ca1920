use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tokio::sync::Mutex;

use mtb_core::{
    commands::CommandParser, config::Config, handlers::Handlers, security::RateLimiter,
    store::MealStore, utils::AuditLogger,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub parser: Arc<CommandParser>,
    pub handlers: Arc<Handlers>,
    pub messenger: Arc<TelegramMessenger>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
    pub audit: Arc<AuditLogger>,
}

pub async fn run_polling(cfg: Arc<Config>, store: Arc<dyn MealStore>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    if let Ok(me) = bot.get_me().await {
        tracing::info!(username = %me.username(), "meal bot started");
    }
    if cfg.telegram_allowed_users.is_empty() {
        tracing::info!("no allowlist configured; bot is open to all users");
    } else {
        tracing::info!(
            users = cfg.telegram_allowed_users.len(),
            "allowlist active"
        );
    }

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        parser: Arc::new(CommandParser::new()),
        handlers: Arc::new(Handlers::new(store)),
        messenger: Arc::new(TelegramMessenger::new(bot.clone())),
        rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
            cfg.rate_limit_enabled,
            cfg.rate_limit_requests,
            cfg.rate_limit_window,
        ))),
        audit: Arc::new(AuditLogger::new(
            cfg.audit_log_path.clone(),
            cfg.audit_log_json,
        )),
    });

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
