use std::sync::Arc;

use mtb_core::config::Config;
use mtb_store::SqliteMealStore;

#[tokio::main]
async fn main() -> Result<(), mtb_core::Error> {
    mtb_core::logging::init("mtb")?;

    let cfg = Arc::new(Config::load()?);
    let store = Arc::new(SqliteMealStore::open(&cfg.database_path)?);

    mtb_telegram::router::run_polling(cfg, store)
        .await
        .map_err(|e| mtb_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
