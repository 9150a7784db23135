pub mod init;
pub mod platforms;
pub mod remind;
pub mod status;
pub mod sync;
pub mod user;

use std::path::Path;

use satchel_core::config::SatchelConfig;
use satchel_core::crypto;
use satchel_core::db::sqlite::SqliteRepository;
use satchel_core::db::DatabasePool;
use tracing::info;

/// Load and validate the config, then open the database with the credential key.
pub async fn open(config_path: &str) -> anyhow::Result<(SatchelConfig, SqliteRepository)> {
    let config = SatchelConfig::load(Path::new(config_path))?;
    config.validate()?;
    info!("Loaded configuration from {}", config_path);

    let key = crypto::load_key_file(Path::new(&config.security.key_path))
        .map_err(|e| anyhow::anyhow!("cannot read key file {}: {e}", config.security.key_path))?;
    let DatabasePool::Sqlite(pool) = DatabasePool::new_sqlite(&config.satchel.database.path).await?;
    info!("Connected to database");

    Ok((config, SqliteRepository::new(pool, key)))
}
