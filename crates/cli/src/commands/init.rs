use std::path::Path;

use satchel_core::config::SatchelConfig;
use satchel_core::crypto;
use satchel_core::db::DatabasePool;
use tracing::info;

/// Run the `init` command: create the data directory, key file, config, and database.
pub async fn run(data_dir: &str) -> anyhow::Result<()> {
    let data_path = Path::new(data_dir);
    if !data_path.exists() {
        std::fs::create_dir_all(data_path)?;
        info!("Created data directory: {}", data_dir);
    }

    let config_path = data_path.join("satchel.toml");
    if config_path.exists() {
        anyhow::bail!(
            "{} already exists; refusing to overwrite it",
            config_path.display()
        );
    }

    let key_path = data_path.join("satchel.key");
    let db_path = data_path.join("satchel.db");

    let mut config = SatchelConfig::generate_default();
    config.satchel.data_dir = data_dir.to_string();
    config.satchel.database.path = db_path.to_string_lossy().to_string();
    config.security.key_path = key_path.to_string_lossy().to_string();

    crypto::write_key_file(&key_path)?;
    info!("Generated credential key: {}", key_path.display());

    let toml_str = toml::to_string_pretty(&config)?;
    std::fs::write(&config_path, &toml_str)?;
    info!("Wrote configuration to {}", config_path.display());

    DatabasePool::new_sqlite(&config.satchel.database.path).await?;
    info!("Database initialized at {}", config.satchel.database.path);

    println!("Satchel initialized successfully!");
    println!("  Data directory: {}", data_dir);
    println!("  Configuration:  {}", config_path.display());
    println!("  Database:       {}", db_path.display());
    println!("  Credential key: {}", key_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Run `satchel user add --email you@example.edu`");
    println!(
        "  2. Run `satchel sync --user 1 --platform canvas --cred apiKey=... --cred baseUrl=...`"
    );
    println!("  3. Set [browser] enabled = true and driver_path to sync OWLv2");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init_writes_loadable_config_and_key() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("satchel");
        let data_dir = data_dir.to_str().unwrap();

        run(data_dir).await.unwrap();

        let config = SatchelConfig::load(&Path::new(data_dir).join("satchel.toml")).unwrap();
        config.validate().unwrap();
        assert!(config.satchel.database.path.ends_with("satchel.db"));
        crypto::load_key_file(Path::new(&config.security.key_path)).unwrap();
        assert!(Path::new(&config.satchel.database.path).exists());
    }

    #[tokio::test]
    async fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_str().unwrap();

        run(data_dir).await.unwrap();
        assert!(run(data_dir).await.is_err());
    }
}
