use crate::config::AppConfig;
use crate::services::staging::StagingStore;
use anyhow::{Context, Result};
use tracing::info;

/// Prepares the staging directory and checks that files can be created in it.
pub async fn setup_staging(config: &AppConfig) -> Result<StagingStore> {
    tokio::fs::create_dir_all(&config.temp_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create staging directory {}",
                config.temp_dir.display()
            )
        })?;

    let store = StagingStore::new(&config.temp_dir);
    let probe = store.create("probe").await.with_context(|| {
        format!(
            "Staging directory {} is not writable",
            config.temp_dir.display()
        )
    })?;
    probe.discard();

    info!("📂 Staging directory: {}", store.dir().display());
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_setup_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            temp_dir: dir.path().join("nested").join("staging"),
            ..AppConfig::default()
        };

        let store = setup_staging(&config).await.unwrap();
        assert!(store.dir().is_dir());
        assert_eq!(std::fs::read_dir(store.dir()).unwrap().count(), 0);
    }
}
