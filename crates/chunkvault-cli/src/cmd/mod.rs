pub(crate) mod get;
pub(crate) mod locate;
pub(crate) mod put;

use chunkvault_core::config::ChunkVaultConfig;
use chunkvault_storage::{backend_from_config, Backends};

/// Open the configured stores. The CLI refuses the in-memory fallback since
/// nothing would outlive the process.
pub(crate) fn open_backends(
    config: &ChunkVaultConfig,
) -> Result<Backends, Box<dyn std::error::Error>> {
    if config.storage.blob_dir.is_none() || config.storage.index_dir.is_none() {
        return Err("storage.blob_dir and storage.index_dir must both be set".into());
    }
    Ok(backend_from_config(&config.storage_config())?)
}
