use chunkvault_core::config::ChunkVaultConfig;
use chunkvault_core::index::ChunkIndex;
use chunkvault_types::content_hash::ContentHash;

pub(crate) fn run_locate(
    config: &ChunkVaultConfig,
    hashes: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let hashes = hashes
        .iter()
        .map(|h| ContentHash::parse(h))
        .collect::<Result<Vec<_>, _>>()?;
    let backends = super::open_backends(config)?;
    let found = ChunkIndex::new(backends.metadata).lookup(&hashes)?;

    for hash in &hashes {
        match found.get(hash) {
            Some(loc) => println!(
                "{hash}  {}  {}-{}  ({} bytes)",
                loc.blob_key,
                loc.start,
                loc.end,
                loc.len()
            ),
            None => println!("{hash}  not indexed"),
        }
    }
    Ok(())
}
