use std::path::{Path, PathBuf};

use chunkvault_core::chunker::chunk_file;
use chunkvault_core::config::ChunkVaultConfig;
use chunkvault_core::manifest::FileManifest;
use chunkvault_core::pipeline::Pipeline;

use crate::format::format_bytes;

pub(crate) fn run_put(
    config: &ChunkVaultConfig,
    file: &str,
    owner: &str,
    manifest_path: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file);
    let data = std::fs::read(path).map_err(|e| format!("cannot read '{file}': {e}"))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.to_string());

    let chunks = chunk_file(&data, &config.chunker, owner, &file_name);
    let manifest = FileManifest::from_chunks(&file_name, data.len() as u64, &chunks);

    let pipeline = Pipeline::start(config, super::open_backends(config)?)?;
    let mut session = pipeline.session();
    for chunk in chunks {
        session.push(chunk);
    }
    let report = session.finish();
    let stats = pipeline.shutdown()?;

    if stats.tasks_failed > 0 {
        return Err(format!(
            "{} upload task(s) failed; manifest not written (see log for blob keys)",
            stats.tasks_failed
        )
        .into());
    }

    let out = manifest_path
        .map(PathBuf::from)
        .unwrap_or_else(|| FileManifest::default_path(path));
    manifest.save(&out)?;

    println!(
        "Stored {} ({}): {} chunks, {} new, {} already present, {} uploaded",
        file_name,
        format_bytes(data.len() as u64),
        report.received,
        report.enqueued,
        report.duplicates,
        format_bytes(stats.bytes_uploaded),
    );
    if stats.chunks_skipped > 0 {
        println!("Skipped {} unreadable chunk(s)", stats.chunks_skipped);
    }
    println!("Manifest: {}", out.display());
    Ok(())
}
