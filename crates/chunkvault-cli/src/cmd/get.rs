use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use chunkvault_core::config::ChunkVaultConfig;
use chunkvault_core::fetch::ConcurrentFetcher;
use chunkvault_core::index::ChunkIndex;
use chunkvault_core::manifest::FileManifest;
use chunkvault_core::retrieve::Retriever;

use crate::format::{format_bytes, format_chunk_spans};

pub(crate) fn run_get(
    config: &ChunkVaultConfig,
    manifest_path: &str,
    output: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let manifest = FileManifest::load(Path::new(manifest_path))?;
    let backends = super::open_backends(config)?;
    let retriever = Retriever::new(
        ChunkIndex::new(Arc::clone(&backends.metadata)),
        ConcurrentFetcher::new(backends.blobs, config.retrieval.fetch_threads),
    );

    let mut writer = BufWriter::new(File::create(output)?);
    let report = retriever.retrieve_to(&manifest.chunks, &mut writer)?;

    println!(
        "Wrote {} to {} ({} ranges)",
        format_bytes(report.bytes_delivered),
        output,
        report.ranges_fetched,
    );

    if report.is_complete() {
        if report.bytes_delivered != manifest.size {
            eprintln!(
                "Warning: expected {} bytes, wrote {}",
                manifest.size, report.bytes_delivered
            );
        }
        return Ok(());
    }

    let mut missing: Vec<u64> = report.missing.iter().map(|r| r.chunk_no).collect();
    missing.sort_unstable();
    if !missing.is_empty() {
        eprintln!("Missing from index: chunks {}", format_chunk_spans(&missing));
    }
    if !report.failed_chunks.is_empty() {
        eprintln!(
            "Failed to fetch: chunks {}",
            format_chunk_spans(&report.failed_chunks)
        );
    }
    Err(format!(
        "'{}' is incomplete: {} chunk(s) not retrieved",
        output,
        missing.len() + report.failed_chunks.len()
    )
    .into())
}
