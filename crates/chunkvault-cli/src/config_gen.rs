use std::path::PathBuf;

use chunkvault_core::config;

pub(crate) fn run_config_generate(dest: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let path = match dest {
        Some(d) => PathBuf::from(d),
        None => config::default_config_search_paths()
            .into_iter()
            .next()
            .map(|(path, _)| path)
            .unwrap_or_else(|| PathBuf::from("chunkvault.yaml")),
    };

    if path.exists() {
        return Err(format!("file already exists: {}", path.display()).into());
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    std::fs::write(&path, config::minimal_config_template())?;
    println!("Config written to: {}", path.display());
    println!("Edit it to point storage.blob_dir and storage.index_dir at your data directories.");
    Ok(())
}
