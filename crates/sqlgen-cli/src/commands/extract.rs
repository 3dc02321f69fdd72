//! `sqlgen extract`: write schema documents and exit.
//!
//! Failures propagate out of `main`, so the process exits non-zero.

use anyhow::{Context, Result};
use sqlgen_mcp::SchemaExtractor;
use std::path::{Path, PathBuf};

pub async fn run(config_path: &Path, output_dir: Option<PathBuf>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let executor = super::connect(&config).await?;

    let extractor = SchemaExtractor::new(executor, &config.schema.output_dir);
    let report = extractor
        .extract_and_save(output_dir.as_deref())
        .await
        .context("Schema extraction failed")?;

    println!(
        "Extracted {} tables ({}) into {}",
        report.table_count,
        report.dialect,
        report.output_dir.display()
    );
    for (module, count) in &report.modules {
        println!("   {:<20} {}", module, count);
    }
    Ok(())
}
