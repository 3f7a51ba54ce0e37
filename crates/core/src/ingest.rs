//! Folder ingestion for the regulatory corpus.
//!
//! Every `.txt` and `.md` file in a folder becomes one source. Its label comes from an
//! optional `sources.yaml` in the same folder:
//!
//! ```yaml
//! sources:
//!   pra_rulebook_sample.txt: PRA_Rulebook
//!   corep_instructions_sample.txt: COREP_Instructions
//! ```
//!
//! Files not listed there are labelled with their file stem.

use crate::constants::SOURCES_MANIFEST_FILENAME;
use crate::embedding::Embedder;
use crate::error::{CorepError, CorepResult};
use crate::store::DocumentStore;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
struct SourcesManifest {
    #[serde(default)]
    sources: BTreeMap<String, String>,
}

fn load_manifest(dir: &Path) -> CorepResult<SourcesManifest> {
    let path = dir.join(SOURCES_MANIFEST_FILENAME);
    if !path.is_file() {
        return Ok(SourcesManifest::default());
    }
    let contents = fs::read_to_string(&path).map_err(CorepError::FileRead)?;
    serde_yaml::from_str(&contents).map_err(CorepError::YamlDeserialization)
}

fn is_document(path: &Path) -> bool {
    path.is_file()
        && matches!(
            path.extension().and_then(|e| e.to_str()).map(str::to_lowercase).as_deref(),
            Some("txt" | "md")
        )
}

/// Read every document in `dir` as `(source_label, text)`, ordered by file name.
///
/// # Errors
/// Returns `FileRead` if the folder or a file cannot be read, `YamlDeserialization` for a
/// malformed manifest, and `InvalidInput` if the folder holds no documents.
pub fn load_documents(dir: &Path) -> CorepResult<Vec<(String, String)>> {
    let manifest = load_manifest(dir)?;

    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(CorepError::FileRead)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_document(path))
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(CorepError::InvalidInput(format!(
            "no .txt or .md documents found in {}",
            dir.display()
        )));
    }

    paths
        .iter()
        .map(|path| {
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            let label = manifest.sources.get(file_name).cloned().unwrap_or_else(|| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(file_name)
                    .to_string()
            });
            let text = fs::read_to_string(path).map_err(CorepError::FileRead)?;
            Ok((label, text))
        })
        .collect()
}

/// Replace the contents of `store` with the documents in `dir`.
///
/// # Returns
/// Chunk counts per source label.
pub async fn ingest_directory(
    dir: &Path,
    store: &mut DocumentStore,
    embedder: &dyn Embedder,
) -> CorepResult<BTreeMap<String, usize>> {
    let documents = load_documents(dir)?;
    tracing::info!("ingesting {} documents from {}", documents.len(), dir.display());
    store.replace_all(embedder, &documents).await?;
    Ok(store.source_counts())
}
