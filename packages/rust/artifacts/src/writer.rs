//! Artifact naming and atomic writing of graph documents.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use eventgraph_shared::{EventGraphError, GraphType, Result};

use crate::document::GraphDocument;
use crate::jsonld::to_jsonld_string;

/// Metadata for a single artifact file.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ArtifactMeta {
    pub filename: String,
    pub graph_type: GraphType,
    pub sha256: String,
    pub size_bytes: usize,
}

/// `{prefix}_{type}.jsonld`, e.g. `1_2_January_2022_base.jsonld`.
pub fn artifact_file_name(prefix: &str, graph_type: GraphType) -> String {
    format!("{prefix}_{}.jsonld", graph_type.as_str())
}

pub fn artifact_path(dir: &Path, prefix: &str, graph_type: GraphType) -> PathBuf {
    dir.join(artifact_file_name(prefix, graph_type))
}

/// Whether all four documents for `prefix` are already on disk.
pub fn documents_exist(dir: &Path, prefix: &str) -> bool {
    GraphType::ALL
        .iter()
        .all(|graph_type| artifact_path(dir, prefix, *graph_type).is_file())
}

/// Serialize and write each document atomically (temp file, then rename).
#[instrument(skip_all, fields(dir = %dir.display(), prefix = %prefix, count = documents.len()))]
pub fn write_documents(
    dir: &Path,
    prefix: &str,
    documents: &[GraphDocument],
) -> Result<Vec<ArtifactMeta>> {
    std::fs::create_dir_all(dir).map_err(|e| EventGraphError::io(dir, e))?;

    let mut metas = Vec::with_capacity(documents.len());

    for doc in documents {
        let filename = artifact_file_name(prefix, doc.graph_type);
        let target = dir.join(&filename);
        let temp = dir.join(format!(".{filename}.tmp"));
        let content = to_jsonld_string(doc)?;

        std::fs::write(&temp, &content).map_err(|e| EventGraphError::io(&temp, e))?;
        std::fs::rename(&temp, &target).map_err(|e| EventGraphError::io(&target, e))?;

        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        let hash = format!("{:x}", hasher.finalize());

        debug!(file = %filename, quads = doc.len(), size = content.len(), "wrote artifact");

        metas.push(ArtifactMeta {
            filename,
            graph_type: doc.graph_type,
            sha256: hash,
            size_bytes: content.len(),
        });
    }

    info!(count = metas.len(), "artifacts written");
    Ok(metas)
}
