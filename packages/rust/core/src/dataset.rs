//! The merged dataset: every period's documents of one graph type folded
//! into `dataset_{type}.jsonld`.

use tracing::{info, instrument, warn};

use eventgraph_artifacts::{
    ArtifactMeta, GraphDocument, artifact_path, documents_exist, read_document, write_documents,
};
use eventgraph_shared::{AppConfig, GraphType, Result};

use crate::assembler::GraphAssembler;
use crate::pipeline::RunConfig;

/// File prefix of the merged documents.
pub const DATASET_PREFIX: &str = "dataset";

/// Merge the artifacts of every period in `run_config` already on disk.
/// Periods without all four documents are skipped with a warning; a
/// document that cannot be read fails the merge.
#[instrument(skip_all, fields(start = %run_config.start, end = %run_config.end))]
pub fn merge_dataset(config: &AppConfig, run_config: &RunConfig) -> Result<Vec<ArtifactMeta>> {
    let dir = &config.output.dataset_dir;
    let assembler = GraphAssembler::new(config.output.uri_base.clone());
    let mut merged: Vec<GraphDocument> = GraphType::ALL
        .iter()
        .map(|t| GraphDocument::new(*t, assembler.graph_iri(DATASET_PREFIX, *t)))
        .collect();

    let mut periods = 0;
    for period in run_config.periods()? {
        let prefix = period.prefix();
        if !documents_exist(dir, &prefix) {
            warn!(%period, "no artifacts, left out of the dataset");
            continue;
        }
        for doc in &mut merged {
            let graph_type = doc.graph_type;
            let period_doc = read_document(&artifact_path(dir, &prefix, graph_type), graph_type)?;
            doc.merge(&period_doc);
        }
        periods += 1;
    }

    let artifacts = write_documents(dir, DATASET_PREFIX, &merged)?;
    let quads: usize = merged.iter().map(GraphDocument::len).sum();
    info!(periods, quads, "dataset merged");
    Ok(artifacts)
}
