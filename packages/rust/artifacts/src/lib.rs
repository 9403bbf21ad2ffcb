//! Graph documents and their on-disk artifacts.
//!
//! - [`document`]: ordered quad sets, one per (period, graph type)
//! - [`vocab`]: RDF namespaces and terms
//! - [`jsonld`]: JSON-LD serialization and reading
//! - [`writer`]: artifact naming, existence checks, atomic writes

pub mod document;
pub mod jsonld;
pub mod vocab;
pub mod writer;

pub use document::{GraphDocument, Quad};
pub use jsonld::{
    compact_iri, expand_iri, from_jsonld, read_document, to_jsonld, to_jsonld_string,
};
pub use writer::{
    ArtifactMeta, artifact_file_name, artifact_path, documents_exist, write_documents,
};
