//! JSON-LD serialization of [`GraphDocument`]s, and reading back what
//! [`to_jsonld`] wrote.
//!
//! Each document becomes one named graph:
//! `{"@context": {prefixes}, "@id": graph, "@graph": [node, ...]}`.
//! Nodes are grouped by subject; predicates use compact `prefix:local`
//! names, `rdf:type` objects go to `@type`.

use std::path::Path;

use serde_json::{Map, Value, json};

use eventgraph_shared::{EventGraphError, GraphType, Result, Term};

use crate::document::GraphDocument;
use crate::vocab::{PREFIXES, RDF_TYPE};

/// Shorten `iri` with the first matching prefix, if any.
pub fn compact_iri(iri: &str) -> String {
    for (prefix, ns) in PREFIXES {
        if let Some(local) = iri.strip_prefix(ns) {
            if !local.is_empty() && !local.contains(['/', '#']) {
                return format!("{prefix}:{local}");
            }
        }
    }
    iri.to_string()
}

/// Inverse of [`compact_iri`] for the known prefixes.
pub fn expand_iri(name: &str) -> String {
    if let Some((prefix, local)) = name.split_once(':') {
        if let Some((_, ns)) = PREFIXES.iter().find(|(p, _)| *p == prefix) {
            return format!("{ns}{local}");
        }
    }
    name.to_string()
}

/// The shared `@context` object.
pub fn context() -> Value {
    let mut ctx = Map::new();
    for (prefix, ns) in PREFIXES {
        ctx.insert(prefix.to_string(), Value::String(ns.to_string()));
    }
    Value::Object(ctx)
}

fn term_value(term: &Term) -> Value {
    match term {
        Term::Iri(iri) => json!({ "@id": iri }),
        Term::Literal {
            value,
            datatype: Some(datatype),
            ..
        } => json!({ "@value": value, "@type": compact_iri(datatype) }),
        Term::Literal {
            value,
            lang: Some(lang),
            ..
        } => json!({ "@value": value, "@language": lang }),
        Term::Literal { value, .. } => json!({ "@value": value }),
    }
}

/// Build the JSON-LD value for a document.
pub fn to_jsonld(doc: &GraphDocument) -> Value {
    let mut nodes: Vec<Value> = Vec::new();
    let mut current: Option<(String, Map<String, Value>)> = None;

    // Quads are ordered by subject, so each subject's statements are contiguous.
    for quad in doc.quads() {
        let starts_new = current.as_ref().is_none_or(|(s, _)| *s != quad.subject);
        if starts_new {
            if let Some((_, node)) = current.take() {
                nodes.push(Value::Object(node));
            }
            let mut node = Map::new();
            node.insert("@id".into(), Value::String(quad.subject.clone()));
            current = Some((quad.subject.clone(), node));
        }
        let Some((_, node)) = current.as_mut() else {
            continue;
        };

        let (key, value) = match (&quad.object, quad.predicate.as_str()) {
            (Term::Iri(class), RDF_TYPE) => {
                ("@type".to_string(), Value::String(compact_iri(class)))
            }
            (object, predicate) => (compact_iri(predicate), term_value(object)),
        };
        match node.get_mut(&key) {
            Some(Value::Array(values)) => values.push(value),
            _ => {
                node.insert(key, Value::Array(vec![value]));
            }
        }
    }
    if let Some((_, node)) = current.take() {
        nodes.push(Value::Object(node));
    }

    json!({
        "@context": context(),
        "@id": doc.graph_iri,
        "@graph": nodes,
    })
}

/// Serialize a document as pretty-printed JSON-LD text.
pub fn to_jsonld_string(doc: &GraphDocument) -> Result<String> {
    serde_json::to_string_pretty(&to_jsonld(doc))
        .map_err(|e| EventGraphError::validation(format!("JSON-LD serialization failed: {e}")))
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

fn malformed(what: impl std::fmt::Display) -> EventGraphError {
    EventGraphError::parse(format!("malformed JSON-LD: {what}"))
}

fn value_term(value: &Value) -> Result<Term> {
    if let Some(iri) = value.get("@id").and_then(Value::as_str) {
        return Ok(Term::iri(iri));
    }
    let literal = value
        .get("@value")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(format!("object without @id or @value: {value}")))?;
    if let Some(datatype) = value.get("@type").and_then(Value::as_str) {
        return Ok(Term::typed(literal, expand_iri(datatype)));
    }
    match value.get("@language").and_then(Value::as_str) {
        Some(lang) => Ok(Term::lang(literal, lang)),
        None => Ok(Term::plain(literal)),
    }
}

/// Rebuild a document from the JSON-LD [`to_jsonld`] produces.
pub fn from_jsonld(graph_type: GraphType, value: &Value) -> Result<GraphDocument> {
    let graph_iri = value
        .get("@id")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing graph @id"))?;
    let nodes = value
        .get("@graph")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("missing @graph"))?;

    let mut doc = GraphDocument::new(graph_type, graph_iri);
    for node in nodes {
        let node = node.as_object().ok_or_else(|| malformed("node is not an object"))?;
        let subject = node
            .get("@id")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("node without @id"))?;

        for (key, values) in node.iter().filter(|(key, _)| *key != "@id") {
            let values = values
                .as_array()
                .ok_or_else(|| malformed(format!("{subject} {key} is not an array")))?;
            for value in values {
                if key == "@type" {
                    let class = value
                        .as_str()
                        .ok_or_else(|| malformed(format!("{subject} has a non-string @type")))?;
                    doc.add_iri(subject, RDF_TYPE, &expand_iri(class));
                } else {
                    doc.add(subject, &expand_iri(key), value_term(value)?);
                }
            }
        }
    }
    Ok(doc)
}

/// Read one artifact file back into a document.
pub fn read_document(path: &Path, graph_type: GraphType) -> Result<GraphDocument> {
    let raw = std::fs::read_to_string(path).map_err(|e| EventGraphError::io(path, e))?;
    let value: Value = serde_json::from_str(&raw)
        .map_err(|e| EventGraphError::parse(format!("{}: {e}", path.display())))?;
    from_jsonld(graph_type, &value)
}
