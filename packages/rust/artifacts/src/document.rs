//! In-memory quad sets, one per (period, graph type).

use std::collections::BTreeSet;

use eventgraph_shared::{GraphType, Term};

/// One statement in a named graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quad {
    pub subject: String,
    pub predicate: String,
    pub object: Term,
    pub graph: String,
}

/// A named graph of quads. Ordered, so serialization is reproducible.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphDocument {
    pub graph_type: GraphType,
    /// IRI of the named graph every quad belongs to.
    pub graph_iri: String,
    quads: BTreeSet<Quad>,
}

impl GraphDocument {
    pub fn new(graph_type: GraphType, graph_iri: impl Into<String>) -> Self {
        Self {
            graph_type,
            graph_iri: graph_iri.into(),
            quads: BTreeSet::new(),
        }
    }

    /// Add a statement to this document's graph. Duplicates collapse.
    pub fn add(&mut self, subject: &str, predicate: &str, object: Term) {
        self.quads.insert(Quad {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object,
            graph: self.graph_iri.clone(),
        });
    }

    pub fn add_iri(&mut self, subject: &str, predicate: &str, object: &str) {
        self.add(subject, predicate, Term::iri(object));
    }

    /// Copy every statement of `other` into this document's graph.
    pub fn merge(&mut self, other: &GraphDocument) {
        for quad in other.quads() {
            self.add(&quad.subject, &quad.predicate, quad.object.clone());
        }
    }

    pub fn quads(&self) -> impl Iterator<Item = &Quad> {
        self.quads.iter()
    }

    pub fn len(&self) -> usize {
        self.quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    /// Whether `iri` occurs as subject or IRI object.
    pub fn mentions_iri(&self, iri: &str) -> bool {
        self.quads.iter().any(|q| {
            q.subject == iri || matches!(&q.object, Term::Iri(object) if object == iri)
        })
    }

    pub fn has_subject(&self, iri: &str) -> bool {
        self.quads.iter().any(|q| q.subject == iri)
    }

    /// Objects of `(subject, predicate, ?)`.
    pub fn objects<'a>(
        &'a self,
        subject: &'a str,
        predicate: &'a str,
    ) -> impl Iterator<Item = &'a Term> {
        self.quads
            .iter()
            .filter(move |q| q.subject == subject && q.predicate == predicate)
            .map(|q| &q.object)
    }
}
