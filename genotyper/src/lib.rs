//! Genotyper -- Traversal and genotyping of novel sequence in a colored de Bruijn graph.
//!
//! The bottom layers are the k-mer utilities ([kmer]) and the access to graph sources ([graph_source]).
//! On top of them, [traversal] walks the colored graph into an [annotated_graph::AnnotatedGraph],
//! which is then compacted ([simplify]), labeled by backgrounds ([background]), and
//! compared against the parental paths ([variants]). [call] runs all of them for every novel stretch.
pub mod annotated_graph;
pub mod background;
pub mod call;
pub mod graph_source;
pub mod kmer;
pub mod local_graph;
pub mod novel;
pub mod simplify;
pub mod stopping_rules;
pub mod stretch;
pub mod traversal;
pub mod variants;
#[macro_use]
extern crate log;
