//! udtree: Universal Dependencies trees in memory
//!
//! Documents of bundles of dependency trees, with structural editing,
//! multiword tokens, enhanced dependencies, coreference, and tools to
//! reconcile a tree with its sentence text and to evaluate predicted trees.

// Data model
pub mod bundle; // Trees of one sentence, one per zone
pub mod document; // Ordered bundles plus document-level state
pub mod dualdict; // FEATS/MISC stored as string or map
pub mod error;
pub mod links; // Enhanced dependencies
pub mod mwt; // Multiword tokens
pub mod node; // Node handles and attributes
pub mod tree; // Arena tree with ordering, MWTs and text

// Annotation layers and tools
pub mod conllu; // CoNLL-U reading and writing
pub mod coref;
pub mod diff; // Sequence alignment
pub mod eval; // Attachment and token scores
pub mod reconcile; // Fitting tokens to sentence text

// Re-exports for convenience
pub use bundle::Bundle;
pub use conllu::{ConlluError, read_document, read_file, write_document, write_file};
pub use coref::{CorefEntity, CorefMention};
pub use diff::{Edit, Opcode, SequenceMatcher, longest_common_subsequence};
pub use document::Document;
pub use dualdict::{DictValue, DualDict};
pub use error::{Error, Result};
pub use eval::{AttachmentScore, Score, TokenF1, align_forms};
pub use links::Link;
pub use mwt::{MultiwordToken, MwtId, Token};
pub use node::{Node, NodeAttrs, NodeId, TreeId};
pub use reconcile::{ReconcileOptions, ReconcileReport, Reconciler, TextPolicy, UnicodePolicy};
pub use tree::{OrphanPolicy, Placement, Root, TextFallback};
