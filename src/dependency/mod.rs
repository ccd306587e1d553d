//! Dependency trees from chunk parses
//!
//! [`Completer`] fuses the chunks of a shallow parse into one tree,
//! [`dependencies`] reads the head-dependent structure off it and
//! [`Labeler`] names each relation with boolean rules over node pairs
//! ([`RuleExpression`]). [`DependencyMaker`] runs the three steps per
//! sentence from a single rule file.

pub mod completer;
pub mod labeler;
pub mod maker;
pub mod rules;
pub mod semdb;

pub use completer::{Completer, CompleterRule, Operation};
pub use labeler::{LabelRule, Labeler};
pub use maker::{dependencies, DependencyMaker};
pub use rules::{EvalContext, NodeBase, NodeRef, Predicate, RuleExpression, Side, TermSets, WordClasses};
pub use semdb::{FileSemanticDb, SemanticDb, SenseInfo};
