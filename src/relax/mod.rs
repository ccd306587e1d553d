//! Relaxation labelling and the constraint-grammar tagger built on it.

pub mod constraint_grammar;
pub mod solver;
pub mod tagger;

pub use constraint_grammar::{CgRule, CgSet, Condition, ConstraintGrammar, SetKind, Term, OUT_OF_BOUNDS};
pub use solver::{Cell, Problem, Relax, RelaxConfig, SolveStats, TermGroup};
pub use tagger::{force_select, retokenize, ForceSelect, RelaxTagger, TaggerConfig};
