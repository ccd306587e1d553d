//! Chart parsing with an ambiguity-resolving grammar
//!
//! [`Grammar`] loads rules and symbol attributes; [`Chart`] runs the
//! bottom-up closure for one sentence and extracts its best tree;
//! [`ChartParser`] drives both over sentences.

pub mod chart;
pub mod grammar;
pub mod parser;

pub use chart::{Chart, Edge};
pub use grammar::{Grammar, Rule};
pub use parser::ChartParser;
