//! Capture filter expressions.
//!
//! The pnet datalink channel has no kernel filter support, so capture
//! sources compile a tcpdump-style expression here and evaluate it
//! against each decoded frame before handing it to the pipeline.

mod expr;

pub use expr::{Direction, Expr, FilterProgram, Predicate, Protocol, MAX_NESTING};
