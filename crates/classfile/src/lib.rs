//! Structural analysis of JVM classfiles.
//!
//! One classfile in, one [`jarscope_api::UnitFacts`] out. Analysis works
//! purely on the symbolic information embedded in the binary (constant pool,
//! access flags, bytecode); referenced types are never loaded, so units can
//! be analyzed in any order and in parallel.

pub mod analyzer;
mod converter;

pub use analyzer::{AnalyzeError, analyze};
