//! masterytrace-core: Mastery engine, grading, and attempt lifecycle.
//!
//! This crate defines the data model, the Bayesian Knowledge Tracing update,
//! answer grading, and the submission engine that the rest of masterytrace
//! builds on. Storage is abstracted behind the traits in [`traits`].

pub mod attempt;
pub mod bkt;
pub mod config;
pub mod engine;
pub mod error;
pub mod grading;
pub mod model;
pub mod parser;
pub mod report;
pub mod statistics;
pub mod traits;
