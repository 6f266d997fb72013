//! The demo workflows, each a linear build-request / call / validate
//! sequence on top of the crate's building blocks.
//!
//! | Workflow | Pattern |
//! |----------|---------|
//! | [`basic`] | One plain completion |
//! | [`extraction`] | One schema-validated structured answer |
//! | [`weather`] | Tool loop with a live HTTP tool (`get_weather`) |
//! | [`retrieval`] | Tool loop over a static knowledge base (`search_kb`) |
//! | [`validation`] | Concurrent fan-out of two classifiers plus a predicate |

pub mod basic;
pub mod extraction;
pub mod retrieval;
pub mod validation;
pub mod weather;
