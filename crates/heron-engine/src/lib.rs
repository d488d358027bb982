#![doc = include_str!("../README.md")]

//! Verification harness for claims about the Heron square-root recurrence.
//!
//! Claims are encoded with [`encoder`], validated by [`claim::ClaimBuilder`],
//! decided by [`verifier::Verifier`] and, for one-parameter families,
//! bisected by [`refiner::refine`]. Counterexamples are replayed in floating
//! point by [`witness`].

pub mod claim;
pub mod encoder;
pub mod refiner;
pub mod registry;
pub mod report;
pub mod verifier;
pub mod witness;
