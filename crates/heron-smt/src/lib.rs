#![doc = include_str!("../README.md")]

//! Solver-agnostic term language and solver integration for real-arithmetic
//! claims.
//!
//! This crate provides the [`terms::SmtTerm`] expression tree, the
//! [`solver::SmtSolver`] capability trait, and pluggable Z3 and cvc5
//! backends.

pub mod backends;
pub mod solver;
pub mod sorts;
pub mod terms;
