#![warn(missing_debug_implementations, rust_2018_idioms, missing_docs)]
//! A whole-program linker for class-based intermediate representations.
//!
//! The [`linker::Linker`] runs the reachability [`analysis`] over a universe of classes
//! provided through a [`loader::ClassSource`], then keeps only the classes and members the
//! program needs.

/// Module containing the APIs for the reachability analysis.
pub mod analysis;
/// Module containing the intermediate representation.
pub mod ir;
/// Module containing the APIs for linking.
pub mod linker;
/// Module containing the APIs for loading classes.
pub mod loader;

#[cfg(test)]
pub(crate) mod tests;
