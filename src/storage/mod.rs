//! Storage module
//!
//! File-backed key-value storage for the engines' JSON documents.

pub mod local_store;

pub use local_store::LocalStore;
