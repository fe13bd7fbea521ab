//! Shared persistence surface for the nube client and dispatch server.
//!
//! ARCHITECTURE
//! ============
//! Both sides of the system read and write the same per-user records in an
//! external document store. This crate owns the store contract, the
//! notification profile record and its registration algorithm, an in-process
//! store for tests and local runs, and the Firestore REST adapter used in
//! production. Callers construct a concrete store at their composition root
//! and pass it down as `Arc<dyn DocumentStore>` — there is no ambient global
//! client anywhere in the workspace.

pub mod firestore;
pub mod memory;
pub mod profile;
pub mod store;
