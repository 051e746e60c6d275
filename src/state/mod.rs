/// State management module
///
/// This module handles all catalog state, including:
/// - Shared data structures (data.rs)
/// - The key-value store holding the durable catalog (library.rs)
/// - Catalog create/update/delete/list and import sanitizing (catalog.rs)
/// - The remote snapshot with its local fallback (snapshot.rs)

pub mod catalog;
pub mod data;
pub mod library;
pub mod snapshot;
