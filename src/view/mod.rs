/// View models
///
/// Pure `entries -> view` mappings for the editor list and the viewer grid.
/// They never touch the catalog, so they can be tested without a UI.

pub mod editor;
pub mod grid;
