//! Terminal output
//!
//! Commands talk to [`Output`], which forwards events to a single
//! [`actor::UiActor`] thread that owns stdout. Styling constants live in
//! [`theme`].

pub mod actor;
pub mod list;
pub mod output;
pub mod theme;

pub use output::Output;
pub use theme::Theme;
