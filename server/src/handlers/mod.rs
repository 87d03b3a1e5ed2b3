//! Request handlers for the notes collection.

mod list;
mod mutate;

pub use list::*;
pub use mutate::*;
