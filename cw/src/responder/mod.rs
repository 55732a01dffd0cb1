//! Responder directory: units, availability, proximity

mod directory;

pub use directory::ResponderDirectory;
