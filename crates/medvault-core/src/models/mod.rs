//! Data models for the application
//!
//! The document record is the centre of the domain. Events, professionals and
//! notifications exist here only as far as document lifecycle needs them.

mod document;
mod event;
mod notification;
mod professional;

pub use document::*;
pub use event::*;
pub use notification::*;
pub use professional::*;
