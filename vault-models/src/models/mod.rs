//! Entity model definitions.

pub mod attachment;
pub mod auth;
pub mod document;
pub mod message;
pub mod settings;
