//! DNS wire-format codec: domain-name compression (RFC 1035 §4.1.4) and the
//! full message layout (header, questions, resource records) built on top
//! of it.

pub mod flags;
mod message;
pub mod name;

pub use message::{Message, Question, Rr};
