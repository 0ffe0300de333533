//! Terminal presentation layer.
//!
//! Rendering is pure (session in, text out); the terminal module owns input
//! and the event loop.

pub mod intent;
pub mod render;
pub mod terminal;

pub use intent::{parse_intent, Intent};
pub use render::render;
pub use terminal::{InputLines, Studio, TerminalKeyPrompt};
