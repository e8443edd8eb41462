//! This crate extends the Ganglion utility-AI engine with a plugin used to standardize
//! headless test and demo apps for the library itself.
//!
//! It runs the app on a fixed-rate loop, records every AI event in the `AiEventLog`
//! and exits once the agents have nothing left to do (or a frame cap is hit).

mod helpers;
mod plugin;

pub use helpers::*;
pub use plugin::GanglionTestPlugin;
