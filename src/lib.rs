pub use audioprobe_core::*;

#[cfg(feature = "cpal")]
pub use audioprobe_cpal::*;

pub mod app;
pub mod cli;
pub mod menu;
