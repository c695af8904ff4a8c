//! Gazer Common
//!
//! Pieces every Gazer crate leans on:
//! - [`GazerError`] and [`GazerResult`]
//! - Run clock, rate gate and throughput meter
//! - The one-shot completion signal used by recording finalization
//! - `tracing` subscriber setup
//! - JSON configuration under the XDG config directory

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod signal;

pub use clock::*;
pub use config::*;
pub use error::*;
pub use signal::*;
