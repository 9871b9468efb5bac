//! searchmux: engine-rotating metasearch with per-engine health tracking.
//!
//! The search machinery lives in [`searchmux_core`]; this crate wires it to
//! a settings file and drives it for long runs.
//!
//! # Architecture
//!
//! - **Settings**: TOML file with the core search config and simulated
//!   engine definitions
//! - **Simulated engines**: adapters with scripted latency and failure
//!   rates, for exercising rotation without network access
//! - **Soak harness**: consecutive searches with a pause between them,
//!   tallying success rate, per-engine results and suspensions

pub mod error;
pub mod settings;
pub mod simulated;
pub mod soak;

pub use error::{Error, Result};
pub use settings::Settings;
pub use simulated::{SimulatedEngine, SimulatedEngineConfig};
pub use soak::{SoakOptions, SoakReport, Verdict};
