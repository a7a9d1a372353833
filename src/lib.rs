//! Pulse Flux - On-device heart-rate signal processing
//!
//! Flux turns a raw heart-rate stream from a Bluetooth strap into live vitals
//! through a deterministic pipeline: ingestion → ring buffer → baseline and
//! breathing estimation → stress/energy → extended metrics → emotional indices.
//!
//! ## Modules
//!
//! - **Vitals Pipeline**: [`VitalsProcessor`] recomputes a [`VitalsSnapshot`] on every tick
//! - **Practice Rewards**: [`calculate_practice_ond`] converts session improvement into OND

pub mod baseline;
pub mod breathing;
pub mod buffer;
pub mod config;
pub mod emotion;
pub mod error;
pub mod features;
pub mod ingest;
pub mod pipeline;
pub mod reward;
pub mod stats;
pub mod stress;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::PipelineConfig;
pub use emotion::{calculate_emotional_indices, EmotionInputs};
pub use error::ComputeError;
pub use ingest::DeviceEvent;
pub use pipeline::{
    Replayer, SharedVitalsProcessor, TickSchedule, VitalsObserver, VitalsProcessor,
};
pub use reward::{calculate_practice_ond, RewardEncoder};
pub use types::{EmotionalIndices, OndReward, PracticeMetrics, VitalsSnapshot};

/// Flux version embedded in reward receipts
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reward receipts
pub const PRODUCER_NAME: &str = "pulse-flux";
