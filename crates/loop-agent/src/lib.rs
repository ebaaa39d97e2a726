//! SubAgent-facing Executor, Safety Gate, and Compressor.
//!
//! The Spawner crate owns SubAgent lifecycle and holds one `Executor` per
//! live SubAgent; this crate has no notion of "multiple agents" itself.

pub mod baseline;
pub mod compressor;
pub mod executor;
pub mod safety_gate;

pub use baseline::{count_facts, AllowAllConfigFactory, BaselinePromptCompiler, WhitespaceTransducer};
pub use compressor::Compressor;
pub use executor::{Executor, ExecutorConfig};
pub use safety_gate::SafetyGate;
