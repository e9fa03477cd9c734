//! Motion-gated dual-track perception for embedded cameras.
//!
//! Every captured frame flows through one pipeline:
//!
//! 1. The motion gate differences the frame against the previous one and
//!    holds the system ACTIVE for a cooldown after any real change.
//! 2. While ACTIVE, two inference tracks run on independent cadences: an
//!    object detector and a face locate/identify chain. Frames between
//!    cadence ticks reuse each track's cached result.
//! 3. The resolver reconciles simultaneous hits (a face inside an object
//!    box suppresses the object) and the fused result is emitted as one
//!    JSONL record or preview image per frame.
//!
//! Detector and face backends are trait objects behind [`detect::ObjectDetector`]
//! and [`detect::FaceEngine`]; frame sources behind [`capture::FrameSource`].
//! The stub implementations keep the whole pipeline runnable without model
//! weights or camera hardware.

pub mod capture;
pub mod config;
pub mod detect;
pub mod engine;
pub mod frame;
pub mod fusion;
pub mod identity;
pub mod motion;
pub mod output;
pub mod schedule;

pub use config::GuardianConfig;
pub use engine::{Engine, EngineConfig};
pub use frame::Frame;
pub use fusion::{FusedResult, FusionPolicy, IdlePolicy, TrackResult};
pub use identity::{classify, Embedding, Gallery, IdentityLabel, EMBEDDING_DIM};
pub use motion::{GateMode, MotionConfig, MotionGate};
pub use schedule::{Cadence, Decision};
