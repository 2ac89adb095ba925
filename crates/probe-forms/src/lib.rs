//! Probe Forms - which form does a goal mean, and what goes in it
//!
//! [`FormInferenceEngine`] scores every form on a page against the goal's
//! category and infers field semantics and validation for the winner.
//! [`DataSynthesizer`] produces plausible values for those fields.

pub mod field_types;
pub mod inference;
pub mod synthesizer;

pub use field_types::{infer_field_type, validation_for};
pub use inference::{FormInferenceEngine, GoalCategory, InferenceContext, InferredForm};
pub use synthesizer::DataSynthesizer;
