//! Probe Resolver - map human labels to technical selectors
//!
//! Pages are inconsistent: a checkbox captioned "Technology" may carry the
//! value `tech`, an input labelled "E-mail" may be named `user_mail`. The
//! [`FieldResolver`] tries eight tiers in order, from exact value match to
//! ARIA attributes, and stops at the first hit. Exhausting them yields an
//! empty result, never a guess.
//!
//! Click targets ("Sign In button") go through [`resolve_clickable`].

pub mod clickable;
pub mod labels;
mod resolver;
pub mod similarity;
pub mod tiers;

pub use clickable::{looks_like_selector, resolve_clickable};
pub use labels::recover_label;
pub use resolver::{FieldResolver, Resolution, ValueMapper};
pub use similarity::{normalize, partial_match, similarity};
pub use tiers::FieldQuery;
