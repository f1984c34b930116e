//! Component A — Value Coercion.
//!
//! Parses a raw JSON scalar/array into a [`TypedValue`] under an explicit
//! [`CastType`] or an inferred column [`CanonicalType`].

mod coerce;
mod typed;

pub use coerce::{coerce, coerce_list};
pub use typed::{CanonicalType, CastType, TypedValue};
