//! Attribute extraction from free text.
//!
//! Each extractor returns an empty string when nothing matches; no
//! extractor fails. The vocabulary is always passed in explicitly.
//!
//! | Extractor | Source fields |
//! |-----------|---------------|
//! | [`size`] | explicit size field, then title |
//! | [`brand`] | explicit brand field (as "expected"), then title |
//! | [`model`] | explicit model field (as "expected"), then title |

pub mod brand;
pub mod model;
pub mod size;

pub use brand::extract_brand;
pub use model::extract_model;
pub use size::{canonical_size_filter, extract_size, size_from_fields};
