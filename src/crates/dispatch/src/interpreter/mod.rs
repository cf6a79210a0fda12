//! Bridging model output to executable calls.
//!
//! - [`ResponseExtractor`] turns raw reply text into a [`StructuredCall`] or
//!   a "no actionable intent" marker
//! - [`CallValidator`] resolves the call against the registry and checks its
//!   argument contract
//!
//! [`StructuredCall`]: crate::action::StructuredCall

pub mod extractor;
pub mod validator;

pub use extractor::{Extraction, ResponseExtractor};
pub use validator::CallValidator;
