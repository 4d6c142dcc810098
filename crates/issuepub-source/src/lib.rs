//! Issuepub Source - reading publishable documents
//!
//! Splits markdown files into a preamble and a body, derives the title
//! used as idempotency key, validates the preamble schema, and lists the
//! documents of a source directory in a deterministic order.

pub mod discover;
pub mod document;
pub mod preamble;
pub mod validate;

pub use discover::{DiscoverFilter, discover};
pub use document::{SourceDocument, SupersedeRef, TitleSource, normalize_title};
pub use preamble::{Preamble, PreambleValue, split_preamble};
pub use validate::{FailurePolicy, ValidationOutcome, validate, validate_document};
