//! Quote data model and conversion into price series.
//!
//! Quote retrieval is behind the [`QuoteSource`] trait; concrete sources live
//! outside the core.

pub mod provider;

pub use provider::{quotes_to_series, DataError, Quote, QuoteSource};
