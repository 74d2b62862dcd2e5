//! Listing-date discovery

mod resolver;

pub use resolver::{ListingDateResolver, ListingOutcome};
