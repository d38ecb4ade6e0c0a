//! Presentation layer for listings: raw API records in, cards out.

mod card;
mod pricing;

pub use card::{to_property_card, to_property_cards, ListingType, PropertyCard};
