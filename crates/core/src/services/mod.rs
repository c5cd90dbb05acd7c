//! Analysis services: image loading, scans, decoding, evidence and grouping.

pub mod aggregate;
pub mod analysis;
pub mod backends;
pub mod hints;
pub mod image;
pub mod pairing;
pub mod scan;
pub mod symbols;
