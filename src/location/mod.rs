//! Canonical location keys for boxes and shelves.

mod combined;
mod normalizer;

pub use combined::{parse_combined, LocationIntent};
pub use normalizer::{
    is_shelf_key, location_kind, normalize_box, normalize_location, normalize_shelf, LocationKind,
};
