//! Persist ZIP code → coordinate records in an embedded [`sled`] store.
//!
//! [`Store`] is a thin wrapper around one sled collection that works on raw bytes.
//! [`GeoRecord`] knows how to turn itself into those bytes and back, and [`Store`] has a few
//! record-level helpers built on the two.

mod error;
mod geo;
mod record;
mod store;

pub use error::{Error, Result};
pub use record::{zip_from_key, zip_key, DecodeError, EncodeError, GeoRecord};
pub use store::{Dump, Store, COLLECTION};
