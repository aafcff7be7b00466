//! Conversions from infrastructure errors into `RestqError`

mod conversions;

pub use conversions::InfraError;
