//! `amo-licensing`: desktop licenses issued to platform users.

pub mod license;

pub use license::{License, LicenseStatus, generate_key};
