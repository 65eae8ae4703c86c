//! `amo-receipts`: fiscal receipts and their public verification scans.

pub mod receipt;

pub use receipt::{NewReceipt, Receipt, Scan, normalize_code};
