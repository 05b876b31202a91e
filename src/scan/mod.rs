//! Auxiliary QR scanner that turns a printed campaign code into marker and video URLs.

pub(crate) mod payload;
pub(crate) mod scanner;

pub use payload::{ScanPayload, parse_scan_payload};
pub use scanner::{CodeDecoder, CodeScanner, RqrrDecoder, ScanTick};
