//! Vendor (Apple/Google) notification verification and receipt decoding
//! (spec §4.9, §4.10, §6).

pub mod apple;
pub mod client;
pub mod error;
pub mod google;
pub mod receipt;

pub use client::{AppleReceiptClient, GoogleReceiptClient, VerifiedReceipt};
pub use error::VendorError;

/// What a verified vendor notification tells the Renewal Orchestrator to do
/// with the order (spec §4.9).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationAction {
    Renew,
    Cancel,
    Drop,
}
