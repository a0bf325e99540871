pub mod client;
pub mod error;
pub mod retry;

pub use client::{CbrClient, CreateIssuerParams, HttpCbrClient, IssuerResponse, SignedCredentials};
pub use error::CbrError;
pub use retry::with_retry;
