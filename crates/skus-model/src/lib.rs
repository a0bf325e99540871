pub mod error;
pub mod iso8601;
pub mod issuer;
pub mod key;
pub mod metadata;
pub mod order;
pub mod order_item;

pub use error::Error;
pub use issuer::Issuer;
pub use key::Key;
pub use metadata::OrderMetadataValue;
pub use order::{Order, OrderStatus};
pub use order_item::{CredentialType, IssuerConfig, OrderItem};
