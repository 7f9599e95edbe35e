//! Concrete provider adapters

pub mod att;
pub mod chatwith;
pub mod decagon;
pub mod mycity;
pub mod scoutly;
pub mod shopify;

pub use att::AttProvider;
pub use chatwith::ChatWithProvider;
pub use decagon::{DecagonProvider, DecagonTenant};
pub use mycity::{MyCityProvider, MyCitySession};
pub use scoutly::{ScoutlyHistoryItem, ScoutlyProvider};
pub use shopify::{ShopifyProvider, ShopifySession};
