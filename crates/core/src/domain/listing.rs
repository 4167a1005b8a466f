// Listing & identity snapshots (owned by external collaborators, read-only here)

use serde::{Deserialize, Serialize};

/// Listing ID
pub type ListingId = String;

/// A provider's bookable offering, as returned by the listing lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub owner_id: String,
    pub price_cents: i64,
    pub is_active: bool,
}

/// Contact data for a user, as returned by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub email: String,
}
