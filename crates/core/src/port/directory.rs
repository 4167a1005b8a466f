// Directory Ports - listing lookup and identity, owned by external systems

use crate::domain::{Listing, UserIdentity};
use crate::error::Result;
use async_trait::async_trait;

/// Listing lookup (catalog service)
#[async_trait]
pub trait ListingDirectory: Send + Sync {
    async fn get_listing(&self, listing_id: &str) -> Result<Option<Listing>>;
}

/// Identity provider: resolves contact data for an authenticated user id
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserIdentity>>;
}

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Fixed set of listings and users
    #[derive(Default)]
    pub struct StaticDirectory {
        listings: Mutex<HashMap<String, Listing>>,
        users: Mutex<HashMap<String, UserIdentity>>,
    }

    impl StaticDirectory {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_listing(self, listing: Listing) -> Self {
            self.listings
                .lock()
                .unwrap()
                .insert(listing.id.clone(), listing);
            self
        }

        pub fn with_user(self, id: &str, email: &str) -> Self {
            self.users.lock().unwrap().insert(
                id.to_string(),
                UserIdentity {
                    id: id.to_string(),
                    email: email.to_string(),
                },
            );
            self
        }

        pub fn deactivate(&self, listing_id: &str) {
            if let Some(listing) = self.listings.lock().unwrap().get_mut(listing_id) {
                listing.is_active = false;
            }
        }
    }

    #[async_trait]
    impl ListingDirectory for StaticDirectory {
        async fn get_listing(&self, listing_id: &str) -> Result<Option<Listing>> {
            Ok(self.listings.lock().unwrap().get(listing_id).cloned())
        }
    }

    #[async_trait]
    impl IdentityProvider for StaticDirectory {
        async fn find_user(&self, user_id: &str) -> Result<Option<UserIdentity>> {
            Ok(self.users.lock().unwrap().get(user_id).cloned())
        }
    }
}
