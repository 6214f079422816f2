use std::sync::Arc;
use tripbook_core::repository::{ReservationRepository, TripRepository, UserRepository};
use tripbook_core::{AccountService, ReservationLedger, TripRegistry};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub registry: TripRegistry,
    pub ledger: ReservationLedger,
    pub accounts: AccountService,
    pub auth: AuthConfig,
}

impl AppState {
    /// Wire the services over their repositories.
    pub fn new(
        trips: Arc<dyn TripRepository>,
        reservations: Arc<dyn ReservationRepository>,
        users: Arc<dyn UserRepository>,
        auth: AuthConfig,
    ) -> Self {
        Self {
            registry: TripRegistry::new(trips.clone()),
            ledger: ReservationLedger::new(reservations, trips),
            accounts: AccountService::new(users),
            auth,
        }
    }
}
