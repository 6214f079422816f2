pub mod app_config;
pub mod database;
pub mod trip_repo;
pub mod reservation_repo;
pub mod seed;
pub mod user_repo;
mod error;

pub use database::DbClient;
pub use reservation_repo::PgReservationRepository;
pub use trip_repo::PgTripRepository;
pub use user_repo::PgUserRepository;
