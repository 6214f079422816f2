use chrono::{Months, Utc};
use tracing::info;
use tripbook_core::repository::{TripRepository, UserRepository};
use tripbook_core::{CoreError, CoreResult, NewTrip, Role, Trip, User};

/// Catalogue shown on a fresh install.
fn sample_trips() -> Vec<NewTrip> {
    let today = Utc::now().date_naive();
    let in_months = |n: u32| today.checked_add_months(Months::new(n)).unwrap_or(today);

    vec![
        NewTrip {
            title: "Romantic Paris".to_string(),
            description: Some(
                "Experience the magic of the City of Light with our 5-day Paris tour. Visit the Eiffel Tower, Louvre Museum, and enjoy a Seine River cruise.".to_string(),
            ),
            trip_date: in_months(1),
            capacity: 20,
            days: 5,
            price_cents: 120_000,
        },
        NewTrip {
            title: "Historic Rome".to_string(),
            description: Some(
                "Discover the Eternal City with our 7-day Rome tour. Explore the Colosseum, Vatican City, and enjoy authentic Italian cuisine.".to_string(),
            ),
            trip_date: in_months(2),
            capacity: 15,
            days: 7,
            price_cents: 150_000,
        },
    ]
}

/// Insert the sample trips when the catalogue is empty. Returns how many
/// were created.
pub async fn seed_sample_trips(trips: &dyn TripRepository) -> CoreResult<usize> {
    if !trips.list_trips(false).await?.is_empty() {
        return Ok(0);
    }

    let mut created = 0;
    for new in sample_trips() {
        let trip = Trip::create(new)?;
        match trips.insert_trip(&trip).await {
            Ok(()) => {
                info!(title = %trip.title, "Sample trip created");
                created += 1;
            }
            // Another instance seeded it first
            Err(CoreError::Conflict(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(created)
}

/// Create the bootstrap admin account unless the email is already taken.
/// Returns whether an account was created.
pub async fn seed_admin_account(users: &dyn UserRepository, email: &str, password: &str) -> CoreResult<bool> {
    let admin = User::create(email, password, Role::Admin)?;
    if users.find_user_by_email(&admin.email).await?.is_some() {
        return Ok(false);
    }
    match users.insert_user(&admin).await {
        Ok(()) => {
            info!(email = %admin.email, "Admin account created");
            Ok(true)
        }
        Err(CoreError::Conflict(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripbook_core::InMemoryStore;

    #[tokio::test]
    async fn test_seeds_only_empty_catalogue() {
        let store = InMemoryStore::default();

        assert_eq!(seed_sample_trips(&store).await.unwrap(), 2);
        assert_eq!(seed_sample_trips(&store).await.unwrap(), 0);

        let trips = store.list_trips(true).await.unwrap();
        assert_eq!(trips.len(), 2);
        assert!(trips.iter().all(|t| t.available_spots == t.capacity));
    }

    #[tokio::test]
    async fn test_admin_seeded_once() {
        let store = InMemoryStore::default();

        assert!(seed_admin_account(&store, "admin@example.com", "admin-password").await.unwrap());
        assert!(!seed_admin_account(&store, "Admin@Example.com", "admin-password").await.unwrap());

        let admin = store.find_user_by_email("admin@example.com").await.unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert!(admin.verify_password("admin-password"));
    }
}
