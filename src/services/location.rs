//! Location service

use crate::db::repositories::LocationRepository;
use crate::models::Location;
use anyhow::{bail, Context, Result};
use std::sync::Arc;

/// Longest accepted location name
pub const MAX_NAME_LENGTH: usize = 256;

pub struct LocationService {
    repo: Arc<dyn LocationRepository>,
}

impl LocationService {
    pub fn new(repo: Arc<dyn LocationRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, name: &str, is_published: bool) -> Result<Location> {
        let name = name.trim();
        if name.is_empty() {
            bail!("Location name cannot be empty");
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            bail!("Location name must be at most {} characters", MAX_NAME_LENGTH);
        }
        self.repo
            .create(&Location::new(name.to_string(), is_published))
            .await
            .context("Failed to create location")
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Location>> {
        self.repo.get_by_id(id).await
    }

    pub async fn list_published(&self) -> Result<Vec<Location>> {
        self.repo.list_published().await
    }

    /// Publish or hide a location
    pub async fn set_published(&self, id: i64, is_published: bool) -> Result<()> {
        if !self.repo.set_published(id, is_published).await? {
            bail!("Location not found: {}", id);
        }
        tracing::info!(location_id = id, is_published, "Location publication changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxLocationRepository;
    use crate::db::{create_test_pool, migrations};

    #[tokio::test]
    async fn test_create_trims_and_validates() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let service = LocationService::new(SqlxLocationRepository::boxed(pool));

        let created = service.create("  Kazan ", true).await.unwrap();
        assert_eq!(created.name, "Kazan");
        assert!(service.create("   ", true).await.is_err());
        assert_eq!(service.list_published().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_set_published_hides_location() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let service = LocationService::new(SqlxLocationRepository::boxed(pool));

        let location = service.create("Kazan", true).await.unwrap();
        service.set_published(location.id, false).await.unwrap();
        assert!(service.list_published().await.unwrap().is_empty());
        assert!(service.set_published(location.id + 1, true).await.is_err());
    }
}
