use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use db::{DBService, models::user::User};
use deployment::{Deployment, DeploymentError};
use services::services::{
    config::{Config, load_config_from_file, save_config_to_file},
    image::ImageService,
};
use tokio::sync::RwLock;
use utils::assets::{config_path, default_database_url, images_dir};

const DATABASE_URL_ENV: &str = "DATABASE_URL";

#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<RwLock<Config>>,
    db: DBService,
    image: ImageService,
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let path = config_path()?;
        let config = load_config_from_file(&path).await;
        save_config_to_file(&config, &path).await?;

        let database_url = match std::env::var(DATABASE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => url,
            _ => default_database_url()?,
        };

        Self::build(config, &database_url, images_dir()?).await
    }

    fn config(&self) -> &Arc<RwLock<Config>> {
        &self.config
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn image(&self) -> &ImageService {
        &self.image
    }
}

impl LocalDeployment {
    /// Connects the store, provisions the configured users and prepares image
    /// storage.
    pub async fn build(
        config: Config,
        database_url: &str,
        images_dir: PathBuf,
    ) -> Result<Self, DeploymentError> {
        let db = DBService::new(database_url).await?;
        Self::seed_users(&db, &config).await?;

        let image = ImageService::new(
            images_dir,
            config.image_url_prefix.clone(),
            config.max_image_bytes,
            config.max_image_dimension,
        )?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            db,
            image,
        })
    }

    async fn seed_users(db: &DBService, config: &Config) -> Result<(), DeploymentError> {
        for seed in &config.users {
            let user = User::upsert(&db.pool, &seed.username, &seed.token).await?;
            tracing::info!(user_id = user.id, username = %user.username, "Provisioned user");
        }
        if config.users.is_empty() {
            tracing::warn!("No users configured; every API request will be rejected");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use services::services::config::SeedUser;

    use super::*;

    #[tokio::test]
    async fn build_seeds_users_and_image_storage() {
        let temp = tempfile::tempdir().unwrap();
        let db_url = format!("sqlite://{}?mode=rwc", temp.path().join("db.sqlite").display());
        let config = Config {
            users: vec![SeedUser {
                username: "alice".to_string(),
                token: "alice-token".to_string(),
            }],
            ..Config::default()
        };

        let deployment = LocalDeployment::build(config.clone(), &db_url, temp.path().join("images"))
            .await
            .unwrap();
        let alice = User::find_by_token(&deployment.db().pool, "alice-token")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alice.username, "alice");
        assert!(deployment.image().images_dir().is_dir());
        assert_eq!(deployment.config().read().await.page_size, 10);

        // A second start reuses the same account.
        let again = LocalDeployment::build(config, &db_url, temp.path().join("images"))
            .await
            .unwrap();
        let same = User::find_by_username(&again.db().pool, "alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(same.id, alice.id);
    }
}
