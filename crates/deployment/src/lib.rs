use std::sync::Arc;

use async_trait::async_trait;
use db::{DBService, DbErr};
use services::services::{
    config::{Config, ConfigError},
    image::{ImageError, ImageService},
};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Everything a request handler can reach: settings, the store and image
/// storage.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn config(&self) -> &Arc<RwLock<Config>>;

    fn db(&self) -> &DBService;

    fn image(&self) -> &ImageService;
}
