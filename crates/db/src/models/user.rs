use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect,
    Set,
};
use sha2::{Digest, Sha256};

use crate::{entities::user, ownership::Identity};

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    fn from_model(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.id,
            username: self.username.clone(),
        }
    }

    /// Tokens are only ever stored as their hex SHA-256 digest.
    pub fn hash_token(token: &str) -> String {
        format!("{:x}", Sha256::digest(token.as_bytes()))
    }

    pub async fn find_by_token<C: ConnectionTrait>(
        db: &C,
        token: &str,
    ) -> Result<Option<Self>, DbErr> {
        let record = user::Entity::find()
            .filter(user::Column::TokenHash.eq(Self::hash_token(token)))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_by_username<C: ConnectionTrait>(
        db: &C,
        username: &str,
    ) -> Result<Option<Self>, DbErr> {
        let record = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    /// Creates `username`, or rotates its token when it already exists.
    pub async fn upsert<C: ConnectionTrait>(
        db: &C,
        username: &str,
        token: &str,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let token_hash = Self::hash_token(token);
        let existing = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(db)
            .await?;

        let model = match existing {
            Some(record) if record.token_hash == token_hash => record,
            Some(record) => {
                let mut active: user::ActiveModel = record.into();
                active.token_hash = Set(token_hash);
                active.updated_at = Set(now.into());
                active.update(db).await?
            }
            None => {
                user::ActiveModel {
                    username: Set(username.to_string()),
                    token_hash: Set(token_hash),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                    ..Default::default()
                }
                .insert(db)
                .await?
            }
        };
        Ok(Self::from_model(model))
    }

    pub async fn usernames_by_ids<C: ConnectionTrait>(
        db: &C,
        ids: &[i64],
    ) -> Result<HashMap<i64, String>, DbErr> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(i64, String)> = user::Entity::find()
            .select_only()
            .column(user::Column::Id)
            .column(user::Column::Username)
            .filter(user::Column::Id.is_in(ids.iter().copied()))
            .into_tuple()
            .all(db)
            .await?;
        Ok(rows.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_db::setup_db;

    #[tokio::test]
    async fn tokens_resolve_to_users_and_rotate() {
        let db = setup_db().await;

        let created = User::upsert(&db, "alice", "first").await.unwrap();
        let found = User::find_by_token(&db, "first").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(User::find_by_token(&db, "nope").await.unwrap().is_none());

        let rotated = User::upsert(&db, "alice", "second").await.unwrap();
        assert_eq!(rotated.id, created.id);
        assert!(User::find_by_token(&db, "first").await.unwrap().is_none());
        assert!(User::find_by_token(&db, "second").await.unwrap().is_some());

        let names = User::usernames_by_ids(&db, &[created.id, 999]).await.unwrap();
        assert_eq!(names.get(&created.id).map(String::as_str), Some("alice"));
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn token_hash_is_hex_sha256() {
        let hash = User::hash_token("abc");
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
