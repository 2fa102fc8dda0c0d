use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
    sea_query::{NullOrdering, Order},
};
use serde::Deserialize;
use ts_rs::TS;

use super::{PageRequest, Paged, StoreError, fetch_page};
use crate::{
    entities::focus,
    ownership::{Identity, OwnerScoped},
    validation::{ValidationErrors, check_required_text, nullable},
};

pub const NAME_MAX_CHARS: usize = 50;

#[derive(Debug, Clone)]
pub struct Focus {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub rank: Option<i32>,
    pub why: Option<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, TS)]
pub struct CreateFocus {
    pub name: Option<String>,
    pub rank: Option<i32>,
    pub why: Option<String>,
}

#[derive(Debug, Default, Deserialize, TS)]
pub struct UpdateFocus {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[ts(optional)]
    pub rank: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    #[ts(optional)]
    pub why: Option<Option<String>>,
}

impl CreateFocus {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_required_text(&mut errors, "name", self.name.as_deref(), NAME_MAX_CHARS, false);
        errors.into_result()
    }
}

impl UpdateFocus {
    pub fn validate(&self, partial: bool) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_required_text(&mut errors, "name", self.name.as_deref(), NAME_MAX_CHARS, partial);
        errors.into_result()
    }
}

impl Focus {
    fn from_model(model: focus::Model) -> Self {
        Self {
            id: model.id,
            owner_id: model.owner_id,
            name: model.name,
            rank: model.rank,
            why: model.why,
            image: model.image,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    /// Rank ascending with unranked focus areas last, then oldest first.
    pub async fn find_for_owner<C: ConnectionTrait>(
        db: &C,
        identity: &Identity,
        page: PageRequest,
    ) -> Result<Paged<Self>, DbErr> {
        let select = focus::Entity::owned_by(identity)
            .order_by_with_nulls(focus::Column::Rank, Order::Asc, NullOrdering::Last)
            .order_by_asc(focus::Column::CreatedAt)
            .order_by_asc(focus::Column::Id);
        Ok(fetch_page(db, select, page).await?.map(Self::from_model))
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let record = focus::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_by_ids<C: ConnectionTrait>(db: &C, ids: &[i64]) -> Result<Vec<Self>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let records = focus::Entity::find()
            .filter(focus::Column::Id.is_in(ids.iter().copied()))
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        owner: &Identity,
        data: &CreateFocus,
    ) -> Result<Self, StoreError> {
        data.validate()?;
        let now = Utc::now();
        let active = focus::ActiveModel {
            owner_id: Set(owner.user_id),
            name: Set(data.name.clone().unwrap_or_default()),
            rank: Set(data.rank),
            why: Set(data.why.clone()),
            image: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        tracing::debug!(focus_id = model.id, owner_id = owner.user_id, "Created focus");
        Ok(Self::from_model(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: i64,
        data: &UpdateFocus,
        partial: bool,
    ) -> Result<Self, StoreError> {
        data.validate(partial)?;
        let record = focus::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Focus not found".to_string()))?;

        let mut active: focus::ActiveModel = record.into();
        if let Some(name) = data.name.clone() {
            active.name = Set(name);
        }
        if let Some(rank) = data.rank {
            active.rank = Set(rank);
        }
        if let Some(why) = data.why.clone() {
            active.why = Set(why);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    pub async fn set_image<C: ConnectionTrait>(
        db: &C,
        id: i64,
        image: &str,
    ) -> Result<Self, DbErr> {
        let record = focus::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Focus not found".to_string()))?;

        let mut active: focus::ActiveModel = record.into();
        active.image = Set(Some(image.to_string()));
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    /// Goals and tasks under this focus go with it.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
        let result = focus::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            goal::{CreateGoal, Goal},
            task::{CreateTask, Task},
        },
        test_db::{setup_db, user},
        validation::REQUIRED,
    };

    fn named(name: &str, rank: Option<i32>) -> CreateFocus {
        CreateFocus {
            name: Some(name.to_string()),
            rank,
            why: None,
        }
    }

    #[tokio::test]
    async fn create_requires_name_and_persists_nothing_on_failure() {
        let db = setup_db().await;
        let alice = user(&db, "alice").await;

        let err = Focus::create(&db, &alice, &CreateFocus::default())
            .await
            .unwrap_err();
        match err {
            StoreError::Validation(errors) => assert_eq!(errors.messages("name"), [REQUIRED]),
            other => panic!("unexpected error: {other}"),
        }

        let page = Focus::find_for_owner(&db, &alice, PageRequest::new(1, 10))
            .await
            .unwrap();
        assert_eq!(page.count, 0);
    }

    #[tokio::test]
    async fn list_orders_by_rank_with_nulls_last() {
        let db = setup_db().await;
        let alice = user(&db, "alice").await;

        for (name, rank) in [("unranked", None), ("second", Some(2)), ("first", Some(1))] {
            Focus::create(&db, &alice, &named(name, rank)).await.unwrap();
        }

        let page = Focus::find_for_owner(&db, &alice, PageRequest::new(1, 10))
            .await
            .unwrap();
        let names: Vec<_> = page.items.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "unranked"]);
    }

    #[tokio::test]
    async fn partial_update_keeps_absent_fields_and_clears_nulls() {
        let db = setup_db().await;
        let alice = user(&db, "alice").await;
        let focus = Focus::create(
            &db,
            &alice,
            &CreateFocus {
                name: Some("Health".to_string()),
                rank: Some(3),
                why: Some("Energy".to_string()),
            },
        )
        .await
        .unwrap();

        let patch: UpdateFocus = serde_json::from_str(r#"{"why": null}"#).unwrap();
        let updated = Focus::update(&db, focus.id, &patch, true).await.unwrap();
        assert_eq!(updated.name, "Health");
        assert_eq!(updated.rank, Some(3));
        assert_eq!(updated.why, None);
        assert!(updated.updated_at >= focus.updated_at);
        assert_eq!(updated.owner_id, alice.user_id);

        let put: UpdateFocus = serde_json::from_str(r#"{"rank": 1}"#).unwrap();
        assert!(matches!(
            Focus::update(&db, focus.id, &put, false).await,
            Err(StoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn delete_cascades_to_goals_and_tasks() {
        let db = setup_db().await;
        let alice = user(&db, "alice").await;
        let focus = Focus::create(&db, &alice, &named("Work", None)).await.unwrap();
        let goal = Goal::create(
            &db,
            &alice,
            &CreateGoal {
                focus: Some(focus.id),
                title: Some("Ship it".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let task = Task::create(
            &db,
            &alice,
            &CreateTask {
                focus: Some(focus.id),
                name: Some("Write docs".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(Focus::delete(&db, focus.id).await.unwrap(), 1);
        assert!(Goal::find_by_id(&db, goal.id).await.unwrap().is_none());
        assert!(Task::find_by_id(&db, task.id).await.unwrap().is_none());
    }
}
