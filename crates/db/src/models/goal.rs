use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
    sea_query::{NullOrdering, Order},
};
use serde::Deserialize;
use ts_rs::TS;

use super::{PageRequest, Paged, StoreError, check_owned_ref, fetch_page};
use crate::{
    entities::{focus, goal},
    filters::GoalFilters,
    ownership::{Identity, OwnerScoped},
    validation::{REQUIRED, ValidationErrors, check_max_length, check_required_text, nullable},
};

pub const TITLE_MAX_CHARS: usize = 50;
pub const TEXT_MAX_CHARS: usize = 100;

const OWN_ANCESTOR: &str = "A goal cannot be its own ancestor.";

#[derive(Debug, Clone)]
pub struct Goal {
    pub id: i64,
    pub owner_id: i64,
    pub focus_id: i64,
    pub parent_id: Option<i64>,
    pub children: bool,
    pub active: bool,
    pub deadline: Option<DateTime<FixedOffset>>,
    pub title: String,
    pub description: Option<String>,
    pub value: Option<String>,
    pub criteria: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, TS)]
pub struct CreateGoal {
    pub focus: Option<i64>,
    pub parent: Option<i64>,
    pub children: Option<bool>,
    pub active: Option<bool>,
    pub deadline: Option<DateTime<FixedOffset>>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub value: Option<String>,
    pub criteria: Option<String>,
}

#[derive(Debug, Default, Deserialize, TS)]
pub struct UpdateGoal {
    pub focus: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    #[ts(optional)]
    pub parent: Option<Option<i64>>,
    pub children: Option<bool>,
    pub active: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    #[ts(optional)]
    pub deadline: Option<Option<DateTime<FixedOffset>>>,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[ts(optional)]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[ts(optional)]
    pub value: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[ts(optional)]
    pub criteria: Option<Option<String>>,
}

fn check_texts(errors: &mut ValidationErrors, texts: [(&str, Option<&str>); 3]) {
    for (field, value) in texts {
        check_max_length(errors, field, value, TEXT_MAX_CHARS);
    }
}

impl CreateGoal {
    fn field_errors(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if self.focus.is_none() {
            errors.add("focus", REQUIRED);
        }
        check_required_text(&mut errors, "title", self.title.as_deref(), TITLE_MAX_CHARS, false);
        check_texts(
            &mut errors,
            [
                ("description", self.description.as_deref()),
                ("value", self.value.as_deref()),
                ("criteria", self.criteria.as_deref()),
            ],
        );
        errors
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        self.field_errors().into_result()
    }
}

impl UpdateGoal {
    fn field_errors(&self, partial: bool) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if self.focus.is_none() && !partial {
            errors.add("focus", REQUIRED);
        }
        check_required_text(&mut errors, "title", self.title.as_deref(), TITLE_MAX_CHARS, partial);
        check_texts(
            &mut errors,
            [
                ("description", self.description.as_ref().and_then(|v| v.as_deref())),
                ("value", self.value.as_ref().and_then(|v| v.as_deref())),
                ("criteria", self.criteria.as_ref().and_then(|v| v.as_deref())),
            ],
        );
        errors
    }

    pub fn validate(&self, partial: bool) -> Result<(), ValidationErrors> {
        self.field_errors(partial).into_result()
    }
}

impl Goal {
    fn from_model(model: goal::Model) -> Self {
        Self {
            id: model.id,
            owner_id: model.owner_id,
            focus_id: model.focus_id,
            parent_id: model.parent_id,
            children: model.children,
            active: model.active,
            deadline: model.deadline,
            title: model.title,
            description: model.description,
            value: model.value_text,
            criteria: model.criteria,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    /// Soonest deadline first with open-ended goals last, then oldest first.
    pub async fn find_for_owner<C: ConnectionTrait>(
        db: &C,
        identity: &Identity,
        filters: &GoalFilters,
        page: PageRequest,
    ) -> Result<Paged<Self>, DbErr> {
        let select = goal::Entity::owned_by(identity)
            .filter(filters.condition())
            .order_by_with_nulls(goal::Column::Deadline, Order::Asc, NullOrdering::Last)
            .order_by_asc(goal::Column::CreatedAt)
            .order_by_asc(goal::Column::Id);
        Ok(fetch_page(db, select, page).await?.map(Self::from_model))
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let record = goal::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_by_ids<C: ConnectionTrait>(db: &C, ids: &[i64]) -> Result<Vec<Self>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let records = goal::Entity::find()
            .filter(goal::Column::Id.is_in(ids.iter().copied()))
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    /// True when `candidate` is `goal_id` or sits somewhere above it.
    async fn would_cycle<C: ConnectionTrait>(
        db: &C,
        goal_id: i64,
        candidate: i64,
    ) -> Result<bool, DbErr> {
        let mut seen = HashSet::new();
        let mut current = Some(candidate);
        while let Some(id) = current {
            if id == goal_id {
                return Ok(true);
            }
            if !seen.insert(id) {
                break;
            }
            current = goal::Entity::find_by_id(id)
                .one(db)
                .await?
                .and_then(|record| record.parent_id);
        }
        Ok(false)
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        owner: &Identity,
        data: &CreateGoal,
    ) -> Result<Self, StoreError> {
        let mut errors = data.field_errors();
        let owner_id = owner.user_id;
        check_owned_ref::<focus::Entity, _>(db, owner_id, &mut errors, "focus", data.focus).await?;
        check_owned_ref::<goal::Entity, _>(db, owner_id, &mut errors, "parent", data.parent)
            .await?;
        errors.into_result()?;

        let now = Utc::now();
        let active = goal::ActiveModel {
            owner_id: Set(owner.user_id),
            focus_id: Set(data.focus.unwrap_or_default()),
            parent_id: Set(data.parent),
            children: Set(data.children.unwrap_or(false)),
            active: Set(data.active.unwrap_or(false)),
            deadline: Set(data.deadline),
            title: Set(data.title.clone().unwrap_or_default()),
            description: Set(data.description.clone()),
            value_text: Set(data.value.clone()),
            criteria: Set(data.criteria.clone()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        tracing::debug!(goal_id = model.id, owner_id = owner.user_id, "Created goal");
        Ok(Self::from_model(model))
    }

    /// References are checked against the goal's owner.
    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: i64,
        data: &UpdateGoal,
        partial: bool,
    ) -> Result<Self, StoreError> {
        let record = goal::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Goal not found".to_string()))?;
        let owner = record.owner_id;

        let mut errors = data.field_errors(partial);
        check_owned_ref::<focus::Entity, _>(db, owner, &mut errors, "focus", data.focus).await?;
        if let Some(Some(parent)) = data.parent {
            check_owned_ref::<goal::Entity, _>(db, owner, &mut errors, "parent", Some(parent))
                .await?;
            if errors.messages("parent").is_empty() && Self::would_cycle(db, id, parent).await? {
                errors.add("parent", OWN_ANCESTOR);
            }
        }
        errors.into_result()?;

        let mut active: goal::ActiveModel = record.into();
        if let Some(focus) = data.focus {
            active.focus_id = Set(focus);
        }
        if let Some(parent) = data.parent {
            active.parent_id = Set(parent);
        }
        if let Some(children) = data.children {
            active.children = Set(children);
        }
        if let Some(flag) = data.active {
            active.active = Set(flag);
        }
        if let Some(deadline) = data.deadline {
            active.deadline = Set(deadline);
        }
        if let Some(title) = data.title.clone() {
            active.title = Set(title);
        }
        if let Some(description) = data.description.clone() {
            active.description = Set(description);
        }
        if let Some(value) = data.value.clone() {
            active.value_text = Set(value);
        }
        if let Some(criteria) = data.criteria.clone() {
            active.criteria = Set(criteria);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    /// Child goals and linked tasks go with it.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
        let result = goal::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected)
    }
}
