use std::str::FromStr;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::Deserialize;
use ts_rs::TS;

use super::{PageRequest, Paged, StoreError, fetch_page};
use crate::{
    entities::label,
    ownership::{Identity, OwnerScoped},
    types::LabelColour,
    validation::{REQUIRED, ValidationErrors, check_required_text},
};

pub const NAME_MAX_CHARS: usize = 20;

#[derive(Debug, Clone)]
pub struct Label {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub colour: LabelColour,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Colour arrives as free text so an unknown choice becomes a field error
/// instead of a body-level parse failure.
#[derive(Debug, Default, Deserialize, TS)]
pub struct CreateLabel {
    pub name: Option<String>,
    pub colour: Option<String>,
}

pub type UpdateLabel = CreateLabel;

fn parse_colour(
    errors: &mut ValidationErrors,
    colour: Option<&str>,
    partial: bool,
) -> Option<LabelColour> {
    match colour {
        None if partial => None,
        None => {
            errors.add("colour", REQUIRED);
            None
        }
        Some(raw) => match LabelColour::from_str(raw) {
            Ok(colour) => Some(colour),
            Err(_) => {
                errors.add("colour", format!("\"{raw}\" is not a valid choice."));
                None
            }
        },
    }
}

impl CreateLabel {
    fn checked(&self, partial: bool) -> Result<Option<LabelColour>, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_required_text(&mut errors, "name", self.name.as_deref(), NAME_MAX_CHARS, partial);
        let colour = parse_colour(&mut errors, self.colour.as_deref(), partial);
        errors.into_result()?;
        Ok(colour)
    }
}

impl Label {
    fn from_model(model: label::Model) -> Self {
        Self {
            id: model.id,
            owner_id: model.owner_id,
            name: model.name,
            colour: model.colour,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    pub async fn find_for_owner<C: ConnectionTrait>(
        db: &C,
        identity: &Identity,
        page: PageRequest,
    ) -> Result<Paged<Self>, DbErr> {
        let select = label::Entity::owned_by(identity)
            .order_by_asc(label::Column::Name)
            .order_by_asc(label::Column::CreatedAt)
            .order_by_asc(label::Column::Id);
        Ok(fetch_page(db, select, page).await?.map(Self::from_model))
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let record = label::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    /// Ids among `ids` that are labels owned by `owner_id`.
    pub async fn owned_ids<C: ConnectionTrait>(
        db: &C,
        owner_id: i64,
        ids: &[i64],
    ) -> Result<Vec<i64>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let records = label::Entity::find()
            .filter(label::Column::OwnerId.eq(owner_id))
            .filter(label::Column::Id.is_in(ids.iter().copied()))
            .all(db)
            .await?;
        Ok(records.into_iter().map(|record| record.id).collect())
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        owner: &Identity,
        data: &CreateLabel,
    ) -> Result<Self, StoreError> {
        let Some(colour) = data.checked(false)? else {
            return Err(ValidationErrors::single("colour", REQUIRED).into());
        };
        let now = Utc::now();
        let active = label::ActiveModel {
            owner_id: Set(owner.user_id),
            name: Set(data.name.clone().unwrap_or_default()),
            colour: Set(colour),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        tracing::debug!(label_id = model.id, owner_id = owner.user_id, "Created label");
        Ok(Self::from_model(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: i64,
        data: &UpdateLabel,
        partial: bool,
    ) -> Result<Self, StoreError> {
        let colour = data.checked(partial)?;
        let record = label::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Label not found".to_string()))?;

        let mut active: label::ActiveModel = record.into();
        if let Some(name) = data.name.clone() {
            active.name = Set(name);
        }
        if let Some(colour) = colour {
            active.colour = Set(colour);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    /// Also unlinks the label from every task.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
        let result = label::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected)
    }
}
