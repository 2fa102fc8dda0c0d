use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set, TransactionSession, TransactionTrait,
    sea_query::{NullOrdering, Order},
};
use serde::Deserialize;
use ts_rs::TS;

use super::{
    PageRequest, Paged, StoreError, check_owned_ref, fetch_page, focus::Focus, goal::Goal,
    label::Label,
};
use crate::{
    entities::{focus, goal, task, task_label},
    filters::TaskFilters,
    ownership::{Identity, OwnerScoped},
    validation::{ValidationErrors, check_required_text, invalid_pk, nullable},
};

pub const NAME_MAX_CHARS: usize = 100;

#[derive(Debug, Clone)]
pub struct Task {
    pub id: i64,
    pub owner_id: i64,
    pub focus_id: Option<i64>,
    pub goal_id: Option<i64>,
    pub today: bool,
    pub achieved: bool,
    /// Stored flag. Responses report the value inherited from the goal.
    pub active: bool,
    pub name: String,
    pub deadline: Option<DateTime<FixedOffset>>,
    /// Label ids, ascending.
    pub labels: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, TS)]
pub struct CreateTask {
    pub focus: Option<i64>,
    pub goal: Option<i64>,
    pub today: Option<bool>,
    pub achieved: Option<bool>,
    pub name: Option<String>,
    pub deadline: Option<DateTime<FixedOffset>>,
    pub labels: Option<Vec<i64>>,
}

#[derive(Debug, Default, Deserialize, TS)]
pub struct UpdateTask {
    #[serde(default, deserialize_with = "nullable")]
    #[ts(optional)]
    pub focus: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    #[ts(optional)]
    pub goal: Option<Option<i64>>,
    pub today: Option<bool>,
    pub achieved: Option<bool>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[ts(optional)]
    pub deadline: Option<Option<DateTime<FixedOffset>>>,
    pub labels: Option<Vec<i64>>,
}

/// Goals and focus areas referenced by a batch of tasks, keyed by id.
#[derive(Debug, Default)]
pub struct TaskLinks {
    pub goals: HashMap<i64, Goal>,
    pub focuses: HashMap<i64, Focus>,
}

impl TaskLinks {
    pub async fn load<C: ConnectionTrait>(db: &C, tasks: &[Task]) -> Result<Self, DbErr> {
        let goal_ids: BTreeSet<i64> = tasks.iter().filter_map(|t| t.goal_id).collect();
        let focus_ids: BTreeSet<i64> = tasks.iter().filter_map(|t| t.focus_id).collect();
        let goal_ids: Vec<i64> = goal_ids.into_iter().collect();
        let focus_ids: Vec<i64> = focus_ids.into_iter().collect();
        let goals = Goal::find_by_ids(db, &goal_ids).await?;
        let focuses = Focus::find_by_ids(db, &focus_ids).await?;
        Ok(Self {
            goals: goals.into_iter().map(|g| (g.id, g)).collect(),
            focuses: focuses.into_iter().map(|f| (f.id, f)).collect(),
        })
    }

    pub fn goal(&self, task: &Task) -> Option<&Goal> {
        task.goal_id.and_then(|id| self.goals.get(&id))
    }

    pub fn focus(&self, task: &Task) -> Option<&Focus> {
        task.focus_id.and_then(|id| self.focuses.get(&id))
    }
}

/// Deduplicates `requested` and records an error for every id that is not a
/// label owned by `owner_id`.
async fn check_labels<C: ConnectionTrait>(
    db: &C,
    owner_id: i64,
    errors: &mut ValidationErrors,
    requested: Option<&[i64]>,
) -> Result<Option<Vec<i64>>, DbErr> {
    let Some(requested) = requested else {
        return Ok(None);
    };
    let wanted: BTreeSet<i64> = requested.iter().copied().collect();
    let wanted: Vec<i64> = wanted.into_iter().collect();
    let owned: BTreeSet<i64> = Label::owned_ids(db, owner_id, &wanted)
        .await?
        .into_iter()
        .collect();
    for id in wanted.iter().filter(|id| !owned.contains(id)) {
        errors.add("labels", invalid_pk(*id));
    }
    Ok(Some(wanted))
}

async fn replace_labels<C: ConnectionTrait>(
    db: &C,
    task_id: i64,
    labels: &[i64],
) -> Result<(), DbErr> {
    task_label::Entity::delete_many()
        .filter(task_label::Column::TaskId.eq(task_id))
        .exec(db)
        .await?;
    if labels.is_empty() {
        return Ok(());
    }
    let now = Utc::now();
    let rows = labels.iter().map(|label_id| task_label::ActiveModel {
        task_id: Set(task_id),
        label_id: Set(*label_id),
        created_at: Set(now.into()),
        ..Default::default()
    });
    task_label::Entity::insert_many(rows).exec(db).await?;
    Ok(())
}

impl CreateTask {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_required_text(&mut errors, "name", self.name.as_deref(), NAME_MAX_CHARS, false);
        errors.into_result()
    }
}

impl UpdateTask {
    pub fn validate(&self, partial: bool) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_required_text(&mut errors, "name", self.name.as_deref(), NAME_MAX_CHARS, partial);
        errors.into_result()
    }
}

impl Task {
    fn from_model(model: task::Model, labels: Vec<i64>) -> Self {
        Self {
            id: model.id,
            owner_id: model.owner_id,
            focus_id: model.focus_id,
            goal_id: model.goal_id,
            today: model.today,
            achieved: model.achieved,
            active: model.active,
            name: model.name,
            deadline: model.deadline,
            labels,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    /// Label ids per task for every id in `task_ids`.
    pub async fn labels_for<C: ConnectionTrait>(
        db: &C,
        task_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<i64>>, DbErr> {
        if task_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let links = task_label::Entity::find()
            .filter(task_label::Column::TaskId.is_in(task_ids.iter().copied()))
            .order_by_asc(task_label::Column::LabelId)
            .all(db)
            .await?;
        let mut by_task: HashMap<i64, Vec<i64>> = HashMap::new();
        for link in links {
            by_task.entry(link.task_id).or_default().push(link.label_id);
        }
        Ok(by_task)
    }

    async fn with_labels<C: ConnectionTrait>(
        db: &C,
        models: Vec<task::Model>,
    ) -> Result<Vec<Self>, DbErr> {
        let ids: Vec<i64> = models.iter().map(|m| m.id).collect();
        let mut labels = Self::labels_for(db, &ids).await?;
        Ok(models
            .into_iter()
            .map(|model| {
                let task_labels = labels.remove(&model.id).unwrap_or_default();
                Self::from_model(model, task_labels)
            })
            .collect())
    }

    /// Soonest deadline first with open-ended tasks last, then oldest first.
    pub async fn find_for_owner<C: ConnectionTrait>(
        db: &C,
        identity: &Identity,
        filters: &TaskFilters,
        page: PageRequest,
    ) -> Result<Paged<Self>, DbErr> {
        let select = task::Entity::owned_by(identity)
            .filter(filters.condition())
            .order_by_with_nulls(task::Column::Deadline, Order::Asc, NullOrdering::Last)
            .order_by_asc(task::Column::CreatedAt)
            .order_by_asc(task::Column::Id);
        let paged = fetch_page(db, select, page).await?;
        Ok(Paged {
            count: paged.count,
            items: Self::with_labels(db, paged.items).await?,
        })
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        let Some(record) = task::Entity::find_by_id(id).one(db).await? else {
            return Ok(None);
        };
        Ok(Self::with_labels(db, vec![record]).await?.pop())
    }

    pub async fn create<C>(db: &C, owner: &Identity, data: &CreateTask) -> Result<Self, StoreError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let owner_id = owner.user_id;
        let mut errors = data.validate().err().unwrap_or_default();
        check_owned_ref::<focus::Entity, _>(db, owner_id, &mut errors, "focus", data.focus).await?;
        check_owned_ref::<goal::Entity, _>(db, owner_id, &mut errors, "goal", data.goal).await?;
        let labels = check_labels(db, owner_id, &mut errors, data.labels.as_deref()).await?;
        errors.into_result()?;

        let now = Utc::now();
        let txn = db.begin().await?;
        let model = task::ActiveModel {
            owner_id: Set(owner_id),
            focus_id: Set(data.focus),
            goal_id: Set(data.goal),
            today: Set(data.today.unwrap_or(false)),
            achieved: Set(data.achieved.unwrap_or(false)),
            active: Set(true),
            name: Set(data.name.clone().unwrap_or_default()),
            deadline: Set(data.deadline),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        let labels = labels.unwrap_or_default();
        replace_labels(&txn, model.id, &labels).await?;
        txn.commit().await?;

        tracing::debug!(task_id = model.id, owner_id, "Created task");
        Ok(Self::from_model(model, labels))
    }

    /// A present `labels` list replaces the task's labels wholesale.
    pub async fn update<C>(
        db: &C,
        id: i64,
        data: &UpdateTask,
        partial: bool,
    ) -> Result<Self, StoreError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let record = task::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Task not found".to_string()))?;
        let owner_id = record.owner_id;

        let mut errors = data.validate(partial).err().unwrap_or_default();
        let focus = data.focus.flatten();
        let goal = data.goal.flatten();
        check_owned_ref::<focus::Entity, _>(db, owner_id, &mut errors, "focus", focus).await?;
        check_owned_ref::<goal::Entity, _>(db, owner_id, &mut errors, "goal", goal).await?;
        let labels = check_labels(db, owner_id, &mut errors, data.labels.as_deref()).await?;
        errors.into_result()?;

        let mut active: task::ActiveModel = record.into();
        if let Some(focus) = data.focus {
            active.focus_id = Set(focus);
        }
        if let Some(goal) = data.goal {
            active.goal_id = Set(goal);
        }
        if let Some(today) = data.today {
            active.today = Set(today);
        }
        if let Some(achieved) = data.achieved {
            active.achieved = Set(achieved);
        }
        if let Some(name) = data.name.clone() {
            active.name = Set(name);
        }
        if let Some(deadline) = data.deadline {
            active.deadline = Set(deadline);
        }
        active.updated_at = Set(Utc::now().into());

        let txn = db.begin().await?;
        let updated = active.update(&txn).await?;
        if let Some(labels) = &labels {
            replace_labels(&txn, id, labels).await?;
        }
        txn.commit().await?;

        let labels = match labels {
            Some(labels) => labels,
            None => Self::labels_for(db, &[id]).await?.remove(&id).unwrap_or_default(),
        };
        Ok(Self::from_model(updated, labels))
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
        let result = task::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected)
    }
}
