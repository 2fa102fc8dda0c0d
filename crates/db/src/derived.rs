//! Read-only fields computed for every response.
//!
//! Nothing here is persisted. Each value is a function of the stored record,
//! the requester and the current time, so views are rebuilt on every read and
//! any of these keys in a request body is ignored.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, FixedOffset, Utc};
use sea_orm::{ConnectionTrait, DbErr};
use serde::Serialize;
use ts_rs::TS;

use crate::{
    models::{
        focus::Focus,
        goal::Goal,
        label::Label,
        task::{Task, TaskLinks},
        user::User,
    },
    ownership::{Identity, Owned, authorize},
    types::LabelColour,
};

const SECONDS_PER_DAY: i64 = 86_400;
const NEAR_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineStatus {
    Overdue,
    DueToday,
    DueTomorrow,
    Due,
}

/// Whole days from `now` to `deadline`, rounded towards the past.
pub fn days_remaining(deadline: DateTime<FixedOffset>, now: DateTime<Utc>) -> i64 {
    let now = now.with_timezone(deadline.offset());
    (deadline - now).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Calendar days are read in the deadline's own offset.
pub fn classify(deadline: DateTime<FixedOffset>, now: DateTime<Utc>) -> DeadlineStatus {
    let days = days_remaining(deadline, now);
    let today = now.with_timezone(deadline.offset()).date_naive();
    let tomorrow = today.succ_opt().map(|day| day.day());
    let day = deadline.day();

    if days < -1 {
        DeadlineStatus::Overdue
    } else if matches!(days, -1 | 0) && day == today.day() {
        DeadlineStatus::DueToday
    } else if matches!(days, 0 | 1) && Some(day) == tomorrow {
        DeadlineStatus::DueTomorrow
    } else {
        DeadlineStatus::Due
    }
}

fn short_date(deadline: DateTime<FixedOffset>) -> String {
    deadline.format("%d/%m/%y").to_string()
}

pub fn deadline_info(
    deadline: Option<DateTime<FixedOffset>>,
    now: DateTime<Utc>,
) -> Option<String> {
    let deadline = deadline?;
    let date = short_date(deadline);
    Some(match classify(deadline, now) {
        DeadlineStatus::Overdue => format!("OVERDUE {date}"),
        DeadlineStatus::DueToday => format!("Due today {date}"),
        DeadlineStatus::DueTomorrow => format!("Due tomorrow {date}"),
        DeadlineStatus::Due => format!("Due {date}"),
    })
}

pub fn goal_deadline_info(
    deadline: Option<DateTime<FixedOffset>>,
    now: DateTime<Utc>,
) -> Option<String> {
    let deadline = deadline?;
    let date = short_date(deadline);
    Some(match classify(deadline, now) {
        DeadlineStatus::Overdue => format!("Goal OVERDUE {date}"),
        DeadlineStatus::DueToday => format!("Goal due today {date}"),
        DeadlineStatus::DueTomorrow => format!("Goal due tomorrow {date}"),
        DeadlineStatus::Due => format!("Goal due {date}"),
    })
}

pub fn deadline_near(deadline: Option<DateTime<FixedOffset>>, now: DateTime<Utc>) -> bool {
    deadline.is_some_and(|deadline| days_remaining(deadline, now) <= NEAR_DAYS)
}

pub fn task_context(goal: Option<&Goal>, focus: Option<&Focus>) -> String {
    match (goal, focus) {
        (Some(goal), _) => format!("A step towards {}", goal.title),
        (None, Some(focus)) => format!("A day-to-day {} task", focus.name),
        (None, None) => "A miscellaneous task".to_string(),
    }
}

/// A task is active unless its goal is not.
pub fn inherited_active(goal: Option<&Goal>) -> bool {
    goal.is_none_or(|goal| goal.active)
}

/// Everything a view needs besides the record itself.
#[derive(Debug, Clone)]
pub struct ViewContext {
    pub identity: Identity,
    pub now: DateTime<Utc>,
    pub usernames: HashMap<i64, String>,
    pub placeholder_image: String,
}

impl ViewContext {
    pub fn new(
        identity: Identity,
        usernames: HashMap<i64, String>,
        placeholder_image: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            now: Utc::now(),
            usernames,
            placeholder_image: placeholder_image.into(),
        }
    }

    /// Resolves the owner usernames of `records` in one query.
    pub async fn load<C, T>(
        db: &C,
        identity: &Identity,
        records: &[T],
        placeholder_image: &str,
    ) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
        T: Owned,
    {
        let mut owner_ids: Vec<i64> = records.iter().map(Owned::owner_id).collect();
        owner_ids.sort_unstable();
        owner_ids.dedup();
        let usernames = User::usernames_by_ids(db, &owner_ids).await?;
        Ok(Self::new(identity.clone(), usernames, placeholder_image))
    }

    fn owner(&self, owner_id: i64) -> String {
        self.usernames.get(&owner_id).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct FocusView {
    pub id: i64,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    pub rank: Option<i32>,
    pub why: Option<String>,
    pub image: String,
    pub is_owner: bool,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct GoalView {
    pub id: i64,
    pub owner: String,
    pub is_owner: bool,
    pub focus: i64,
    pub children: bool,
    pub parent: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub active: bool,
    pub deadline: Option<DateTime<FixedOffset>>,
    pub title: String,
    pub description: Option<String>,
    pub value: Option<String>,
    pub criteria: Option<String>,
    pub deadline_near: bool,
    pub days_remaining: Option<i64>,
    pub deadline_info: Option<String>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct TaskView {
    pub id: i64,
    pub owner: String,
    pub is_owner: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub focus: Option<i64>,
    pub goal: Option<i64>,
    pub today: bool,
    pub achieved: bool,
    pub name: String,
    pub deadline: Option<DateTime<FixedOffset>>,
    pub labels: Vec<i64>,
    pub deadline_info: Option<String>,
    pub goal_deadline: Option<DateTime<FixedOffset>>,
    pub goal_deadline_info: Option<String>,
    pub context: String,
    pub active: bool,
    pub focus_rank: Option<i32>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct LabelView {
    pub id: i64,
    pub owner: String,
    pub is_owner: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    pub colour: LabelColour,
}

impl FocusView {
    pub fn build(focus: Focus, ctx: &ViewContext) -> Self {
        Self {
            id: focus.id,
            owner: ctx.owner(focus.owner_id),
            is_owner: authorize(&ctx.identity, &focus),
            created_at: focus.created_at,
            updated_at: focus.updated_at,
            name: focus.name,
            rank: focus.rank,
            why: focus.why,
            image: focus
                .image
                .unwrap_or_else(|| ctx.placeholder_image.clone()),
        }
    }
}

impl GoalView {
    pub fn build(goal: Goal, ctx: &ViewContext) -> Self {
        Self {
            id: goal.id,
            owner: ctx.owner(goal.owner_id),
            is_owner: authorize(&ctx.identity, &goal),
            focus: goal.focus_id,
            children: goal.children,
            parent: goal.parent_id,
            created_at: goal.created_at,
            updated_at: goal.updated_at,
            active: goal.active,
            deadline: goal.deadline,
            title: goal.title,
            description: goal.description,
            value: goal.value,
            criteria: goal.criteria,
            deadline_near: deadline_near(goal.deadline, ctx.now),
            days_remaining: goal.deadline.map(|d| days_remaining(d, ctx.now)),
            deadline_info: deadline_info(goal.deadline, ctx.now),
        }
    }
}

impl TaskView {
    pub fn build(task: Task, links: &TaskLinks, ctx: &ViewContext) -> Self {
        let goal = links.goal(&task);
        let focus = links.focus(&task);
        let goal_deadline = goal.and_then(|g| g.deadline);
        Self {
            id: task.id,
            owner: ctx.owner(task.owner_id),
            is_owner: authorize(&ctx.identity, &task),
            created_at: task.created_at,
            updated_at: task.updated_at,
            focus: task.focus_id,
            goal: task.goal_id,
            today: task.today,
            achieved: task.achieved,
            deadline_info: deadline_info(task.deadline, ctx.now),
            deadline: task.deadline,
            goal_deadline,
            goal_deadline_info: goal_deadline_info(goal_deadline, ctx.now),
            context: task_context(goal, focus),
            active: inherited_active(goal),
            focus_rank: focus.and_then(|f| f.rank),
            name: task.name,
            labels: task.labels,
        }
    }
}

impl LabelView {
    pub fn build(label: Label, ctx: &ViewContext) -> Self {
        Self {
            id: label.id,
            owner: ctx.owner(label.owner_id),
            is_owner: authorize(&ctx.identity, &label),
            created_at: label.created_at,
            updated_at: label.updated_at,
            name: label.name,
            colour: label.colour,
        }
    }
}
