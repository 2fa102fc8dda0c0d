//! Query-string filters for the goal and task lists.
//!
//! Every filter is optional and the ones present are combined with AND. They
//! are applied on top of [`crate::ownership::OwnerScoped::owned_by`], never in
//! place of it.

use std::collections::HashMap;

use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter, QuerySelect, QueryTrait};

use crate::{
    entities::{goal, task},
    validation::{NOT_INTEGER, ValidationErrors},
};

const NONE: &str = "None";

/// Match on a nullable reference column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefFilter {
    Unset,
    Id(i64),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoalFilters {
    pub parent_id: Option<i64>,
    /// Root goals only. Ignored when `parent_id` is set.
    pub roots_only: bool,
    pub focus_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilters {
    /// Matches the inherited flag: a task without a goal is active, one with a
    /// goal follows that goal.
    pub active: Option<bool>,
    pub today: Option<bool>,
    pub achieved: Option<bool>,
    pub focus: Option<RefFilter>,
    pub goal: Option<RefFilter>,
}

/// `True` and `False` are the only accepted spellings; anything else is no
/// filter at all.
fn flag(query: &HashMap<String, String>, key: &str) -> Option<bool> {
    match query.get(key).map(String::as_str) {
        Some("True") => Some(true),
        Some("False") => Some(false),
        _ => None,
    }
}

fn id(
    query: &HashMap<String, String>,
    key: &str,
    errors: &mut ValidationErrors,
) -> Option<i64> {
    let raw = query.get(key)?;
    match raw.trim().parse::<i64>() {
        Ok(value) => Some(value),
        Err(_) => {
            errors.add(key, NOT_INTEGER);
            None
        }
    }
}

fn reference(
    query: &HashMap<String, String>,
    key: &str,
    errors: &mut ValidationErrors,
) -> Option<RefFilter> {
    if query.get(key).map(String::as_str) == Some(NONE) {
        return Some(RefFilter::Unset);
    }
    id(query, key, errors).map(RefFilter::Id)
}

fn inherited_active_condition(active: bool) -> Condition {
    let goals = goal::Entity::find()
        .select_only()
        .column(goal::Column::Id)
        .filter(goal::Column::Active.eq(active))
        .into_query();
    let linked = task::Column::GoalId.in_subquery(goals);
    if active {
        Condition::any().add(task::Column::GoalId.is_null()).add(linked)
    } else {
        Condition::all().add(linked)
    }
}

fn ref_condition<C: ColumnTrait>(column: C, filter: Option<RefFilter>) -> Option<Condition> {
    match filter? {
        RefFilter::Unset => Some(Condition::all().add(column.is_null())),
        RefFilter::Id(id) => Some(Condition::all().add(column.eq(id))),
    }
}

impl GoalFilters {
    pub fn from_query(query: &HashMap<String, String>) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let parent_id = id(query, "parent_id", &mut errors);
        let focus_id = id(query, "focus_id", &mut errors);
        let roots_only = !query.contains_key("parent_id")
            && query.get("parent").map(String::as_str) == Some(NONE);
        errors.into_result()?;
        Ok(Self {
            parent_id,
            roots_only,
            focus_id,
        })
    }

    pub fn condition(&self) -> Condition {
        let mut condition = Condition::all();
        if let Some(parent_id) = self.parent_id {
            condition = condition.add(goal::Column::ParentId.eq(parent_id));
        } else if self.roots_only {
            condition = condition.add(goal::Column::ParentId.is_null());
        }
        if let Some(focus_id) = self.focus_id {
            condition = condition.add(goal::Column::FocusId.eq(focus_id));
        }
        condition
    }
}

impl TaskFilters {
    pub fn from_query(query: &HashMap<String, String>) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let focus = reference(query, "focus", &mut errors);
        let goal = reference(query, "goal", &mut errors);
        errors.into_result()?;
        Ok(Self {
            active: flag(query, "active"),
            today: flag(query, "today"),
            achieved: flag(query, "achieved"),
            focus,
            goal,
        })
    }

    pub fn condition(&self) -> Condition {
        let flags = [
            (task::Column::Today, self.today),
            (task::Column::Achieved, self.achieved),
        ];
        let mut condition = Condition::all();
        if let Some(active) = self.active {
            condition = condition.add(inherited_active_condition(active));
        }
        for (column, value) in flags {
            if let Some(value) = value {
                condition = condition.add(column.eq(value));
            }
        }
        if let Some(focus) = ref_condition(task::Column::FocusId, self.focus) {
            condition = condition.add(focus);
        }
        if let Some(goal) = ref_condition(task::Column::GoalId, self.goal) {
            condition = condition.add(goal);
        }
        condition
    }
}
