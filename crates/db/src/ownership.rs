//! Owner scoping for every stored resource.
//!
//! Lists are narrowed with [`OwnerScoped::owned_by`] before any other filter
//! runs; single records go through [`authorize`] once loaded. The requester is
//! always passed in explicitly.

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Select};

use crate::{
    entities::{focus, goal, label, task},
    models::{focus::Focus, goal::Goal, label::Label, task::Task},
};

/// The authenticated requester, as resolved by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
}

/// A record with exactly one owner, fixed at creation.
pub trait Owned {
    fn owner_id(&self) -> i64;
}

/// True iff `object` belongs to `identity`.
pub fn authorize<T: Owned + ?Sized>(identity: &Identity, object: &T) -> bool {
    object.owner_id() == identity.user_id
}

/// Keeps the records of `collection` owned by `identity`, preserving order.
pub fn list_for_owner<T, I>(collection: I, identity: &Identity) -> Vec<T>
where
    T: Owned,
    I: IntoIterator<Item = T>,
{
    collection
        .into_iter()
        .filter(|record| authorize(identity, record))
        .collect()
}

/// Query-level ownership filter for an entity table.
pub trait OwnerScoped: EntityTrait {
    fn owner_column() -> Self::Column;

    fn id_column() -> Self::Column;

    fn owned_by(identity: &Identity) -> Select<Self> {
        Self::find().filter(Self::owner_column().eq(identity.user_id))
    }
}

macro_rules! owner_scoped {
    ($($entity:ident),* $(,)?) => {
        $(
            impl OwnerScoped for $entity::Entity {
                fn owner_column() -> $entity::Column {
                    $entity::Column::OwnerId
                }

                fn id_column() -> $entity::Column {
                    $entity::Column::Id
                }
            }

            impl Owned for $entity::Model {
                fn owner_id(&self) -> i64 {
                    self.owner_id
                }
            }
        )*
    };
}

owner_scoped!(focus, goal, label, task);

macro_rules! owned_model {
    ($($model:ty),* $(,)?) => {
        $(
            impl Owned for $model {
                fn owner_id(&self) -> i64 {
                    self.owner_id
                }
            }
        )*
    };
}

owned_model!(Focus, Goal, Label, Task);
