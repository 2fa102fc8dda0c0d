#![allow(clippy::useless_conversion)]

use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect,
    Select,
};
use thiserror::Error;

use crate::{
    ownership::OwnerScoped,
    validation::{ValidationErrors, invalid_pk},
};

pub mod focus;
pub mod goal;
pub mod label;
pub mod task;
pub mod user;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    /// Like [`PageRequest::new`], but `None` when the page starts beyond any
    /// offset the store can address.
    pub fn checked(page: u64, page_size: u64) -> Option<Self> {
        let request = Self::new(page, page_size);
        request.offset().map(|_| request)
    }

    fn offset(&self) -> Option<u64> {
        (self.page - 1)
            .checked_mul(self.page_size)
            .filter(|offset| i64::try_from(*offset).is_ok())
    }
}

/// One page of results plus the total size of the filtered collection.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub count: u64,
    pub items: Vec<T>,
}

impl<T> Paged<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paged<U> {
        Paged {
            count: self.count,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

pub(crate) async fn fetch_page<E, C>(
    db: &C,
    select: Select<E>,
    page: PageRequest,
) -> Result<Paged<E::Model>, DbErr>
where
    E: EntityTrait,
    E::Model: Send + Sync,
    C: ConnectionTrait,
{
    let count = select.clone().count(db).await?;
    let Some(offset) = page.offset() else {
        return Ok(Paged {
            count,
            items: Vec::new(),
        });
    };
    let items = select.offset(offset).limit(page.page_size).all(db).await?;
    Ok(Paged { count, items })
}

/// Records an error on `field` unless `id` names a record owned by `owner_id`.
pub(crate) async fn check_owned_ref<E, C>(
    db: &C,
    owner_id: i64,
    errors: &mut ValidationErrors,
    field: &str,
    id: Option<i64>,
) -> Result<(), DbErr>
where
    E: OwnerScoped,
    C: ConnectionTrait,
{
    let Some(id) = id else {
        return Ok(());
    };
    let found = E::find()
        .filter(E::owner_column().eq(owner_id))
        .filter(E::id_column().eq(id))
        .one(db)
        .await?
        .is_some();
    if !found {
        errors.add(field, invalid_pk(id));
    }
    Ok(())
}
