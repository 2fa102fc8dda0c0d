use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Users::Table)
                    .col(pk_id_col(manager, Users::Id))
                    .col(ColumnDef::new(Users::Username).string_len(150).not_null())
                    .col(ColumnDef::new(Users::TokenHash).string_len(64).not_null())
                    .col(timestamp_col(Users::CreatedAt))
                    .col(timestamp_col(Users::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_users_username")
                    .table(Users::Table)
                    .col(Users::Username)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_users_token_hash")
                    .table(Users::Table)
                    .col(Users::TokenHash)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Focus::Table)
                    .col(pk_id_col(manager, Focus::Id))
                    .col(fk_id_col(manager, Focus::OwnerId))
                    .col(ColumnDef::new(Focus::Name).string_len(50).not_null())
                    .col(ColumnDef::new(Focus::Rank).integer())
                    .col(ColumnDef::new(Focus::Why).text())
                    .col(ColumnDef::new(Focus::Image).string())
                    .col(timestamp_col(Focus::CreatedAt))
                    .col(timestamp_col(Focus::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_focus_owner_id")
                            .from(Focus::Table, Focus::OwnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_focus_owner_id")
                    .table(Focus::Table)
                    .col(Focus::OwnerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Goals::Table)
                    .col(pk_id_col(manager, Goals::Id))
                    .col(fk_id_col(manager, Goals::OwnerId))
                    .col(fk_id_col(manager, Goals::FocusId))
                    .col(fk_id_nullable_col(manager, Goals::ParentId))
                    .col(bool_col(Goals::Children, false))
                    .col(bool_col(Goals::Active, false))
                    .col(ColumnDef::new(Goals::Deadline).timestamp_with_time_zone())
                    .col(ColumnDef::new(Goals::Title).string_len(50).not_null())
                    .col(ColumnDef::new(Goals::Description).string_len(100))
                    .col(ColumnDef::new(Goals::Value).string_len(100))
                    .col(ColumnDef::new(Goals::Criteria).string_len(100))
                    .col(timestamp_col(Goals::CreatedAt))
                    .col(timestamp_col(Goals::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_goals_owner_id")
                            .from(Goals::Table, Goals::OwnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_goals_focus_id")
                            .from(Goals::Table, Goals::FocusId)
                            .to(Focus::Table, Focus::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_goals_parent_id")
                            .from(Goals::Table, Goals::ParentId)
                            .to(Goals::Table, Goals::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        for (name, col) in [
            ("idx_goals_owner_id", Goals::OwnerId),
            ("idx_goals_focus_id", Goals::FocusId),
            ("idx_goals_parent_id", Goals::ParentId),
        ] {
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name(name)
                        .table(Goals::Table)
                        .col(col)
                        .to_owned(),
                )
                .await?;
        }

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Labels::Table)
                    .col(pk_id_col(manager, Labels::Id))
                    .col(fk_id_col(manager, Labels::OwnerId))
                    .col(ColumnDef::new(Labels::Name).string_len(20).not_null())
                    .col(ColumnDef::new(Labels::Colour).string_len(20).not_null())
                    .col(timestamp_col(Labels::CreatedAt))
                    .col(timestamp_col(Labels::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_labels_owner_id")
                            .from(Labels::Table, Labels::OwnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_labels_owner_id")
                    .table(Labels::Table)
                    .col(Labels::OwnerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Tasks::Table)
                    .col(pk_id_col(manager, Tasks::Id))
                    .col(fk_id_col(manager, Tasks::OwnerId))
                    .col(fk_id_nullable_col(manager, Tasks::FocusId))
                    .col(fk_id_nullable_col(manager, Tasks::GoalId))
                    .col(bool_col(Tasks::Today, false))
                    .col(bool_col(Tasks::Achieved, false))
                    .col(bool_col(Tasks::Active, true))
                    .col(ColumnDef::new(Tasks::Name).string_len(100).not_null())
                    .col(ColumnDef::new(Tasks::Deadline).timestamp_with_time_zone())
                    .col(timestamp_col(Tasks::CreatedAt))
                    .col(timestamp_col(Tasks::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_owner_id")
                            .from(Tasks::Table, Tasks::OwnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_focus_id")
                            .from(Tasks::Table, Tasks::FocusId)
                            .to(Focus::Table, Focus::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_goal_id")
                            .from(Tasks::Table, Tasks::GoalId)
                            .to(Goals::Table, Goals::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        for (name, col) in [
            ("idx_tasks_owner_id", Tasks::OwnerId),
            ("idx_tasks_focus_id", Tasks::FocusId),
            ("idx_tasks_goal_id", Tasks::GoalId),
        ] {
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name(name)
                        .table(Tasks::Table)
                        .col(col)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tasks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Labels::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Goals::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Focus::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

pub(crate) fn pk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().auto_increment().primary_key().to_owned()
}

pub(crate) fn fk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().to_owned()
}

fn fk_id_nullable_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.to_owned()
}

fn bool_col<T: Iden>(col: T, default: bool) -> ColumnDef {
    ColumnDef::new(col)
        .boolean()
        .not_null()
        .default(Expr::val(default))
        .to_owned()
}

pub(crate) fn timestamp_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Username,
    TokenHash,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Focus {
    Table,
    Id,
    OwnerId,
    Name,
    Rank,
    Why,
    Image,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Goals {
    Table,
    Id,
    OwnerId,
    FocusId,
    ParentId,
    Children,
    Active,
    Deadline,
    Title,
    Description,
    Value,
    Criteria,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub(crate) enum Labels {
    Table,
    Id,
    OwnerId,
    Name,
    Colour,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub(crate) enum Tasks {
    Table,
    Id,
    OwnerId,
    FocusId,
    GoalId,
    Today,
    Achieved,
    Active,
    Name,
    Deadline,
    CreatedAt,
    UpdatedAt,
}
