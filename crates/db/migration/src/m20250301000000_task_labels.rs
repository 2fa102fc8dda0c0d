use sea_orm_migration::prelude::*;

use crate::m20250101000000_baseline::{Labels, Tasks, fk_id_col, pk_id_col, timestamp_col};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(TaskLabels::Table)
                    .col(pk_id_col(manager, TaskLabels::Id))
                    .col(fk_id_col(manager, TaskLabels::TaskId))
                    .col(fk_id_col(manager, TaskLabels::LabelId))
                    .col(timestamp_col(TaskLabels::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_labels_task_id")
                            .from(TaskLabels::Table, TaskLabels::TaskId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_labels_label_id")
                            .from(TaskLabels::Table, TaskLabels::LabelId)
                            .to(Labels::Table, Labels::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_task_labels_task_label_unique")
                    .table(TaskLabels::Table)
                    .col(TaskLabels::TaskId)
                    .col(TaskLabels::LabelId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_task_labels_label_id")
                    .table(TaskLabels::Table)
                    .col(TaskLabels::LabelId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_task_labels_label_id")
                    .table(TaskLabels::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_task_labels_task_label_unique")
                    .table(TaskLabels::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(TaskLabels::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(Iden)]
enum TaskLabels {
    Table,
    Id,
    TaskId,
    LabelId,
    CreatedAt,
}
