//! Create follow table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Follow::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Follow::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Follow::FromId).string_len(32).not_null())
                    .col(ColumnDef::new(Follow::ToId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Follow::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .check(Expr::col(Follow::FromId).ne(Expr::col(Follow::ToId)))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_from")
                            .from(Follow::Table, Follow::FromId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_to")
                            .from(Follow::Table, Follow::ToId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (from_id, to_id) - prevent duplicate follows
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_from_to")
                    .table(Follow::Table)
                    .col(Follow::FromId)
                    .col(Follow::ToId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: to_id (for listing followers)
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_to_id")
                    .table(Follow::Table)
                    .col(Follow::ToId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Follow::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Follow {
    Table,
    Id,
    FromId,
    ToId,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
