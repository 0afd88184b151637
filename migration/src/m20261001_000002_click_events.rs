//! 点击事件日志表迁移
//!
//! event_id 由写入方生成（单调递增），作为主键同时承担去重职责：
//! 同一批事件重放时，已存在的 event_id 会被跳过。

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ClickEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ClickEvents::EventId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ClickEvents::ShortCode)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ClickEvents::Ts)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ClickEvents::Geo).string_len(16).null())
                    .col(ColumnDef::new(ClickEvents::Device).string_len(32).null())
                    .col(ColumnDef::new(ClickEvents::Referrer).string_len(255).null())
                    .col(
                        ColumnDef::new(ClickEvents::Outcome)
                            .string_len(16)
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_click_events_code_ts")
                    .table(ClickEvents::Table)
                    .col(ClickEvents::ShortCode)
                    .col(ClickEvents::Ts)
                    .to_owned(),
            )
            .await?;

        // 保留策略按时间批量清理
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_click_events_ts")
                    .table(ClickEvents::Table)
                    .col(ClickEvents::Ts)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_click_events_ts").to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_click_events_code_ts").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(ClickEvents::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ClickEvents {
    Table,
    EventId,
    ShortCode,
    Ts,
    Geo,
    Device,
    Referrer,
    Outcome,
}
