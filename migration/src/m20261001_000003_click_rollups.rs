//! 点击汇总表迁移
//!
//! 每行是 (short_code, day_bucket, dimension, dim_value) 上的一个计数，
//! 唯一索引保证 upsert 累加语义。

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ClickRollups::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ClickRollups::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ClickRollups::ShortCode)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ClickRollups::DayBucket).date().not_null())
                    .col(
                        ColumnDef::new(ClickRollups::Dimension)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ClickRollups::DimValue)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ClickRollups::Count)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        // 唯一索引：upsert 冲突目标
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_click_rollups_key")
                    .table(ClickRollups::Table)
                    .col(ClickRollups::ShortCode)
                    .col(ClickRollups::DayBucket)
                    .col(ClickRollups::Dimension)
                    .col(ClickRollups::DimValue)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_click_rollups_bucket")
                    .table(ClickRollups::Table)
                    .col(ClickRollups::DayBucket)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_click_rollups_bucket").to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_click_rollups_key").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(ClickRollups::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ClickRollups {
    Table,
    Id,
    ShortCode,
    DayBucket,
    Dimension,
    DimValue,
    Count,
}
