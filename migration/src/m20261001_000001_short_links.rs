//! 短链接表迁移
//!
//! short_code 为主键，唯一性约束是"无冲突"保证的唯一来源。
//! 链接只会被停用（active = false），不会被物理删除。

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ShortLinks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ShortLinks::ShortCode)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ShortLinks::OriginalUrl).text().not_null())
                    .col(ColumnDef::new(ShortLinks::OwnerId).string_len(128).null())
                    .col(
                        ColumnDef::new(ShortLinks::CustomAlias)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ShortLinks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShortLinks::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ShortLinks::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ShortLinks::ClickCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        // 过期扫描：active + expires_at
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_short_links_active_expires")
                    .table(ShortLinks::Table)
                    .col(ShortLinks::Active)
                    .col(ShortLinks::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_short_links_owner")
                    .table(ShortLinks::Table)
                    .col(ShortLinks::OwnerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_short_links_owner").to_owned())
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_short_links_active_expires")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(ShortLinks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ShortLinks {
    Table,
    ShortCode,
    OriginalUrl,
    OwnerId,
    CustomAlias,
    CreatedAt,
    ExpiresAt,
    Active,
    ClickCount,
}
