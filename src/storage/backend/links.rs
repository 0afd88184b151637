//! LinkStore implementation for SeaOrmStorage

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, ExprTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QuerySelect, TransactionTrait,
};
use tracing::{debug, info};

use super::SeaOrmStorage;
use super::converters::{link_to_active_model, model_to_link};
use super::retry;
use crate::errors::{LinkpulseError, Result};
use crate::storage::{Link, LinkStore, LinkUpdate};
use migration::entities::short_link;

#[async_trait]
impl LinkStore for SeaOrmStorage {
    async fn create(&self, link: Link) -> Result<Link> {
        link.validate_new(Utc::now())?;
        let db = &self.db;
        let model = link_to_active_model(&link);

        let result = retry::with_retry(
            &format!("create({})", link.short_code),
            self.retry_config,
            || async {
                short_link::Entity::insert(model.clone())
                    .exec_without_returning(db)
                    .await
            },
        )
        .await;

        match result {
            Ok(_) => {
                debug!("Short link created: {}", link.short_code);
                Ok(link)
            }
            Err(e) if retry::is_unique_violation(&e) => Err(LinkpulseError::alias_taken(
                format!("Short code '{}' is already in use", link.short_code),
            )),
            Err(e) => Err(LinkpulseError::database_operation(format!(
                "Failed to create short link '{}': {}",
                link.short_code, e
            ))),
        }
    }

    async fn get(&self, code: &str) -> Result<Option<Link>> {
        let db = &self.db;
        let model = retry::with_retry(&format!("get({})", code), self.retry_config, || async {
            short_link::Entity::find_by_id(code.to_string()).one(db).await
        })
        .await
        .map_err(|e| {
            LinkpulseError::database_operation(format!("Failed to load short link: {}", e))
        })?;

        Ok(model.map(model_to_link))
    }

    async fn update(&self, code: &str, update: LinkUpdate) -> Result<Link> {
        update.validate(Utc::now())?;

        let model = short_link::Entity::find_by_id(code.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| LinkpulseError::not_found(format!("Short link not found: {}", code)))?;

        if update.is_empty() {
            return Ok(model_to_link(model));
        }

        let mut active = model.into_active_model();
        if let Some(url) = &update.original_url {
            active.original_url = Set(url.clone());
        }
        if let Some(expires_at) = update.expires_at {
            active.expires_at = Set(expires_at);
        }

        let updated = active.update(&self.db).await?;
        info!("Short link updated: {}", code);
        Ok(model_to_link(updated))
    }

    async fn deactivate(&self, code: &str) -> Result<()> {
        let db = &self.db;
        let result = retry::with_retry(
            &format!("deactivate({})", code),
            self.retry_config,
            || async {
                short_link::Entity::update_many()
                    .col_expr(short_link::Column::Active, Expr::value(false))
                    .filter(short_link::Column::ShortCode.eq(code))
                    .exec(db)
                    .await
            },
        )
        .await?;

        // MySQL 对未变化的行返回 0，需要再确认链接是否存在
        if result.rows_affected == 0 && self.get(code).await?.is_none() {
            return Err(LinkpulseError::not_found(format!(
                "Short link not found: {}",
                code
            )));
        }

        info!("Short link deactivated: {}", code);
        Ok(())
    }

    async fn add_clicks(&self, deltas: &[(String, u64)]) -> Result<()> {
        if deltas.is_empty() {
            return Ok(());
        }

        let db = &self.db;
        retry::with_retry("add_clicks", self.retry_config, || async {
            let txn = db.begin().await?;
            for (code, n) in deltas {
                short_link::Entity::update_many()
                    .col_expr(
                        short_link::Column::ClickCount,
                        Expr::col(short_link::Column::ClickCount).add(*n as i64),
                    )
                    .filter(short_link::Column::ShortCode.eq(code.as_str()))
                    .exec(&txn)
                    .await?;
            }
            txn.commit().await
        })
        .await?;

        debug!("Click counts bumped for {} links", deltas.len());
        Ok(())
    }

    async fn set_click_count(&self, code: &str, count: u64) -> Result<()> {
        let db = &self.db;
        retry::with_retry(
            &format!("set_click_count({})", code),
            self.retry_config,
            || async {
                short_link::Entity::update_many()
                    .col_expr(
                        short_link::Column::ClickCount,
                        Expr::value(Ord::min(count, i64::MAX as u64) as i64),
                    )
                    .filter(short_link::Column::ShortCode.eq(code))
                    .exec(db)
                    .await
            },
        )
        .await?;
        Ok(())
    }

    async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let codes: Vec<String> = short_link::Entity::find()
            .select_only()
            .column(short_link::Column::ShortCode)
            .filter(short_link::Column::Active.eq(true))
            .filter(short_link::Column::ExpiresAt.lte(now))
            .into_tuple()
            .all(&self.db)
            .await?;

        if codes.is_empty() {
            return Ok(codes);
        }

        for chunk in codes.chunks(500) {
            short_link::Entity::update_many()
                .col_expr(short_link::Column::Active, Expr::value(false))
                .filter(short_link::Column::ShortCode.is_in(chunk.iter().cloned()))
                .exec(&self.db)
                .await?;
        }

        info!("Expiry sweep deactivated {} links", codes.len());
        Ok(codes)
    }

    async fn count(&self) -> Result<u64> {
        Ok(short_link::Entity::find().count(&self.db).await?)
    }
}
