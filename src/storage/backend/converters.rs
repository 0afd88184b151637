use std::str::FromStr;

use crate::errors::{LinkpulseError, Result};
use crate::storage::{ClickEvent, ClickOutcome, Dimension, Link, RollupCount, RollupKey};
use migration::entities::{click_event, click_rollup, short_link};

pub fn model_to_link(model: short_link::Model) -> Link {
    Link {
        short_code: model.short_code,
        original_url: model.original_url,
        owner_id: model.owner_id,
        custom_alias: model.custom_alias,
        created_at: model.created_at,
        expires_at: model.expires_at,
        active: model.active,
        click_count: model.click_count.max(0) as u64,
    }
}

pub fn link_to_active_model(link: &Link) -> short_link::ActiveModel {
    use sea_orm::ActiveValue::Set;

    short_link::ActiveModel {
        short_code: Set(link.short_code.clone()),
        original_url: Set(link.original_url.clone()),
        owner_id: Set(link.owner_id.clone()),
        custom_alias: Set(link.custom_alias),
        created_at: Set(link.created_at),
        expires_at: Set(link.expires_at),
        active: Set(link.active),
        click_count: Set(link.click_count.min(i64::MAX as u64) as i64),
    }
}

pub fn event_to_active_model(event: &ClickEvent) -> click_event::ActiveModel {
    use sea_orm::ActiveValue::Set;

    click_event::ActiveModel {
        event_id: Set(event.event_id),
        short_code: Set(event.short_code.clone()),
        ts: Set(event.ts),
        geo: Set(event.geo.clone()),
        device: Set(event.device.clone()),
        referrer: Set(event.referrer.clone()),
        outcome: Set(event.outcome.to_string()),
    }
}

pub fn model_to_event(model: click_event::Model) -> Result<ClickEvent> {
    let outcome = ClickOutcome::from_str(&model.outcome).map_err(|_| {
        LinkpulseError::database_operation(format!(
            "Unknown click outcome '{}' for event {}",
            model.outcome, model.event_id
        ))
    })?;
    Ok(ClickEvent {
        event_id: model.event_id,
        short_code: model.short_code,
        ts: model.ts,
        geo: model.geo,
        device: model.device,
        referrer: model.referrer,
        outcome,
    })
}

pub fn rollup_to_active_model(row: &RollupCount) -> click_rollup::ActiveModel {
    use sea_orm::ActiveValue::{NotSet, Set};

    click_rollup::ActiveModel {
        id: NotSet,
        short_code: Set(row.key.short_code.clone()),
        day_bucket: Set(row.key.bucket),
        dimension: Set(row.key.dimension.to_string()),
        dim_value: Set(row.key.value.clone()),
        count: Set(row.count.min(i64::MAX as u64) as i64),
    }
}

pub fn model_to_rollup(model: click_rollup::Model) -> Result<RollupCount> {
    let dimension = Dimension::from_str(&model.dimension).map_err(|_| {
        LinkpulseError::database_operation(format!("Unknown rollup dimension '{}'", model.dimension))
    })?;
    Ok(RollupCount {
        key: RollupKey {
            short_code: model.short_code,
            bucket: model.day_bucket,
            dimension,
            value: model.dim_value,
        },
        count: model.count.max(0) as u64,
    })
}
