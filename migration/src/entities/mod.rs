pub mod click_event;
pub mod click_rollup;
pub mod short_link;

pub use click_event::Entity as ClickEventEntity;
pub use click_rollup::Entity as ClickRollupEntity;
pub use short_link::Entity as ShortLinkEntity;
