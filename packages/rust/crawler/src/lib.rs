//! Portal crawling, HTML extraction, and the shared external-service client.
//!
//! This crate provides:
//! - [`client`]: rate-limited, retrying, cache-backed [`ServiceClient`]
//! - [`portal`]: day-page parsing into raw events
//! - [`infobox`]: place detection and infobox rows of linked article pages
//! - [`datetime`]: date and time readings of infobox values
//! - [`engine`]: the concurrent [`PortalCrawler`]

pub mod client;
pub mod datetime;
pub mod engine;
pub mod infobox;
pub mod portal;
mod text;

pub use client::{ServiceClient, ServiceStats};
pub use engine::{DayFailure, DayOutcome, DayPage, PortalCrawler};
pub use infobox::{ArticleInfo, LocatedPlace, PLACE_INFOBOX_CLASSES, inspect_article};
pub use portal::{article_title, day_box_id, parse_day_page};
