mod date;
mod fetch;
mod parse;

pub use date::{parse_rss_date, parse_rss_date_or_now};
pub use fetch::{fetch_feed, fetch_feed_bytes};
pub use parse::{FeedDocument, FeedItem, parse_feed};
