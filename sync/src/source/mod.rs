//! Source side: fetching and decoding paginated play history.

mod client;
mod xml;

pub use client::{HttpPlaySource, PlaySource};
pub(crate) use client::retry_after_secs;
pub use xml::{parse_plays_page, PlayPage};
