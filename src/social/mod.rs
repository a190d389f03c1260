//! Correlating breaking-news candidates with posts on social networks.

pub mod facebook;
pub mod fanout;
pub mod googleplus;
pub mod twitter;
pub mod types;

use anyhow::Result;
use futures::future::BoxFuture;

pub use facebook::Facebook;
pub use fanout::{post_count, search_terms, SocialSearch};
pub use googleplus::GooglePlus;
pub use twitter::Twitter;
pub use types::{Micropost, SocialResults};

/// One searchable network. Implementations normalise their own payloads and
/// report a missing credential as an empty result.
pub trait SocialNetwork: Send + Sync {
    /// Key under which results are reported, e.g. `Twitter`.
    fn name(&self) -> &'static str;

    /// Most recent posts quoting `term`.
    fn search<'a>(&'a self, term: &'a str) -> BoxFuture<'a, Result<Vec<Micropost>>>;
}
