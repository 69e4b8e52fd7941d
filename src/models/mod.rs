mod summary;
mod url;

pub use summary::LinkSummary;
pub use url::{LinkRecord, LinkStats, ShortenRequest, ShortenResponse};
