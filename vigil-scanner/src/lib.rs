pub mod crawler;
pub mod error;
pub mod filter;
pub mod matcher;
pub mod result;

pub use crawler::Crawler;
pub use error::CrawlError;
pub use filter::is_useful_link;
pub use matcher::{MatchMode, TermMatcher, TermSpec};
pub use result::PageResult;
