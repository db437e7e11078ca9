mod budget;
mod fetcher;

pub use budget::RetryBudget;
pub use fetcher::{ByteRange, FetchLimits, FetchOutcome, FetchRequest, Fetcher, LinkTarget};
pub(crate) use fetcher::remove_if_exists;
