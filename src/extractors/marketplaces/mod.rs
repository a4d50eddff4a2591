pub mod amazon;
pub mod jumia;
pub mod noon;

pub use amazon::AmazonExtractor;
pub use jumia::JumiaExtractor;
pub use noon::NoonExtractor;
