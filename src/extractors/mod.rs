pub mod marketplaces;
pub mod patterns;
pub mod registry;
pub mod traits;

pub use registry::ExtractorRegistry;
pub use traits::{Platform, SourceExtractor};
