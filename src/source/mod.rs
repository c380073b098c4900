pub mod manager;
pub mod mock;
pub mod replay;
pub mod sample_source;

pub use manager::{FeedStats, SampleFeed};
pub use mock::MockSampleSource;
pub use replay::ReplaySource;
pub use sample_source::{SampleSource, SourceResult, SourceStatus};
