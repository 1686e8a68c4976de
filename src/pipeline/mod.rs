//! Pipeline entry points.
//!
//! - `InstanceCrawler`: crawl the federation graph from seed domains
//! - `ResolutionPipeline`: resolve a batch of candidate handles

pub mod crawl;
pub mod frontier;
pub mod limiter;
pub mod resolve;
pub mod sink;

pub use crawl::{CrawlPhase, CrawlSummary, InstanceCrawler};
pub use frontier::{Completion, Frontier};
pub use limiter::{Limiter, Slot};
pub use resolve::{PipelineOutcome, PipelineProgress, ProgressReporter, ResolutionPipeline};
pub use sink::{CollectingSink, JsonLinesSink};
