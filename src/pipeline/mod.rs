//! Briefing assembly — fetch, score, cluster, and batch-preprocess inbox
//! items into an ordered, narratable briefing.

pub mod briefing;
pub mod cluster;
pub mod preprocess;
pub mod types;
pub mod worker;

pub use briefing::{BriefingPipeline, BriefingRequest};
pub use cluster::{HeuristicClusterer, SimilarityFn, default_similarity};
pub use preprocess::{BatchPreprocessor, PreprocessConfig};
pub use types::{
    Briefing, FetchFilter, Item, ItemSource, Page, Paging, PreprocessOutcome, Priority,
    ScoredItem, Topic, TopicItem,
};
pub use worker::{BackgroundBatchWorker, WorkerHandle};
