pub mod alpha_vantage;
pub mod fetcher;
pub mod scheduler;

pub use alpha_vantage::{AlphaVantageClient, MarketDataProvider, OutputSize};
pub use fetcher::{IngestReport, IngestionFetcher};
pub use scheduler::{Job, Scheduler, SchedulerHandle, Trigger};
