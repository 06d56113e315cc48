pub mod config;
pub mod error;
pub mod event;
pub mod extractor;
pub mod fetcher;
pub mod injector;
pub mod page;
pub mod routes;
pub mod session;
pub mod spa;

pub use config::ScanConfig;
pub use error::{FetchFailure, ScanError};
pub use event::{ScanEvent, SessionChannel, SessionEvent, SessionId, SessionSignal, StartAck};
pub use extractor::{PathExtractor, is_valid_path};
pub use fetcher::ResourceFetcher;
pub use injector::{HttpInjector, Injector};
pub use page::{Page, PageSnapshot};
pub use routes::{RouteSet, is_valid_origin};
pub use session::{ScanSession, SessionState};
