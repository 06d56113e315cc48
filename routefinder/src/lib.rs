pub mod handlers;

pub use handlers::{load_urls_from_file, load_urls_from_source, parse_url_line};

pub use routefinder_core::scan::{
    ScanEventCallback, ScanOptions, ScanOutcome, TargetResult, execute_scan,
    generate_route_report,
};
