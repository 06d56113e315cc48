pub mod coordinator;
pub mod data;
pub mod error;
pub mod scan;

use colored::Colorize;

pub use coordinator::{CoordinatorHandle, ScanCoordinator, ScanState, ScanStatus};
pub use error::{CoreError, Result};

pub fn print_banner() {
    let banner = r#"
                 _        __ _           _
 _ __ ___  _   _| |_ ___ / _(_)_ __   __| | ___ _ __
| '__/ _ \| | | | __/ _ \ |_| | '_ \ / _` |/ _ \ '__|
| | | (_) | |_| | ||  __/  _| | | | | (_| |  __/ |
|_|  \___/ \__,_|\__\___|_| |_|_| |_|\__,_|\___|_|
"#;
    println!("{}", banner.bright_cyan().bold());
    println!(
        "  {} {}\n",
        "client-side route discovery".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
