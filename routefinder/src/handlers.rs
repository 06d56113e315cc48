use anyhow::{Context, Result, anyhow, bail};
use clap::ArgMatches;
use colored::Colorize;
use routefinder_core::data::Database;
use routefinder_core::scan::{
    ScanEventCallback, ScanOptions, ScanOutcome, TargetResult, collect_routes, execute_scan,
    generate_outcome_summary, generate_route_report,
};
use routefinder_scanner::{RouteSet, ScanConfig, ScanEvent};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

pub const DEFAULT_CONFIG_DIR: &str = "~/.config/routefinder/";
pub const DATABASE_FILE: &str = "routefinder.db";

/// Logs go to stderr so stdout stays clean for reports. `RUST_LOG`
/// overrides the default `warn` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

// Helper functions for scan handler

/// Load URLs from either a file or a single URL argument
pub fn load_urls_from_source(url: Option<&Url>, hosts_file: Option<&PathBuf>) -> Result<Vec<String>> {
    if let Some(hosts_file_path) = hosts_file {
        load_urls_from_file(hosts_file_path)
    } else if let Some(url) = url {
        Ok(vec![url.as_str().to_string()])
    } else {
        bail!("Either --url or --hosts-file must be provided")
    }
}

/// Load and parse URLs from a file
pub fn load_urls_from_file(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read hosts file {}", path.display()))?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(parse_url_line)
        .collect();

    if urls.is_empty() {
        bail!("No valid URLs found in {}", path.display());
    }

    Ok(urls)
}

/// Parse a single line as a URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    if let Ok(url) = Url::parse(line)
        && url.has_host()
    {
        return Some(line.to_string());
    }

    let with_scheme = format!("http://{}", line);
    if Url::parse(&with_scheme).is_ok() {
        return Some(with_scheme);
    }

    warn!("Skipping invalid URL '{}'", line);
    None
}

/// Expands `~` in a config directory argument.
pub fn config_dir_from(arg: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(arg).as_ref())
}

/// Database location from `--db`, or the default one.
pub fn database_path(arg: Option<&String>) -> PathBuf {
    match arg {
        Some(path) => PathBuf::from(shellexpand::tilde(path).as_ref()),
        None => config_dir_from(DEFAULT_CONFIG_DIR).join(DATABASE_FILE),
    }
}

fn open_database(path: &Path) -> Result<Database> {
    if !Database::exists(path) {
        bail!(
            "No database at {}. Run `routefinder init` first",
            path.display()
        );
    }
    Database::new(path).with_context(|| format!("Failed to open database {}", path.display()))
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_lowercase())
}

/// Creates `config_dir` and the database inside it. An existing database is
/// kept unless `overwrite` is set. Returns the database path.
pub fn initialize(config_dir: &Path, overwrite: bool) -> Result<PathBuf> {
    fs::create_dir_all(config_dir)
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;

    let db_path = config_dir.join(DATABASE_FILE);
    if overwrite && Database::exists(&db_path) {
        debug!("Removing existing database {}", db_path.display());
        Database::drop(&db_path)
            .with_context(|| format!("Failed to remove {}", db_path.display()))?;
    }

    Database::new(&db_path)
        .with_context(|| format!("Failed to create database {}", db_path.display()))?;
    Ok(db_path)
}

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    print_divider();
    println!("{}", "  ROUTEFINDER INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let dir_arg = args
        .get_one::<String>("PATH")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_DIR);
    let force = args.get_flag("force");
    let config_dir = config_dir_from(dir_arg);
    let db_path = config_dir.join(DATABASE_FILE);

    println!(
        "{} Target: {}",
        "→".blue(),
        config_dir.display().to_string().bright_white()
    );
    println!();

    let mut overwrite = force;
    if Database::exists(&db_path) && !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!("Database already exists at:");
        println!(
            "  {} {}",
            "•".yellow(),
            db_path.display().to_string().bright_white()
        );
        println!();

        let response = print_prompt("Would you like to overwrite it? [y/N]:")?;
        println!();
        overwrite = response == "y" || response == "yes";
        if !overwrite {
            println!("{} Keeping existing database", "→".blue());
        }
    }

    let db_path = initialize(&config_dir, overwrite)?;

    println!();
    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!();
    println!(
        "{} Config directory: {}",
        "✓".green().bold(),
        config_dir.display().to_string().bright_white()
    );
    println!(
        "{} Database: {}",
        "✓".green().bold(),
        db_path.display().to_string().bright_white()
    );
    println!();
    Ok(())
}

/// Prints SPA advisories and, when `verbose`, routes as they are found.
fn console_callback(verbose: bool) -> ScanEventCallback {
    Arc::new(move |origin: &str, event: &ScanEvent| match event {
        ScanEvent::IsSpa => println!(
            "{} {} looks like a single-page application",
            "✓".green().bold(),
            origin.bright_white()
        ),
        ScanEvent::NotSpa => println!(
            "{} {} may not be a single-page application, scanning anyway",
            "⚠".yellow().bold(),
            origin.bright_white()
        ),
        ScanEvent::RealTimeUpdate { new_routes, .. } if verbose => {
            for route in new_routes {
                println!("  {} {}", "+".green(), route);
            }
        }
        ScanEvent::ScanError { error } => {
            println!("{} {}: {}", "✗".red().bold(), origin, error)
        }
        _ => {}
    })
}

/// Stores each target's outcome as a session record and merges the found
/// routes. Returns how many routes were new to the store.
pub fn persist_results(db: &mut Database, results: &[TargetResult]) -> Result<usize> {
    let mut inserted = 0;
    for result in results {
        if result.origin.is_empty() {
            continue;
        }
        let session_id = db.create_session(&result.origin, &result.target)?;
        match &result.outcome {
            ScanOutcome::Completed { routes } => {
                let mut found = RouteSet::new();
                found.merge(&result.origin, routes);
                inserted += db.save_routes(&found, Some(&session_id))?;
                db.complete_session(&session_id, routes.len())?;
            }
            ScanOutcome::Failed { .. } => db.fail_session(&session_id)?,
            ScanOutcome::Stopped => db.cancel_session(&session_id)?,
        }
    }
    Ok(inserted)
}

pub async fn handle_scan(args: &ArgMatches) -> Result<()> {
    let url = args.get_one::<Url>("url");
    let hosts_file = args.get_one::<PathBuf>("hosts-file");
    let db_path = database_path(args.get_one::<String>("db"));
    let timeout = *args.get_one::<u64>("timeout").unwrap_or(&10);
    let finalize_delay = *args.get_one::<u64>("finalize-delay").unwrap_or(&500);
    let json = args.get_flag("json");
    let no_save = args.get_flag("no-save");
    let verbose = args.get_flag("verbose");

    let urls = load_urls_from_source(url, hosts_file)?;
    // Fail before scanning rather than after
    let mut db = if no_save {
        None
    } else {
        Some(open_database(&db_path)?)
    };

    if !json {
        println!("\n{} Scanning {} target(s)", "→".blue().bold(), urls.len());
        println!("Timeout: {}s", timeout);
        println!("Finalize delay: {}ms\n", finalize_delay);
    }

    let mut options = ScanOptions::new(urls);
    options.show_progress_bars = !json;
    options.config = ScanConfig::default()
        .with_timeout(timeout)
        .with_finalize_delay(Duration::from_millis(finalize_delay));

    let interrupt = options.interrupt.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let callback = (!json).then(|| console_callback(verbose));
    let results = execute_scan(options, callback)
        .await
        .context("Scan failed")?;
    let found = collect_routes(&results);

    if let Some(ref mut db) = db {
        let inserted = persist_results(db, &results)?;
        if !json {
            println!(
                "{} Saved {} new route(s) to {}",
                "✓".green().bold(),
                inserted,
                db_path.display()
            );
        }
    }

    if json {
        let output = serde_json::json!({
            "results": &results,
            "routesByOrigin": &found,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!();
        print!("{}", generate_outcome_summary(&results));
        println!();
        print!("{}", generate_route_report(&found));
    }

    let failed = results
        .iter()
        .filter(|r| matches!(r.outcome, ScanOutcome::Failed { .. }))
        .count();
    if failed > 0 {
        return Err(anyhow!("{} of {} target(s) failed", failed, results.len()));
    }
    Ok(())
}

/// Stored routes, optionally limited to one origin and to routes containing
/// `filter`.
pub fn stored_routes(db: &Database, origin: Option<&str>, filter: Option<&str>) -> Result<RouteSet> {
    let mut routes = db.load_routes()?;
    if let Some(origin) = origin {
        routes.retain_origin(origin.trim_end_matches('/'));
    }
    if let Some(filter) = filter.filter(|f| !f.trim().is_empty()) {
        routes.retain_matching(filter.trim());
    }
    Ok(routes)
}

pub fn handle_routes_list(args: &ArgMatches) -> Result<()> {
    let db = open_database(&database_path(args.get_one::<String>("db")))?;
    let routes = stored_routes(
        &db,
        args.get_one::<String>("origin").map(String::as_str),
        args.get_one::<String>("filter").map(String::as_str),
    )?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&routes)?);
    } else if routes.is_empty() {
        println!("{} No routes stored", "→".blue());
    } else {
        print!("{}", generate_route_report(&routes));
    }
    Ok(())
}

pub fn handle_routes_clear(args: &ArgMatches) -> Result<()> {
    let db = open_database(&database_path(args.get_one::<String>("db")))?;
    let removed = db.clear_routes()?;
    println!("{} Removed {} stored route(s)", "✓".green().bold(), removed);
    Ok(())
}
