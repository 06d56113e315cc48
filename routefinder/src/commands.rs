use crate::CLAP_STYLING;
use clap::{arg, command};
use routefinder::handlers::DEFAULT_CONFIG_DIR;
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("routefinder")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("routefinder")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Initializes the routefinder database on your filesystem")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Directory to store the routefinder database in")
                        .default_value(DEFAULT_CONFIG_DIR),
                )
                .arg(
                    arg!(-f - -"force")
                        .help(
                            "Forces the overwriting of any existing database at the specified \
                        location.",
                        )
                        .required(false),
                ),
        )
        .subcommand(
            command!("scan")
                .about(
                    "Load a single-page application and mine its scripts and markup for \
                client-side routes. Contributes routes to the store.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("The URL to scan")
                        .value_parser(clap::value_parser!(Url))
                        .conflicts_with("hosts-file"),
                )
                .arg(
                    arg!(-H --"hosts-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of URLs to scan")
                        .value_parser(clap::value_parser!(std::path::PathBuf))
                        .conflicts_with("url"),
                )
                .group(
                    clap::ArgGroup::new("target")
                        .args(["url", "hosts-file"])
                        .required(true),
                )
                .arg(
                    arg!(--"db" <PATH>)
                        .required(false)
                        .help("Database file (default: ~/.config/routefinder/routefinder.db)"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64).range(1..))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"finalize-delay" <MILLISECONDS>)
                        .required(false)
                        .help("Delay before a scan reports its final route list")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("500"),
                )
                .arg(
                    arg!(--"json")
                        .required(false)
                        .help("Print results as JSON instead of a report")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"no-save")
                        .required(false)
                        .help("Do not store discovered routes")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-v --"verbose")
                        .required(false)
                        .help("Print routes as they are discovered")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("routes")
                .about("Inspect the stored routes")
                .subcommand_required(true)
                .subcommand(
                    command!("list")
                        .about("List stored routes")
                        .arg(
                            arg!(-o --"origin" <ORIGIN>)
                                .required(false)
                                .help("Only list routes for this origin, e.g. https://app.example.com"),
                        )
                        .arg(
                            arg!(-f --"filter" <TEXT>)
                                .required(false)
                                .help("Only list routes containing TEXT (case-insensitive)"),
                        )
                        .arg(
                            arg!(--"json")
                                .required(false)
                                .help("Print routes as JSON")
                                .action(clap::ArgAction::SetTrue),
                        )
                        .arg(
                            arg!(--"db" <PATH>)
                                .required(false)
                                .help("Database file (default: ~/.config/routefinder/routefinder.db)"),
                        ),
                )
                .subcommand(
                    command!("clear").about("Remove every stored route").arg(
                        arg!(--"db" <PATH>)
                            .required(false)
                            .help("Database file (default: ~/.config/routefinder/routefinder.db)"),
                    ),
                ),
        )
}
