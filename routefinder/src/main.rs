use colored::Colorize;
use commands::command_argument_builder;
use routefinder::handlers::{
    handle_init, handle_routes_clear, handle_routes_list, handle_scan, init_tracing,
};
use routefinder_core::print_banner;

mod commands;

#[tokio::main]
async fn main() {
    init_tracing();

    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    let result = match chosen_command.subcommand() {
        // No subcommand provided, just show the banner
        None => Ok(()),
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("scan", primary_command)) => handle_scan(primary_command).await,
        Some(("routes", primary_command)) => match primary_command.subcommand() {
            Some(("list", secondary_command)) => handle_routes_list(secondary_command),
            Some(("clear", secondary_command)) => handle_routes_clear(secondary_command),
            _ => unreachable!("clap should ensure we don't get here"),
        },
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
