//! Command-line interface for wmdiff
//! Renders the visual diff of two HTML files.
//!
//! Usage:
//!   wmdiff `<old>` `<new>` [--output `<path>`] [--format html|json]
//!          [--config `<path>`] [--keep-comments]
//!
//! Logs go to stderr and are filtered with `RUST_LOG` (default `wmdiff=warn`).

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::error::Error;
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use wmdiff::{RenderOptions, RenderedDiff};
use wmdiff_config::Loader;

const DEFAULT_LOG_FILTER: &str = "wmdiff=warn";

fn main() {
    let matches = build_cli().get_matches();
    init_logging();

    if let Err(err) = handle_render_command(&matches) {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn build_cli() -> Command {
    Command::new("wmdiff")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Render a visual diff of two HTML documents")
        .arg_required_else_help(true)
        .arg(
            Arg::new("old")
                .help("Path to the old version of the page")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("new")
                .help("Path to the new version of the page")
                .required(true)
                .index(2),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .help("Write the result to this file instead of stdout"),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .short('f')
                .help("Output format")
                .value_parser(["html", "json"])
                .default_value("html"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("TOML configuration file layered over the built-in defaults"),
        )
        .arg(
            Arg::new("keep-comments")
                .long("keep-comments")
                .help("Keep HTML comments instead of stripping them before diffing")
                .action(ArgAction::SetTrue),
        )
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();
}

/// Handle the render command
fn handle_render_command(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let old_path = required(matches, "old")?;
    let new_path = required(matches, "new")?;
    let format = matches
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("html");

    let options = load_options(
        matches.get_one::<String>("config").map(String::as_str),
        matches.get_flag("keep-comments"),
    )?;
    debug!(?options, "resolved render options");

    let old_html = read_input(old_path)?;
    let new_html = read_input(new_path)?;
    let rendered = wmdiff::render_with(&old_html, &new_html, &options)?;
    info!(
        insertions = rendered.insertions,
        deletions = rendered.deletions,
        "rendered diff"
    );

    let formatted = format_output(&rendered, format)?;
    match matches.get_one::<String>("output") {
        Some(path) => fs::write(path, formatted)
            .map_err(|e| format!("cannot write '{}': {}", path, e))?,
        None => print!("{}", formatted),
    }
    Ok(())
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str, String> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| format!("missing argument <{}>", name.to_uppercase()))
}

fn load_options(config: Option<&str>, keep_comments: bool) -> Result<RenderOptions, Box<dyn Error>> {
    let mut loader = Loader::new();
    if let Some(path) = config {
        loader = loader.with_file(path);
    }
    if keep_comments {
        loader = loader.set_override("render.strip_comments", false)?;
    }
    Ok(loader.build()?.render.to_options())
}

fn read_input(path: &str) -> Result<String, String> {
    fs::read_to_string(Path::new(path)).map_err(|e| format!("cannot read '{}': {}", path, e))
}

fn format_output(rendered: &RenderedDiff, format: &str) -> Result<String, Box<dyn Error>> {
    match format {
        "html" => Ok(rendered.html.clone()),
        "json" => Ok(serde_json::to_string_pretty(rendered)?),
        other => Err(format!("format '{}' is not supported (expected html or json)", other).into()),
    }
}
