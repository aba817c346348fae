//! codevault: Content-addressed code index
//!
//! Usage:
//!   codevault add <path> [-r] [-f] [-v] [--symbol-map FILE]
//!   codevault remove <hash>
//!   codevault status
//!   codevault search <name>
//!   codevault show <hash>
//!   codevault reconcile [--prune]
//!   codevault inspect <target> [-r] [--format table|json] [--detailed]

use std::env;
use std::path::PathBuf;
use std::process;

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use codevault::cli::{
    add_command, inspect_command, reconcile_command, remove_command, resolve_root,
    search_command, show_command, status_command, InspectFormat,
};
use codevault::AddOptions;

fn main() -> Result<()> {
    let mut args: Vec<String> = env::args().collect();

    // --root DIR may appear anywhere
    let root_flag = take_value(&mut args, "--root");
    let root = resolve_root(root_flag.as_deref());

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    let verbose = has_flag(&args, "--verbose") || has_flag(&args, "-v");
    if verbose {
        setup_debug_logging();
    } else {
        setup_logging();
    }

    match args[1].as_str() {
        "add" => {
            let symbol_map = take_value(&mut args, "--symbol-map").map(PathBuf::from);
            let Some(path) = positional(&args) else {
                eprintln!("Usage: codevault add <path> [-r] [-f] [-v] [--symbol-map FILE]");
                process::exit(2);
            };
            let options = AddOptions {
                recursive: has_flag(&args, "-r") || has_flag(&args, "--recursive"),
                force: has_flag(&args, "-f") || has_flag(&args, "--force"),
                verbose,
                symbol_map,
            };
            if !add_command(&root, path, &options)? {
                process::exit(1);
            }
        }
        "remove" => {
            let Some(hash) = positional(&args) else {
                eprintln!("Usage: codevault remove <hash>");
                process::exit(2);
            };
            if !remove_command(&root, hash)? {
                process::exit(1);
            }
        }
        "status" => {
            status_command(&root)?;
        }
        "search" => {
            let Some(query) = positional(&args) else {
                eprintln!("Usage: codevault search <name>");
                return Ok(());
            };
            search_command(&root, query)?;
        }
        "show" => {
            let Some(hash) = positional(&args) else {
                eprintln!("Usage: codevault show <hash>");
                return Ok(());
            };
            show_command(&root, hash)?;
        }
        "reconcile" => {
            reconcile_command(&root, has_flag(&args, "--prune"))?;
        }
        "inspect" => {
            let format = match take_value(&mut args, "--format") {
                Some(name) => match InspectFormat::parse(&name) {
                    Some(format) => format,
                    None => {
                        eprintln!("Unknown format '{}', expected table or json", name);
                        process::exit(2);
                    }
                },
                None if has_flag(&args, "--json") => InspectFormat::Json,
                None => InspectFormat::Table,
            };
            let Some(target) = positional(&args) else {
                eprintln!("Usage: codevault inspect <target> [-r] [--format table|json] [--detailed]");
                process::exit(2);
            };
            let recursive = has_flag(&args, "-r") || has_flag(&args, "--recursive");
            let detailed = has_flag(&args, "-d") || has_flag(&args, "--detailed");
            if let Err(err) = inspect_command(&root, target, recursive, format, detailed) {
                eprintln!("Error: {:#}", err);
                process::exit(1);
            }
        }
        "help" | "--help" | "-h" => {
            print_usage();
        }
        "--version" | "-V" | "version" => {
            print_version();
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
        }
    }

    Ok(())
}

/// Remove `flag VALUE` from the arguments and return the value
fn take_value(args: &mut Vec<String>, flag: &str) -> Option<String> {
    let i = args.iter().position(|a| a == flag)?;
    if i + 1 >= args.len() {
        args.remove(i);
        return None;
    }
    let value = args.remove(i + 1);
    args.remove(i);
    Some(value)
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().skip(2).any(|a| a == flag)
}

/// First non-flag argument after the command
fn positional(args: &[String]) -> Option<&str> {
    args.iter()
        .skip(2)
        .find(|a| !a.starts_with('-'))
        .map(|s| s.as_str())
}

fn print_usage() {
    println!(
        r#"codevault: Content-addressed code index

USAGE:
    codevault [--root DIR] <COMMAND> [OPTIONS]

COMMANDS:
    add <path>             Store a file or directory and index its symbols
        -r, --recursive      Descend into subdirectories
        -f, --force          Re-parse content that is already stored
        -v, --verbose        Report every file
        --symbol-map FILE    JSON map of name or name:kind to existing keys
    remove <hash>          Remove a stored source unit and its symbols
    status                 Show index statistics
    search <name>          Search for symbols by name prefix
    show <hash>            Show a source unit and its symbols
    reconcile [--prune]    Find (and remove) content without index rows
    inspect <target>       Parse and list symbols without storing anything
        -r, --recursive      Descend into subdirectories
        --format FORMAT      table (default) or json
        -d, --detailed       Add columns, dependencies and documentation
    help                   Show this help message

The vault root is --root, else $CODEVAULT_ROOT, else ~/.codevault.

EXAMPLES:
    codevault add src -r               # Store every source file under src
    codevault add lib/util.ts -f       # Re-index one file
    codevault search "load"            # Find symbols starting with "load"
    codevault inspect src -r --format json
    codevault remove 3a7bd3e2360a...   # Evict a source unit
"#
    );
}

fn print_version() {
    println!("codevault {}", env!("CARGO_PKG_VERSION"));
}

fn setup_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn setup_debug_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}
