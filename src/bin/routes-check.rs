use clap::Parser;
use std::path::PathBuf;

use viewproxy::routing::importer::parse_routes;

#[derive(Parser)]
#[command(name = "routes-check")]
#[command(about = "Validate a viewproxy routes file", long_about = None)]
struct Cli {
    /// JSON routes file to check.
    path: PathBuf,

    /// Only print failures.
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let json = std::fs::read(&cli.path)?;
    let entries = parse_routes(&json)?;

    let mut failures = 0;
    for entry in entries {
        let url = entry.url.clone();
        let route = match entry.into_route() {
            Ok(route) => route,
            Err(e) => {
                eprintln!("FAIL {}: {}", url, e);
                failures += 1;
                continue;
            }
        };

        if let Err(e) = route.validate() {
            eprintln!("FAIL {}: {}", url, e);
            failures += 1;
            continue;
        }

        if cli.quiet {
            continue;
        }

        println!("{} ({:?})", route.path(), route.layout());
        for (key, fragment) in route.fragments() {
            match fragment.timing_label() {
                Some(label) => println!("  {:<32} {} [{}]", key, fragment.path(), label),
                None => println!("  {:<32} {}", key, fragment.path()),
            }
        }
    }

    if failures > 0 {
        return Err(format!("{} invalid route(s) in {}", failures, cli.path.display()).into());
    }

    Ok(())
}
