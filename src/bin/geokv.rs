use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::metadata::LevelFilter;
use tracing::{debug, info};

use geokv::{GeoRecord, Store};

/// Loads a few ZIP codes into a store, prints it, and throws it away again.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// ZIP codes to add. The first one is removed again at the end.
    #[clap(default_values_t = [27606, 95134, 95054, 86001])]
    zips: Vec<u64>,

    /// Where to keep the store. Defaults to a fresh temporary directory.
    #[clap(long)]
    path: Option<PathBuf>,

    /// Leave the store on disk instead of deleting it at the end.
    #[clap(long, requires = "path")]
    keep: bool,

    /// Print records as JSON.
    #[clap(long)]
    json: bool,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[clap(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.verbose {
        logging::configure_with_default(LevelFilter::DEBUG);
    } else {
        logging::configure();
    }

    // Held until the end so the temporary directory outlives the store.
    let mut temp_dir = None;
    let path = match &args.path {
        Some(path) => path.clone(),
        None => {
            let dir = tempfile::Builder::new()
                .prefix("geokv")
                .tempdir()
                .context("Failed to create temporary directory")?;
            let path = dir.path().join("geo.db");
            temp_dir = Some(dir);
            path
        }
    };
    debug!(?path, "Using store path");

    let store = Store::open(&path).context("Failed to open store")?;
    info!(?path, version = env!("CARGO_PKG_VERSION"), "Starting demo");

    print_underline("Add to DB");
    for &zip in &args.zips {
        print!("Adding zip={zip}.. ");
        store
            .insert_record(&GeoRecord::mock(zip))
            .with_context(|| format!("Failed to add zip {zip}"))?;
        println!("done");
    }
    println!();

    print_underline("Dump DB");
    dump(&store, args.json)?;
    println!();

    print_underline("Lookup DB");
    for &zip in &args.zips {
        print!("Looking up zip={zip}.. ");
        match store.lookup_record(zip) {
            Ok(record) => println!("{}", render(&record, args.json)?),
            Err(e) => {
                println!();
                eprintln!("Error: {e}");
            }
        }
    }
    println!();

    if let Some(&zip) = args.zips.first() {
        print_underline("Remove from DB");
        print!("Removing zip={zip}.. ");
        store
            .remove_record(zip)
            .with_context(|| format!("Failed to remove zip {zip}"))?;
        println!("done");
        println!();

        print_underline("Dump DB");
        dump(&store, args.json)?;
        println!();
    }

    if args.keep {
        info!(?path, entries = store.len(), "Keeping store");
    } else {
        store.cleanup().context("Failed to clean up store")?;
    }
    drop(temp_dir);

    Ok(())
}

fn print_underline(header: &str) {
    println!("{header}");
    println!("{}", "=".repeat(header.len()));
}

fn dump(store: &Store, json: bool) -> Result<()> {
    for record in store.records() {
        let record = record.context("Failed to read record")?;
        println!("{}", render(&record, json)?);
    }
    Ok(())
}

fn render(record: &GeoRecord, json: bool) -> Result<String> {
    if json {
        Ok(serde_json::to_string(record)?)
    } else {
        Ok(record.to_string())
    }
}
