// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use vehicle_registry::{
    load_registry, FieldValue, Owner, RegistryCoordinator, RegistryError, Vehicle, DATE_FORMAT,
};

/// Vehicle registration registry - plate, prefix, owner and expiration lookups
#[derive(Parser, Debug)]
#[command(name = "vehicle-registry")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Walk through add / update / remove on a small in-memory registry
    Demo,

    /// Load a registrations CSV and report what was accepted
    Import {
        /// Path to registrations CSV
        csv: PathBuf,
    },

    /// Load a registrations CSV and run one lookup
    Query {
        /// Path to registrations CSV
        csv: PathBuf,

        /// Exact plate lookup
        #[arg(long, group = "lookup")]
        plate: Option<String>,

        /// Plates starting with this prefix
        #[arg(long, group = "lookup")]
        prefix: Option<String>,

        /// All plates held by a driver's license number
        #[arg(long, group = "lookup")]
        owner: Option<String>,

        /// Soonest-expiring registration
        #[arg(long, group = "lookup")]
        next: bool,

        /// Registrations expiring before this date (YYYY-MM-DD)
        #[arg(long, group = "lookup")]
        before: Option<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Load a registrations CSV, apply one field update and show the result
    Update {
        /// Path to registrations CSV
        csv: PathBuf,
        plate: String,
        /// Dotted field path, e.g. vehicle.color or expiration_date
        field: String,
        value: String,
    },

    /// Browse a registrations CSV in the terminal
    Ui {
        /// Path to registrations CSV
        csv: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    match cli.command {
        Command::Demo => run_demo()?,
        Command::Import { csv } => run_import(&csv)?,
        Command::Query {
            csv,
            plate,
            prefix,
            owner,
            next,
            before,
            json,
        } => {
            let lookup = if let Some(plate) = plate {
                Lookup::Plate(plate)
            } else if let Some(prefix) = prefix {
                Lookup::Prefix(prefix)
            } else if let Some(owner) = owner {
                Lookup::Owner(owner)
            } else if let Some(before) = before {
                Lookup::Before(
                    NaiveDate::parse_from_str(&before, DATE_FORMAT)
                        .with_context(|| format!("--before expects {}", DATE_FORMAT))?,
                )
            } else if next {
                Lookup::Next
            } else {
                bail!("Pick one of --plate, --prefix, --owner, --next, --before");
            };
            run_query(&csv, lookup, json)?;
        }
        Command::Update {
            csv,
            plate,
            field,
            value,
        } => run_update(&csv, &plate, &field, &value)?,
        Command::Ui { csv } => run_ui_mode(&csv)?,
    }

    Ok(())
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("vehicle_registry=debug")
        } else {
            EnvFilter::new("vehicle_registry=warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).with_context(|| format!("Bad date '{}'", s))
}

fn run_demo() -> Result<()> {
    println!("🚗 Vehicle Registry - Demo");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut registry = RegistryCoordinator::new();
    let owner = Owner::new("Jane", "Doe", "DL1");

    println!("\n➕ Adding ABC123 (expires 2024-01-15) and ABC456 (expires 2023-12-01)...");
    registry.add_vehicle(
        "ABC123",
        Vehicle::new("Toyota", "Corolla", 2019, "Blue", "Passenger", "1NXBR32E85Z000001"),
        owner.clone(),
        date("2023-01-15")?,
        date("2024-01-15")?,
    )?;
    registry.add_vehicle(
        "ABC456",
        Vehicle::new("Honda", "Civic", 2020, "Red", "Passenger", "2HGFC2F59LH000002"),
        owner,
        date("2022-12-01")?,
        date("2023-12-01")?,
    )?;

    let dl1 = registry.find_by_owner("DL1")?;
    println!("✓ DL1 ({}) holds {:?}", dl1.owner_name, dl1.plates);
    print_next(&registry);

    println!("\n✏️  Renewing ABC456 until 2025-01-01...");
    let previous = registry.update_field_path("ABC456", "expiration_date", "2025-01-01")?;
    println!("✓ expiration_date: {} → 2025-01-01", previous);
    print_next(&registry);

    println!("\n🗑️  Removing ABC123...");
    registry.remove_vehicle("ABC123")?;
    println!("✓ Prefix 'ABC' → {:?}", registry.find_by_prefix("ABC"));
    println!("✓ DL1 holds {:?}", registry.find_by_owner("DL1")?.plates);

    println!("\n🔍 Duplicate add is rejected...");
    let duplicate = registry.add_vehicle(
        "ABC456",
        Vehicle::new("Ford", "Focus", 2015, "White", "Passenger", "1FADP3F20FL000003"),
        Owner::new("John", "Roe", "DL2"),
        date("2023-01-01")?,
        date("2024-01-01")?,
    );
    if let Err(err) = duplicate {
        println!("✓ {}", err);
    }

    report_consistency(&registry);
    Ok(())
}

fn print_next(registry: &RegistryCoordinator) {
    match registry.peek_next_expiring() {
        Some(entry) => println!(
            "✓ Next to expire: {} on {}",
            entry.plate,
            entry.expiration_date.format(DATE_FORMAT)
        ),
        None => println!("✓ Nothing to expire"),
    }
}

fn report_consistency(registry: &RegistryCoordinator) {
    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    let violations = registry.verify_consistency();
    if violations.is_empty() {
        println!("✅ All indexes consistent ({} registrations)", registry.len());
    } else {
        println!("❌ {} index violations:", violations.len());
        for violation in violations {
            println!("   • {}", violation);
        }
    }
}

fn load(csv: &Path) -> Result<RegistryCoordinator> {
    let (registry, summary) = load_registry(csv)?;
    for (plate, err) in &summary.rejected {
        eprintln!("⚠️  Skipped {}: {}", plate, err);
    }
    Ok(registry)
}

fn run_import(csv: &Path) -> Result<()> {
    println!("📂 Loading {}...", csv.display());
    let (registry, summary) = load_registry(csv)?;

    println!("✓ Added {} registrations", summary.added);
    println!("✓ Owners: {}", registry.owners().len());
    if !summary.rejected.is_empty() {
        println!("⚠️  Rejected {}:", summary.rejected.len());
        for (plate, err) in &summary.rejected {
            println!("   • {}: {}", plate, err);
        }
    }
    print_next(&registry);

    report_consistency(&registry);
    Ok(())
}

enum Lookup {
    Plate(String),
    Prefix(String),
    Owner(String),
    Next,
    Before(NaiveDate),
}

fn run_query(csv: &Path, lookup: Lookup, json: bool) -> Result<()> {
    let registry = load(csv)?;

    match lookup {
        Lookup::Plate(plate) => match registry.find_by_plate(&plate) {
            Ok(record) if json => println!("{}", serde_json::to_string_pretty(record)?),
            Ok(record) => {
                println!(
                    "{} - {} {} {} ({})",
                    record.plate,
                    record.vehicle.year,
                    record.vehicle.make,
                    record.vehicle.model,
                    record.vehicle.color
                );
                println!(
                    "   Owner: {} [{}]",
                    record.owner.full_name(),
                    record.owner.license_number
                );
                println!(
                    "   Registered {} • Expires {}",
                    record.registration_date.format(DATE_FORMAT),
                    record.expiration_date.format(DATE_FORMAT)
                );
            }
            Err(err) => report_not_found(err),
        },
        Lookup::Prefix(prefix) => {
            let plates = registry.find_by_prefix(&prefix);
            if json {
                println!("{}", serde_json::to_string_pretty(&plates)?);
            } else {
                println!("{} plates starting with '{}':", plates.len(), prefix);
                for plate in plates {
                    println!("   {}", plate);
                }
            }
        }
        Lookup::Owner(license) => match registry.find_by_owner(&license) {
            Ok(owner) if json => println!("{}", serde_json::to_string_pretty(&owner)?),
            Ok(owner) => {
                println!("{} [{}]", owner.owner_name, owner.license_number);
                for plate in owner.plates {
                    println!("   {}", plate);
                }
            }
            Err(err) => report_not_found(err),
        },
        Lookup::Next => match registry.peek_next_expiring() {
            Some(entry) if json => println!("{}", serde_json::to_string_pretty(entry)?),
            Some(_) => print_next(&registry),
            None => println!("No registrations"),
        },
        Lookup::Before(cutoff) => {
            let entries = registry.expiring_before(cutoff);
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                println!(
                    "{} registrations expire before {}:",
                    entries.len(),
                    cutoff.format(DATE_FORMAT)
                );
                for entry in entries {
                    println!(
                        "   {}  {}",
                        entry.expiration_date.format(DATE_FORMAT),
                        entry.plate
                    );
                }
            }
        }
    }

    Ok(())
}

fn report_not_found(err: RegistryError) {
    println!("❌ {}", err);
}

fn run_update(csv: &Path, plate: &str, field: &str, value: &str) -> Result<()> {
    let mut registry = load(csv)?;

    let previous: FieldValue = registry.update_field_path(plate, field, value)?;
    println!("✓ {} {}: {} → {}", plate, field, previous, value);
    print_next(&registry);

    report_consistency(&registry);
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(csv: &Path) -> Result<()> {
    println!("🖥️  Loading Vehicle Registry UI...\n");

    let registry = load(csv)?;
    println!("✓ Loaded {} registrations\n", registry.len());
    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = ui::App::new(registry);
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_csv: &Path) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    std::process::exit(1);
}
