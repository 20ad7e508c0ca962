use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use crossing_engine::survey::Location;
use crossing_engine::{CrossingModel, DayLayout, ExportOutcome, Observation};

#[derive(Debug, Parser)]
#[command(name = "crossing", version)]
#[command(about = "Daily crossing combinations and capacity-guarded allocation")]
struct Cli {
    /// Data root holding the day folders, rules.json and paths.json
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Day-of-year ordinal (defaults to today)
    #[arg(long)]
    day: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Record one tassel observation at a field location
    Record(RecordArgs),
    /// Show how many observations were recorded today
    Summary,
    /// Build today's combinations and tassel totals from the observations
    Generate,
    /// Enrich combinations into the candidate table
    Match,
    /// Print remaining capacity per variety
    Capacity(SelectionArgs),
    /// Export selected candidate rows against remaining capacity
    Export(ExportArgs),
}

#[derive(Debug, Args)]
struct RecordArgs {
    #[arg(long)]
    bay: String,
    #[arg(long)]
    cart: String,
    #[arg(long)]
    can: String,
    /// Number of tassels on the plant
    #[arg(long)]
    tassels: u32,
    /// Pollen rating 1-10 (1-4 male, 5-10 female)
    #[arg(long)]
    pollen: i64,
}

#[derive(Debug, Args)]
struct SelectionArgs {
    /// Candidate row number (1-based), repeatable
    #[arg(long = "row")]
    rows: Vec<usize>,
}

#[derive(Debug, Args)]
struct ExportArgs {
    #[command(flatten)]
    selection: SelectionArgs,

    /// Destination CSV (defaults to export_<day>.csv under the root)
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let layout = match cli.day {
        Some(day) => DayLayout::new(&cli.root, day),
        None => DayLayout::today(&cli.root),
    };
    layout
        .ensure_dirs()
        .with_context(|| format!("creating day folders under {}", cli.root.display()))?;
    let mut model = CrossingModel::new(layout);

    match cli.command {
        Command::Record(args) => {
            let observation = Observation {
                location: Location {
                    bay: args.bay,
                    cart: args.cart,
                    can: args.can,
                },
                tassels: args.tassels,
                pollen_rating: args.pollen,
            };
            let recorded = model.record_observation(&observation)?;
            println!("{} / {} ({})", recorded.av, recorded.std, recorded.sex.as_str());
        }
        Command::Summary => {
            let s = model.survey_summary()?;
            println!("Entries: {}  Male: {}  Female: {}", s.total, s.male, s.female);
        }
        Command::Generate => {
            let report = model.generate_combinations()?;
            println!(
                "{} combinations ({} female x {} male), {} varieties with tassel totals",
                report.combinations,
                report.female_varieties,
                report.male_varieties,
                report.tassel_varieties
            );
        }
        Command::Match => {
            let report = model.match_crossings()?;
            println!("{}", report.summary());
        }
        Command::Capacity(selection) => {
            if !selection.rows.is_empty() {
                select(&mut model, &selection)?;
            }
            for row in model.availability()? {
                let flag = if row.is_exhausted() { "  (exhausted)" } else { "" };
                println!(
                    "{:<16} {:<6} {:>6}{flag}",
                    row.variety,
                    row.role.as_str(),
                    row.remaining
                );
            }
        }
        Command::Export(args) => {
            select(&mut model, &args.selection)?;
            let destination = args.out.unwrap_or_else(|| model.default_export_path());
            match model.export_selected(&destination)? {
                ExportOutcome::NothingSelected => bail!("no rows selected; pass --row"),
                ExportOutcome::Rejected(skipped) => {
                    for skip in &skipped {
                        eprintln!("Row {}: {}", skip.row + 1, skip.reason());
                    }
                    bail!("none of the selected rows fit remaining availability");
                }
                ExportOutcome::Committed(report) => {
                    println!(
                        "Exported {} rows to {} (batch {})",
                        report.committed_rows.len(),
                        report.destination.display(),
                        report.batch_id
                    );
                    for skip in &report.skipped {
                        println!("Skipped row {}: {}", skip.row + 1, skip.reason());
                    }
                }
            }
        }
    }
    Ok(())
}

/// Load the candidate table and mark the given 1-based rows as selected.
fn select(model: &mut CrossingModel, selection: &SelectionArgs) -> Result<()> {
    model.load_candidates()?;
    for row in &selection.rows {
        if *row == 0 {
            bail!("row numbers start at 1");
        }
        model.set_selected(row - 1, true)?;
    }
    Ok(())
}
