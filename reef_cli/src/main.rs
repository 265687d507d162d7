use clap::{Parser, Subcommand};
use reef_core::*;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "reefdose")]
#[command(about = "Reef water-parameter tracker and dosing advisor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to the XDG config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Measurement store: an http(s) endpoint or a local .jsonl path
    #[arg(long, global = true)]
    source: Option<String>,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the latest reading of every parameter
    Status,

    /// List recent measurements, newest first
    History {
        /// Number of rows to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Show how one parameter has moved over time
    Trend {
        /// Parameter key (alk, ca, mg, no3, po4, ph)
        parameter: String,
    },

    /// Record a new measurement
    Log {
        /// Test date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,

        #[arg(long)]
        alk: Option<String>,

        #[arg(long)]
        ca: Option<String>,

        #[arg(long)]
        mg: Option<String>,

        #[arg(long)]
        no3: Option<String>,

        #[arg(long)]
        po4: Option<String>,

        #[arg(long)]
        ph: Option<String>,
    },

    /// Compute today's four-part dosing plan
    Dose {
        /// Current calcium in ppm (defaults to the latest logged reading)
        #[arg(long)]
        current: Option<String>,

        /// Target calcium in ppm
        #[arg(long)]
        target: Option<String>,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Salt needed for a batch of new saltwater
    Mix {
        /// Batch volume in US gallons
        #[arg(long)]
        gallons: f64,

        /// Target specific gravity (e.g. 1.025)
        #[arg(long)]
        sg: f64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    reef_core::logging::init(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let source = AnySource::from_config(&config.source, cli.source.as_deref())?;
    tracing::debug!("Using measurement source {}", source.describe());

    let session = Session::new();

    match cli.command {
        Commands::Status => {
            sync(&session, &source).await?;
            cmd_status(&session, &config)
        }
        Commands::History { limit } => {
            sync(&session, &source).await?;
            cmd_history(&session, &config, limit)
        }
        Commands::Trend { parameter } => {
            let parameter: Parameter = parameter.parse()?;
            sync(&session, &source).await?;
            cmd_trend(&session, parameter)
        }
        Commands::Log {
            date,
            alk,
            ca,
            mg,
            no3,
            po4,
            ph,
        } => {
            let entry = NewEntry {
                date: date.unwrap_or_else(|| {
                    chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
                }),
                alk,
                ca,
                mg,
                no3,
                po4,
                ph,
            };
            cmd_log(&session, &source, &entry).await
        }
        Commands::Dose {
            current,
            target,
            json,
        } => {
            sync(&session, &source).await?;
            cmd_dose(&session, &config, current, target, json)
        }
        Commands::Mix { gallons, sg } => cmd_mix(gallons, sg),
    }
}

/// Refresh the session log, reporting connection problems plainly
async fn sync(session: &Session, source: &AnySource) -> Result<()> {
    match session.refresh(source).await {
        Ok(outcome) => {
            tracing::debug!("Refresh outcome: {:?}", outcome);
            Ok(())
        }
        Err(e) => Err(Error::Other(format!(
            "Connection failed ({}): {}",
            source.describe(),
            e
        ))),
    }
}

fn cmd_status(session: &Session, config: &Config) -> Result<()> {
    let log = session.snapshot();
    let Some(latest) = log.latest() else {
        println!("No measurements logged yet.");
        return Ok(());
    };

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  TANK STATUS  ({})", latest.date.format("%m/%d/%Y"));
    println!("╰─────────────────────────────────────────╯");
    println!();

    for parameter in Parameter::ALL {
        let value = latest.get(parameter);
        let status = classify(&config.ranges, parameter, value);
        let shown = value
            .map(|v| format!("{} {}", v, parameter.unit()))
            .unwrap_or_else(|| "?".into());
        println!("  {} {:<4} {}", status.marker(), parameter.label(), shown.trim_end());
    }

    println!();
    Ok(())
}

fn cmd_history(session: &Session, config: &Config, limit: usize) -> Result<()> {
    let log = session.snapshot();
    if log.is_empty() {
        println!("No measurements logged yet.");
        return Ok(());
    }

    print!("{:<12}", "Date");
    for parameter in Parameter::ALL {
        print!("{:>10}", parameter.label());
    }
    println!();

    for m in log.iter().rev().take(limit) {
        print!("{:<12}", m.date.format("%m/%d/%Y").to_string());
        for parameter in Parameter::ALL {
            let value = m.get(parameter);
            let cell = match value {
                Some(v) => format!(
                    "{} {}",
                    v,
                    classify(&config.ranges, parameter, value).marker()
                ),
                None => "-".into(),
            };
            print!("{:>10}", cell);
        }
        println!();
    }

    Ok(())
}

fn cmd_trend(session: &Session, parameter: Parameter) -> Result<()> {
    let series = session.snapshot().series(parameter);
    let (Some(first), Some(last)) = (series.first(), series.last()) else {
        println!("No {} readings logged yet.", parameter.label());
        return Ok(());
    };

    let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    println!("{} trend ({} readings)", parameter.label(), series.len());
    println!("  {}", sparkline(&values));
    println!(
        "  {} → {}: {} → {} ({:+.2})",
        first.0.format("%m/%d/%Y"),
        last.0.format("%m/%d/%Y"),
        first.1,
        last.1,
        last.1 - first.1
    );
    println!("  min {}  max {}", min, max);
    Ok(())
}

fn sparkline(values: &[f64]) -> String {
    const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    values
        .iter()
        .map(|v| {
            if span <= 0.0 {
                BARS[BARS.len() / 2]
            } else {
                let idx = ((v - min) / span * (BARS.len() - 1) as f64).round() as usize;
                BARS[idx.min(BARS.len() - 1)]
            }
        })
        .collect()
}

async fn cmd_log(session: &Session, source: &AnySource, entry: &NewEntry) -> Result<()> {
    let measurement = session.submit(source, entry).await?;
    println!("✓ Saved entry for {}", measurement.date.format("%m/%d/%Y"));
    Ok(())
}

fn cmd_dose(
    session: &Session,
    config: &Config,
    current: Option<String>,
    target: Option<String>,
    json: bool,
) -> Result<()> {
    // Fall back to the most recent logged calcium
    let current = current.or_else(|| {
        session
            .snapshot()
            .latest_value(Parameter::Ca)
            .map(|(date, ca)| {
                tracing::info!("Using latest calcium reading {} from {}", ca, date);
                ca.to_string()
            })
    });

    let request = DoseRequest::parse(current.as_deref(), target.as_deref())?;
    let params = DosingParams::from_config(&config.tank, &config.dosing);
    let plan = session.plan(&request, &params).rounded();

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        display_plan(&request, &plan);
    }
    Ok(())
}

fn display_plan(request: &DoseRequest, plan: &DosingPlan) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  DOSING PLAN  (Ca {} → {})", request.current_ca, request.target_ca);
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Consumption: {:.1} ppm/day", plan.consumption_ppm_per_day);
    println!();

    for (name, ml) in plan.parts() {
        println!("  {:<16} {:>6.1} mL", name, ml);
    }

    println!();
    if plan.correction_applied {
        println!(
            "  ⚠ Correction included: {:.1} mL today (over {} day{})",
            plan.correction_today_ml,
            plan.correction_days,
            if plan.correction_days == 1 { "" } else { "s" }
        );
    } else {
        println!("  ✓ Levels match target");
    }
    println!();
}

fn cmd_mix(gallons: f64, sg: f64) -> Result<()> {
    let mix = mix_salt(gallons, sg)?;
    println!("Salt for {} gal at {}:", gallons, sg);
    println!("  {} g", mix.grams.round());
    println!("  {:.2} cups", mix.cups);
    Ok(())
}
