use anyhow::{bail, Context, Result};
use gym_insight::config::Config;
use gym_insight::finance::forecast_history;
use gym_insight::forecast::{DEFAULT_FORECAST_MONTHS, HISTORY_MONTHS, MAX_FORECAST_MONTHS};
use gym_insight::{
    forecast, init_tracing, insert_expenses, insert_income, load_expense_csv, load_income_csv,
    open, setup_database, ForecastError, VERSION,
};
use std::env;
use std::path::Path;
use tracing::info;

const USAGE: &str = "Usage:
  gym-insight init
  gym-insight import-income <csv>
  gym-insight import-expenses <csv>
  gym-insight forecast [months]";

fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let config = Config::from_env().context("invalid configuration")?;

    match args.get(1).map(String::as_str) {
        Some("init") => run_init(&config.database_path),
        Some("import-income") => run_import(&config.database_path, args.get(2), ImportKind::Income),
        Some("import-expenses") => {
            run_import(&config.database_path, args.get(2), ImportKind::Expenses)
        }
        Some("forecast") => run_forecast(&config, args.get(2)),
        _ => {
            eprintln!("🏋️  Gym Insight {}\n\n{}", VERSION, USAGE);
            std::process::exit(2);
        }
    }
}

fn run_init(db_path: &Path) -> Result<()> {
    println!("🔧 Setting up database...");
    let conn = open(db_path)?;
    setup_database(&conn)?;
    println!("✓ Database initialized at {:?}", db_path);
    Ok(())
}

enum ImportKind {
    Income,
    Expenses,
}

fn run_import(db_path: &Path, csv_arg: Option<&String>, kind: ImportKind) -> Result<()> {
    let Some(csv_arg) = csv_arg else {
        bail!("missing CSV path\n\n{}", USAGE);
    };
    let csv_path = Path::new(csv_arg);

    let conn = open(db_path)?;
    setup_database(&conn)?;

    println!("\n📂 Loading {:?}...", csv_path);
    let (loaded, summary) = match kind {
        ImportKind::Income => {
            let rows = load_income_csv(csv_path)?;
            (rows.len(), insert_income(&conn, &rows)?)
        }
        ImportKind::Expenses => {
            let rows = load_expense_csv(csv_path)?;
            (rows.len(), insert_expenses(&conn, &rows)?)
        }
    };

    info!(file = %csv_path.display(), loaded, "import complete");
    println!("✓ Loaded {} rows", loaded);
    println!("✓ Inserted: {}", summary.inserted);
    println!("✓ Duplicates skipped: {}", summary.duplicates);
    Ok(())
}

fn run_forecast(config: &Config, months_arg: Option<&String>) -> Result<()> {
    let months_ahead = match months_arg {
        Some(raw) => raw
            .parse::<u32>()
            .with_context(|| format!("months must be a non-negative integer, got {:?}", raw))?,
        None => DEFAULT_FORECAST_MONTHS,
    };
    if months_ahead > MAX_FORECAST_MONTHS {
        bail!("months must be at most {}", MAX_FORECAST_MONTHS);
    }

    let conn = open(&config.database_path)?;
    let today = chrono::Local::now().date_naive();
    let history = forecast_history(&conn, HISTORY_MONTHS, today)?;

    let result = match forecast(&history, months_ahead, today, &config.assumptions.seasonality) {
        Ok(result) => result,
        Err(ForecastError::InsufficientHistory {
            available,
            required,
        }) => {
            println!(
                "⚠️  Not enough history to forecast: {} month(s) recorded, {} needed",
                available, required
            );
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("📈 Cash-flow forecast ({} months ahead)", months_ahead);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "{:<16} {:>12} {:>12} {:>12} {:>6}",
        "Month", "Revenue", "Expenses", "Profit", "Conf"
    );
    for point in &result.points {
        println!(
            "{:<16} {:>12.2} {:>12.2} {:>12.2} {:>6.2}",
            point.month_label,
            point.predicted_revenue,
            point.predicted_expenses,
            point.predicted_profit,
            point.confidence
        );
    }
    println!(
        "\nAverage growth: revenue {:.1}%, expenses {:.1}% per month",
        result.avg_revenue_growth * 100.0,
        result.avg_expense_growth * 100.0
    );

    Ok(())
}
