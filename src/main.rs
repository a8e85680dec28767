use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use reportavias::api::HttpRemote;
use reportavias::config::Config;
use reportavias::export;
use reportavias::feed::ReportFeed;
use reportavias::filters::{self, ReportFilter};
use reportavias::geocoding::{GeocodeOutcome, Geocoder};
use reportavias::models::location::{Coordinates, DEFAULT_CENTER};
use reportavias::models::report::{Category, NewReport, Report, ReportState};
use reportavias::models::review::Review;
use reportavias::storage::LocalStorage;
use reportavias::transitions::{self, ReportCoordinator, TransitionOutcome};
use reportavias::{Persistence, Source};

#[derive(Debug, Parser)]
#[command(
    name = "reportavias",
    about = "Citizen road-issue reports: browse, file, triage and export",
    version
)]
struct Cli {
    /// REST backend URL. Overrides `REPORTAVIAS_API_URL`.
    #[arg(long, global = true, value_name = "url")]
    api_url: Option<String>,
    /// Local mirror database. Overrides `REPORTAVIAS_DB_PATH`.
    #[arg(long, global = true, value_name = "path")]
    db: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct FilterArgs {
    /// nuevo, en_revision, atendido or all.
    #[arg(long, default_value = "all")]
    state: String,
    #[arg(long, default_value = "all")]
    category: String,
    /// First day included, YYYY-MM-DD.
    #[arg(long, value_name = "date")]
    from: Option<NaiveDate>,
    /// Last day included, YYYY-MM-DD.
    #[arg(long, value_name = "date")]
    to: Option<NaiveDate>,
    /// Case-insensitive text searched in title and description.
    #[arg(long)]
    search: Option<String>,
}

impl FilterArgs {
    fn criteria(&self) -> anyhow::Result<ReportFilter> {
        Ok(ReportFilter {
            state: ReportFilter::state_selector(&self.state)?,
            category: ReportFilter::category_selector(&self.category),
            date_from: self.from,
            date_to: self.to,
            search: self.search.clone(),
        })
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List reports matching the filters.
    List(FilterArgs),
    /// Counts per state and category, headline figures and review ratings.
    Stats,
    /// Reports per day over the last week.
    Timeline,
    Show { id: String },
    /// State history of a report.
    History { id: String },
    /// File a new report.
    Submit {
        #[arg(long)]
        category: String,
        #[arg(long)]
        description: String,
        /// Defaults to the centre of the country, like the map marker.
        #[arg(long, allow_hyphen_values = true, requires = "lng")]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lng: Option<f64>,
        /// Photo as a base64 data URL; repeatable.
        #[arg(long = "photo", value_name = "data-url")]
        photos: Vec<String>,
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Move a report to another state.
    SetState { id: String, state: ReportState },
    Delete {
        id: String,
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
    /// Look up coordinates for an address.
    Geocode {
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Write the filtered reports as CSV.
    Export {
        #[command(flatten)]
        filter: FilterArgs,
        /// Defaults to reportes_<today>.csv.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print the report count on every refresh until interrupted.
    Watch {
        /// Seconds between refreshes. Overrides `REPORTAVIAS_POLL_SECS`.
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("reportavias=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    let remote = Arc::new(HttpRemote::new(&config.api_url, config.request_timeout)?);
    let store = Arc::new(Persistence::new(remote, open_storage(&config).await?));
    let coordinator = ReportCoordinator::new(Arc::clone(&store), config.region);

    match cli.command {
        Command::List(args) => {
            let reports = store.fetch_collection::<Report>().await?;
            note_source(&reports.source);
            let matching = filters::filter_reports(&reports.data, &args.criteria()?);
            for report in &matching {
                println!(
                    "{:<14} {:<12} {:<26} {}",
                    report.id,
                    report.state.label(),
                    report.category.label(),
                    report.timestamp
                );
            }
            println!("{} of {} reports", matching.len(), reports.data.len());
        }
        Command::Stats => {
            let (reports, reviews) = futures::join!(
                store.fetch_collection::<Report>(),
                store.fetch_collection::<Review>()
            );
            let reports = reports?;
            let reviews = reviews?;
            note_source(&reports.source);

            println!("By state:");
            for (state, count) in filters::aggregate_by_state(&reports.data) {
                println!("  {:<12} {}", state.label(), count);
            }
            println!("By category:");
            for (category, count) in filters::aggregate_by_category(&reports.data) {
                println!("  {:<26} {}", category, count);
            }
            let summary = filters::summary_statistics(&reports.data);
            println!(
                "Total {} | resolved {} | active users {} | avg. resolution {} days",
                summary.total_reports, summary.resolved, summary.active_users, summary.average_resolution_days
            );
            let ratings = filters::rating_summary(&reviews.data);
            println!("Reviews: {} (average {:.1})", ratings.total, ratings.average);
            for stars in (1..=5u8).rev() {
                println!("  {} stars {:>5.1}%", stars, ratings.percent(stars));
            }
        }
        Command::Timeline => {
            let reports = store.fetch_collection::<Report>().await?;
            note_source(&reports.source);
            for entry in filters::timeline_last_7_days(&reports.data) {
                println!("{} {:>4} {}", entry.label, entry.count, "#".repeat(entry.count));
            }
        }
        Command::Show { id } => {
            let report = store.fetch_one::<Report>(&id).await?;
            note_source(&report.source);
            let report = report.data;
            println!("{} [{}]", report.title, report.state.label());
            println!("  {}", report.state.description());
            println!("  category: {}", report.category.label());
            if let Some(point) = report.coordinates() {
                println!("  location: {}, {}", point.lat, point.lng);
            }
            println!("  filed: {}", report.timestamp);
            println!("  photos: {}", report.photos.as_ref().map_or(0, Vec::len));
            println!("\n{}", report.description);
        }
        Command::History { id } => {
            let report = store.fetch_one::<Report>(&id).await?.data;
            for entry in transitions::state_history(&report) {
                println!("{}  {:<12} {}", entry.at.format("%d/%m/%Y %H:%M"), entry.state.label(), entry.description);
            }
        }
        Command::Submit {
            category,
            description,
            lat,
            lng,
            photos,
            user_id,
        } => {
            let form = NewReport {
                category: Some(Category::from(category)),
                description,
                location: match (lat, lng) {
                    (Some(lat), Some(lng)) => Coordinates::new(lat, lng),
                    _ => DEFAULT_CENTER,
                },
                photos,
                user_id,
            };
            let created = coordinator.submit(form).await?;
            note_source(&created.source);
            println!("Filed report {}", created.data.id);
        }
        Command::SetState { id, state } => {
            let report = store.fetch_one::<Report>(&id).await?.data;
            match coordinator.set_state(&report, state).await? {
                TransitionOutcome::Confirmed(report) => {
                    println!("Report {} is now {}", report.id, report.state.label())
                }
                TransitionOutcome::Pending { report, error } => println!(
                    "Report {} marked {} locally; the server could not be reached ({})",
                    report.id,
                    report.state.label(),
                    error
                ),
            }
        }
        Command::Delete { id, yes } => {
            if !yes {
                bail!("deleting report {id} cannot be undone; pass --yes to confirm");
            }
            let removed = coordinator.delete_report(&id).await?;
            note_source(&removed.source);
            if removed.data {
                println!("Deleted report {id}");
            } else {
                println!("Report {id} was not found");
            }
        }
        Command::Geocode { query } => {
            let geocoder = Geocoder::new(
                &config.geocoder_url,
                &config.user_agent,
                &config.country_name,
                &config.country_code,
                config.region,
                config.request_timeout,
            )?;
            match geocoder.geocode_address(&query.join(" ")).await? {
                GeocodeOutcome::Found {
                    coordinates,
                    display_name,
                } => println!("{}, {}  {}", coordinates.lat, coordinates.lng, display_name),
                GeocodeOutcome::NotFound { hint } => println!("{hint}"),
            }
        }
        Command::Export { filter, output } => {
            let reports = store.fetch_collection::<Report>().await?;
            note_source(&reports.source);
            let matching = filters::filter_reports(&reports.data, &filter.criteria()?);
            let path = output.unwrap_or_else(|| PathBuf::from(export::file_name(Local::now().date_naive())));
            let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
            export::write_csv(BufWriter::new(file), &matching)?;
            println!("Exported {} reports to {}", matching.len(), path.display());
        }
        Command::Watch { interval } => {
            let period = interval.map_or(config.poll_interval, |secs| Duration::from_secs(secs.max(1)));
            let (_feed, mut rx) = ReportFeed::start(Arc::clone(&store), period);
            loop {
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if let Some(snapshot) = rx.borrow_and_update().as_ref() {
                            let counts = filters::aggregate_by_state(&snapshot.data);
                            println!(
                                "{} reports ({} new, {} in review, {} attended){}",
                                snapshot.data.len(),
                                counts[&ReportState::Nuevo],
                                counts[&ReportState::EnRevision],
                                counts[&ReportState::Atendido],
                                if snapshot.is_remote() { "" } else { " [offline]" }
                            );
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
    }
    Ok(())
}

async fn open_storage(config: &Config) -> anyhow::Result<Arc<dyn LocalStorage>> {
    #[cfg(feature = "sqlite")]
    {
        let db = reportavias::db::Database::new(&config.db_path, Some(config.storage_quota))?;
        db.create_schema().await?;
        Ok(Arc::new(db))
    }
    #[cfg(not(feature = "sqlite"))]
    {
        info!("[STORAGE] Built without sqlite; local mirror lasts for this run only");
        Ok(Arc::new(reportavias::storage::MemoryStorage::with_quota(config.storage_quota)))
    }
}

fn note_source(source: &Source) {
    match source {
        Source::Remote => info!("[REPORTS] Served by the remote backend"),
        Source::Local(reason) => eprintln!("Offline: showing locally saved data ({reason})"),
    }
}
