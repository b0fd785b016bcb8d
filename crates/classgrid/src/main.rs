use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use classgrid::catalog::{BannerClient, CatalogClient, CourseCatalog, HttpCatalogClient};
use classgrid::config::{AppConfig, ENV_CONFIG_PATH};
use classgrid::db::{CatalogDb, SqliteScheduleStore};
use classgrid::grid::{layout, render_text};
use classgrid::schedule::Schedule;
use classgrid::server::{create_router, AppState};
use classgrid::store::{new_schedule_id, spawn_autosave, ScheduleStore};
use classgrid::workflow::{Phase, SelectionWorkflow};

/// How long the CLI waits for a sections lookup to land
const SECTIONS_WAIT: Duration = Duration::from_secs(20);

#[derive(Parser, Debug)]
#[command(name = "classgrid", version, about)]
struct Cli {
    /// JSON config file; falls back to $CLASSGRID_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API
    Serve,
    /// Import courses and sections from Banner into the catalog database
    Import {
        /// Overrides banner.term
        #[arg(long)]
        term: Option<String>,
        /// Overrides banner.subjects; repeatable
        #[arg(long = "subject")]
        subjects: Vec<String>,
    },
    /// Print a user's latest saved schedule as a weekly grid
    Grid {
        user_id: String,
    },
    /// Add one section of a course to a user's schedule
    Add {
        user_id: String,
        course_id: String,
        /// Section id (CRN); lists the sections when omitted
        section_id: Option<String>,
    },
    /// Remove a section from a user's schedule
    Remove {
        user_id: String,
        section_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Respects RUST_LOG, defaults to info
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .or_else(|| std::env::var_os(ENV_CONFIG_PATH).map(PathBuf::from));
    let config = AppConfig::load(config_path.as_deref()).context("failed to load config")?;

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Import { term, subjects } => import(config, term, subjects).await,
        Command::Grid { user_id } => print_grid(&config, &user_id).await,
        Command::Add {
            user_id,
            course_id,
            section_id,
        } => add_section(&config, &user_id, &course_id, section_id.as_deref()).await,
        Command::Remove {
            user_id,
            section_id,
        } => remove_section(&config, &user_id, &section_id).await,
    }
}

/// Local catalog warmed from the database, or a remote classgrid instance.
fn open_catalog(config: &AppConfig) -> Result<Arc<dyn CatalogClient>> {
    if let Some(url) = &config.catalog.remote_url {
        info!(url = %url, "Using remote catalog");
        return Ok(Arc::new(HttpCatalogClient::new(url)?));
    }

    let db = CatalogDb::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path))?;
    if !db.has_data()? {
        warn!(path = %config.database_path, "Catalog database is empty; run `classgrid import` first");
    }
    let (courses, sections) = db.load_all()?;
    let catalog = CourseCatalog::new(config.catalog.search_limit);
    catalog.replace(courses, sections);
    Ok(Arc::new(catalog))
}

fn open_store(config: &AppConfig) -> Result<Arc<dyn ScheduleStore>> {
    let store = SqliteScheduleStore::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path))?;
    Ok(Arc::new(store))
}

async fn serve(config: AppConfig) -> Result<()> {
    let state = AppState::new(open_catalog(&config)?, open_store(&config)?, config.grid.clone());
    let app = create_router(Arc::new(state));

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;
    info!(address = %address, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutting down");
        })
        .await?;
    Ok(())
}

async fn import(mut config: AppConfig, term: Option<String>, subjects: Vec<String>) -> Result<()> {
    if let Some(term) = term {
        config.banner.term = term;
    }
    if !subjects.is_empty() {
        config.banner.subjects = subjects;
    }

    let db = CatalogDb::open(&config.database_path)?;
    let client = BannerClient::new(config.banner)?;
    let import = client.import().await?;
    db.insert_import(&import)?;

    println!(
        "Imported {} courses and {} sections into {}",
        import.courses.len(),
        import.sections.len(),
        config.database_path
    );
    Ok(())
}

async fn print_grid(config: &AppConfig, user_id: &str) -> Result<()> {
    let store = open_store(config)?;
    let schedule = match store.load_latest(user_id).await? {
        Some(saved) => saved.schedule(),
        None => Schedule::new(),
    };
    print_schedule(config, &schedule);
    Ok(())
}

fn print_schedule(config: &AppConfig, schedule: &Schedule) {
    let grid = layout(schedule, &config.grid.days, &config.grid.slots());
    print!("{}", render_text(&grid));

    for conflict in schedule.conflicts() {
        println!(
            "conflict: {} ({}) overlaps {} ({})",
            conflict.first.course_id,
            conflict.first_meeting.describe(),
            conflict.second.course_id,
            conflict.second_meeting.describe(),
        );
    }
}

/// A workflow seeded with the user's latest schedule, autosaving what it commits.
struct Session {
    catalog: Arc<dyn CatalogClient>,
    workflow: SelectionWorkflow,
    autosave: tokio::task::JoinHandle<()>,
}

impl Session {
    async fn open(config: &AppConfig, user_id: &str) -> Result<Self> {
        let store = open_store(config)?;
        let catalog = open_catalog(config)?;
        let (id, name, schedule) = match store.load_latest(user_id).await? {
            Some(saved) => {
                let schedule = saved.schedule();
                (saved.id, saved.name, schedule)
            }
            None => (new_schedule_id(), "My Schedule".to_string(), Schedule::new()),
        };

        let workflow =
            SelectionWorkflow::with_schedule(catalog.clone(), config.workflow.clone(), schedule);
        let autosave = spawn_autosave(store, id, user_id.to_string(), name, workflow.subscribe());
        Ok(Self {
            catalog,
            workflow,
            autosave,
        })
    }

    /// Drops the workflow so autosave flushes the last snapshot and exits.
    async fn close(self) -> Result<Arc<Schedule>> {
        let schedule = self.workflow.schedule();
        drop(self.workflow);
        self.autosave.await.context("autosave task failed")?;
        Ok(schedule)
    }
}

async fn add_section(
    config: &AppConfig,
    user_id: &str,
    course_id: &str,
    section_id: Option<&str>,
) -> Result<()> {
    let session = Session::open(config, user_id).await?;
    let outcome = choose_and_commit(&session, course_id, section_id).await;
    let schedule = session.close().await?;
    outcome?;

    if section_id.is_some() {
        print_schedule(config, &schedule);
    }
    Ok(())
}

async fn choose_and_commit(
    session: &Session,
    course_id: &str,
    section_id: Option<&str>,
) -> Result<()> {
    let workflow = &session.workflow;
    let course = session
        .catalog
        .search_courses(course_id)
        .await?
        .into_iter()
        .find(|c| c.id.eq_ignore_ascii_case(course_id))
        .ok_or_else(|| anyhow!("course {} not found", course_id))?;

    workflow.choose_course(course);
    let deadline = tokio::time::Instant::now() + SECTIONS_WAIT;
    while workflow.phase() == Phase::SectionsLoading {
        if tokio::time::Instant::now() >= deadline {
            bail!("timed out loading sections for {}", course_id);
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    let snapshot = workflow.snapshot();
    if let Some(failure) = snapshot.last_failure {
        bail!("failed to load sections: {}", failure);
    }

    let Some(section_id) = section_id else {
        for section in &snapshot.sections {
            let times: Vec<String> = section.meetings.iter().map(|m| m.describe()).collect();
            println!(
                "{}  {} {}  {}  {}",
                section.id,
                section.course_id,
                section.section_label,
                section.professor,
                times.join(", ")
            );
        }
        return Ok(());
    };

    workflow.choose_section_by_id(section_id)?;
    workflow.commit()?;
    Ok(())
}

async fn remove_section(config: &AppConfig, user_id: &str, section_id: &str) -> Result<()> {
    let session = Session::open(config, user_id).await?;
    if !session.workflow.remove(section_id) {
        println!("{} is not in the schedule", section_id);
    }
    let schedule = session.close().await?;
    print_schedule(config, &schedule);
    Ok(())
}
