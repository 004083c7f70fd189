use std::path::Path;

use gitbot::Config;
use gitbot::context::ContextDefaults;
use gitbot::context::ContextStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::Layer as _;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

pub fn setup_logging() -> anyhow::Result<()> {
    let timer = tracing_subscriber::fmt::time::ChronoLocal::new("%H:%M:%S%.3f".into());
    let format = tracing_subscriber::fmt::format().with_timer(timer);
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;
    let subscriber = tracing_subscriber::fmt::layer()
        .event_format(format)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_test_writer()
        .with_filter(filter);
    tracing_subscriber::registry().with(subscriber).init();
    Ok(())
}

/// Test config whose embedded store lives at `db_path`.
pub fn config_with_sqlite(db_path: &Path) -> Config {
    let mut config = Config::default_for_tests();
    config.sqlite_path = db_path.to_string_lossy().into_owned();
    config
}

/// Open a store on the config's SQLite file.
pub async fn open_store(config: &Config) -> anyhow::Result<ContextStore> {
    let mut store = ContextStore::new(ContextDefaults::from_config(config));
    anyhow::ensure!(store.initialize(config).await, "store did not open");
    anyhow::ensure!(
        store.backend_name() == Some("sqlite"),
        "expected the embedded backend"
    );
    Ok(store)
}

/// Open a store on the PostgreSQL server named by `DATABASE_URL`, or
/// `None` when the variable is unset.
pub async fn open_postgres_store() -> anyhow::Result<Option<ContextStore>> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return Ok(None);
    };
    let mut config = Config::default_for_tests();
    config.database_url = Some(database_url);
    let mut store = ContextStore::new(ContextDefaults::from_config(&config));
    anyhow::ensure!(store.initialize(&config).await, "store did not open");
    anyhow::ensure!(
        store.backend_name() == Some("postgres"),
        "DATABASE_URL is set but the server could not be reached"
    );
    Ok(Some(store))
}

pub enum TestDir {
    Temp(tempfile::TempDir),
    Kept(std::path::PathBuf),
}

impl TestDir {
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = tempfile::tempdir()?;

        if std::env::var("DEBUG_TESTS").is_ok() {
            let path = temp_dir.keep();
            eprintln!("Test directory kept at: {}", path.display());
            Ok(TestDir::Kept(path))
        } else {
            Ok(TestDir::Temp(temp_dir))
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            TestDir::Temp(dir) => dir.path(),
            TestDir::Kept(path) => path,
        }
    }
}
