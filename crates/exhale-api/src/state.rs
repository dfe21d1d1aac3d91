//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! Services are generic over repository traits, but AppState pins them to the
//! concrete SQLite implementations.

use std::path::PathBuf;
use std::sync::Arc;

use exhale_core::messaging::MessageService;
use exhale_core::realtime::RoomRegistry;
use exhale_core::scheduling::AppointmentService;
use exhale_infra::config::{load_platform_config, resolve_data_dir};
use exhale_infra::sqlite::appointment::SqliteAppointmentRepository;
use exhale_infra::sqlite::availability::SqliteAvailabilitySource;
use exhale_infra::sqlite::message::SqliteMessageRepository;
use exhale_infra::sqlite::pool::DatabasePool;
use exhale_types::config::PlatformConfig;

/// Per-receiver buffer of undelivered room signals before lagging. Consumers
/// recover from lag by re-fetching, so this stays small.
const ROOM_CAPACITY: usize = 256;

/// Concrete type aliases for the service generics pinned to SQLite implementations.
pub type ConcreteAppointmentService =
    AppointmentService<SqliteAppointmentRepository, SqliteAvailabilitySource>;

pub type ConcreteMessageService =
    MessageService<SqliteMessageRepository, SqliteAppointmentRepository>;

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub appointments: Arc<ConcreteAppointmentService>,
    pub messages: Arc<ConcreteMessageService>,
    pub rooms: Arc<RoomRegistry>,
    pub config: PlatformConfig,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: connect to DB, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        // Initialize database
        let db_url = format!(
            "sqlite://{}?mode=rwc",
            data_dir.join("exhale.db").display()
        );
        let db_pool = DatabasePool::new(&db_url).await?;

        let config = load_platform_config(&data_dir).await;

        // Wire the scheduling service (lifecycle + availability resolver)
        let appointment_repo = SqliteAppointmentRepository::new(db_pool.clone());
        let availability = SqliteAvailabilitySource::new(db_pool.clone());
        let appointments =
            AppointmentService::new(appointment_repo.clone(), availability, config.clone());

        // Wire the message store; it shares the appointment repository for
        // party authorization.
        let message_repo = SqliteMessageRepository::new(db_pool.clone());
        let messages = MessageService::new(message_repo, appointment_repo, &config);

        Ok(Self {
            appointments: Arc::new(appointments),
            messages: Arc::new(messages),
            rooms: Arc::new(RoomRegistry::new(ROOM_CAPACITY)),
            config,
            data_dir,
            db_pool,
        })
    }
}
