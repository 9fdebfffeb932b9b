use log::{Level, LevelFilter, Log, Metadata, Record};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use perfectial_core::db::Database;
use perfectial_core::dto::UserDto;
use perfectial_core::service::{ServiceOutcome, Services};

struct CapturingLogger {
    lines: Mutex<Vec<(Level, String)>>,
}

impl Log for CapturingLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        self.lines
            .lock()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

static LOGGER: CapturingLogger = CapturingLogger {
    lines: Mutex::new(Vec::new()),
};

static INSTALLED: Lazy<()> = Lazy::new(|| {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Trace);
});

fn captured(level: Level, fragments: &[&str]) -> Vec<String> {
    LOGGER
        .lines
        .lock()
        .iter()
        .filter(|(line_level, line)| {
            *line_level == level && fragments.iter().all(|fragment| line.contains(fragment))
        })
        .map(|(_, line)| line.clone())
        .collect()
}

fn services() -> (tempfile::TempDir, Services) {
    Lazy::force(&INSTALLED);
    let dir = tempfile::tempdir().unwrap();
    let database = Database::open(dir.path().join("logging.sqlite3")).unwrap();
    (dir, Services::new(database).unwrap())
}

#[tokio::test]
async fn saving_a_missing_user_logs_a_not_found_warning() {
    let (_dir, services) = services();
    let mut dto = UserDto::new("ghost", "ghost@example.com");
    dto.id = 404;

    let outcome = services.users.save_user(dto).await.unwrap();
    assert_eq!(outcome, ServiceOutcome::NotFound(404));

    let lines = captured(
        Level::Warn,
        &["event=user_save", "status=not_found", "user_id=404"],
    );
    assert_eq!(lines.len(), 1, "{lines:?}");
}

#[tokio::test]
async fn rejected_credit_score_logs_a_validation_warning() {
    let (_dir, services) = services();

    let outcome = services.users.set_credit_score(505, 2_000).await.unwrap();
    assert!(matches!(outcome, ServiceOutcome::ValidationFailed(_)));

    let lines = captured(
        Level::Warn,
        &["event=user_credit_score", "status=invalid", "user_id=505"],
    );
    assert_eq!(lines.len(), 1, "{lines:?}");
}
