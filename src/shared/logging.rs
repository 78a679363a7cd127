use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking;
use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn can_write_logs(log_dir: &Path) -> bool {
    let probe = log_dir.join(".test_write");
    std::fs::create_dir_all(log_dir)
        .and_then(|_| std::fs::File::create(&probe))
        .map(|_| std::fs::remove_file(&probe))
        .is_ok()
}

// Guards are leaked: the writers must stay alive for the whole process
fn file_writer(log_dir: &Path, service_name: &str) -> NonBlocking {
    let _ = rotate_logs_on_startup(log_dir, service_name);
    let (writer, guard) = non_blocking(rolling::daily(log_dir, format!("{service_name}.log")));
    std::mem::forget(guard);
    writer
}

fn stdout_writer() -> NonBlocking {
    let (writer, guard) = non_blocking(std::io::stdout());
    std::mem::forget(guard);
    writer
}

fn file_layer(writer: NonBlocking) -> BoxedLayer {
    fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .boxed()
}

fn console_layer(writer: NonBlocking) -> BoxedLayer {
    fmt::layer()
        .with_writer(writer)
        .with_ansi(true)
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .boxed()
}

/// File plus console logging for the HTTP server. Falls back to console only
/// when the log directory cannot be written.
pub fn init_service_logging(log_dir: &Path, service_name: &str) -> Result<(), anyhow::Error> {
    let mut layers = vec![console_layer(stdout_writer())];
    let to_file = can_write_logs(log_dir);
    if to_file {
        layers.push(file_layer(file_writer(log_dir, service_name)));
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter("info"))
        .try_init()?;

    if to_file {
        info!(
            "Logging initialized - logs will be written to {}/{service_name}.log",
            log_dir.display()
        );
    } else {
        info!("Logging initialized - console output only (could not create log directory)");
    }
    Ok(())
}

/// Logging for the interactive CLI. Nothing goes to stdout, so log lines never
/// interleave with the prompt; without a writable log directory only warnings
/// reach stderr.
pub fn init_cli_logging(log_dir: &Path, service_name: &str) -> Result<(), anyhow::Error> {
    if can_write_logs(log_dir) {
        tracing_subscriber::registry()
            .with(file_layer(file_writer(log_dir, service_name)))
            .with(env_filter("info"))
            .try_init()?;
    } else {
        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false);
        tracing_subscriber::registry()
            .with(stderr_layer)
            .with(env_filter("warn"))
            .try_init()?;
    }
    Ok(())
}

pub fn rotate_logs_on_startup(log_dir: &Path, service_name: &str) -> Result<(), anyhow::Error> {
    let log_path = log_dir.join(format!("{service_name}.log"));

    if log_path.exists() {
        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let backup_path = log_dir.join(format!("{service_name}.{timestamp}.log"));

        std::fs::rename(&log_path, &backup_path)?;
        info!("Previous log file backed up to: {}", backup_path.display());
    }

    Ok(())
}
