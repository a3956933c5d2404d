use ember_renderer::{App, Config};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() {
    // Load configuration from config.toml
    let config = Config::load();

    init_logging(&config);
    log::info!("Starting Ember renderer");
    log::info!("Present mode: {}", config.graphics.present_mode);

    let result = App::new(config).and_then(|mut app| app.run());
    if let Err(e) = result {
        log::error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

/// Initialize logging, copying every record to the log file when enabled
fn init_logging(config: &Config) {
    use env_logger::{Builder, Target};
    use log::LevelFilter;

    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Info);
    // RUST_LOG overrides the default level
    builder.parse_default_env();

    let mut file_error = None;
    if config.debug.log_to_file {
        match open_log_file(Path::new(&config.debug.log_file)) {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(StderrAndFile { file })));
            }
            Err(e) => file_error = Some(e),
        }
    }

    builder.init();

    if let Some(e) = file_error {
        log::warn!("Could not open log file {}: {}", config.debug.log_file, e);
    }
}

/// Create or truncate the log file and write its header
fn open_log_file(path: &Path) -> io::Result<File> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;

    writeln!(file, "=== Ember Renderer Log ===")?;
    writeln!(file, "Started: {:?}", std::time::SystemTime::now())?;
    writeln!(file)?;
    Ok(file)
}

/// Log target that keeps console output and appends to the log file
struct StderrAndFile<W: Write> {
    file: W,
}

impl<W: Write> Write for StderrAndFile<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // A broken console must not stop the file from receiving records
        let _ = io::stderr().write_all(buf);
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = io::stderr().flush();
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_log_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("ember_{}_{}.log", name, std::process::id()))
    }

    #[test]
    fn log_file_starts_with_header_and_replaces_old_content() {
        let path = temp_log_path("header");
        fs::write(&path, "stale output from an earlier run\n").unwrap();

        drop(open_log_file(&path).unwrap());

        let contents = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert!(contents.starts_with("=== Ember Renderer Log ===\n"));
        assert!(!contents.contains("stale output"));
    }

    #[test]
    fn records_written_to_the_target_reach_the_log_file() {
        let path = temp_log_path("records");
        let file = open_log_file(&path).unwrap();

        let mut target = StderrAndFile { file };
        writeln!(target, "[INFO  ember_renderer] Swapchain created: 800x600").unwrap();
        target.flush().unwrap();
        drop(target);

        let contents = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert!(contents.starts_with("=== Ember Renderer Log ==="));
        assert!(contents.ends_with("Swapchain created: 800x600\n"));
    }

    #[test]
    fn unopenable_log_path_is_an_error() {
        let path = temp_log_path("missing_dir").join("renderer.log");
        assert!(open_log_file(&path).is_err());
    }
}
