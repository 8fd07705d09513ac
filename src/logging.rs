//! Tracing subscriber setup.
//!
//! Console output follows `RUST_LOG` (or the default filter); a second,
//! append-only file sink receives ERROR events only.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config;

fn console_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            config::verbose_log_filter()
        } else {
            config::default_log_filter()
        })
    })
}

fn open_error_log(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber. `error_log` of `None` (or an empty path)
/// disables the file sink.
///
/// An error log that cannot be opened does not prevent console logging:
/// the subscriber is installed without the file sink and the failure is
/// logged once it is up. Only a second installation is an error.
pub fn init_tracing(verbose: bool, error_log: Option<&Path>) -> io::Result<()> {
    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(console_filter(verbose));

    let (file_layer, file_error) = match error_log.filter(|p| !p.as_os_str().is_empty()) {
        Some(path) => match open_error_log(path) {
            Ok(file) => (
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file))
                        .with_filter(LevelFilter::ERROR),
                ),
                None,
            ),
            Err(e) => (None, Some((path, e))),
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(io::Error::other)?;

    if let Some((path, e)) = file_error {
        tracing::error!(
            path = %path.display(),
            error = %e,
            "Cannot open error log, errors go to the console only"
        );
    }
    Ok(())
}
