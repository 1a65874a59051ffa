#![cfg_attr(windows, windows_subsystem = "windows")]
// Windows-only implementation lives in src/windows_main.rs
#[cfg(windows)]
mod windows_main;

#[cfg(windows)]
fn init_logging() {
    // Rolling daily log under the per-user data dir; silently skipped when
    // the paths cannot be resolved.
    let Ok((_, paths)) = zdesk::config::load_or_default() else {
        return;
    };
    std::fs::create_dir_all(&paths.log_dir).ok();
    let appender = tracing_appender::rolling::daily(&paths.log_dir, "zdeskmon.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    std::mem::forget(guard); // keep the writer alive for the process lifetime
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .try_init();
}

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    init_logging();
    tracing::info!("zdeskmon starting");
    windows_main::main()
}

// Non-Windows stub builds cleanly and informs the user.
#[cfg(not(windows))]
fn main() {
    println!("zdeskmon is Windows-only. Build on Windows to run.");
}
