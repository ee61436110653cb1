use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Logs go to stderr so that commands printing JSON keep stdout clean.
pub(crate) fn init(level: Level) {
    let ansi = console::Term::stderr().features().colors_supported();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok(); // Already set in tests
}
