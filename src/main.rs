//! Binary entry point: resolve paths and config, start logging, open the
//! store, then hand the terminal to the TUI until the user exits.
use anyhow::Context;
use setlist_manager::{
    ensure_user, init_logging, open_database, run_app, App, AppPaths, Config, Session,
};
use tracing::info;

fn main() -> anyhow::Result<()> {
    let paths = AppPaths::detect().context("failed to resolve application directories")?;
    let config = Config::load(&paths).context("failed to load configuration")?;
    init_logging(&paths.log_file(), &config.logging.filter)?;

    let db_path = config.database_path(&paths);
    let conn = open_database(&db_path, config.busy_timeout())?;
    info!(path = %db_path.display(), "opened setlist database");

    let user = ensure_user(&conn, &config.user.username, &config.user.email())?;

    let mut app = App::new(conn, Session::new(user), config.setlists.duplicate_songs)?;
    run_app(&mut app)
}
