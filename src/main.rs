//! Binary entry point: load config, start logging, open the database, make
//! sure an admin exists, then hand the terminal to the UI.
use anyhow::Context;
use library_manager::{logging, run_app, seed_default_admin, App, AppConfig, Database};
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    config.validate()?;
    logging::init(&config)?;
    info!(version = env!("CARGO_PKG_VERSION"), "Library Manager starting");
    config.log_source();

    let db = Database::open(config.database_target()?);
    if !db.test_connection() {
        error!(target_db = ?db.target(), "Could not open the database");
        anyhow::bail!(
            "could not open the database ({:?}), see the log for details",
            db.target()
        );
    }

    db.with_conn(|conn| {
        seed_default_admin(
            conn,
            &config.bootstrap.admin_username,
            &config.bootstrap.admin_password,
        )
    })
    .context("failed to prepare the admin account")?;

    let mut app = App::new(db.clone());
    let result = run_app(&mut app);
    db.close();
    info!("Library Manager stopped");
    result
}
