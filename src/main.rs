//! Binary entry point: load configuration, bring up logging and the SQLite
//! store, then drive the Ratatui event loop until the user exits.
use chordbook::{logging, run_app, App, Config, ConfiguredIdentity, SqliteStore};
use tracing::info;

fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    let data_dir = config.data_dir()?;
    let log_path = logging::init(&data_dir, &config.log_level)?;

    let store = SqliteStore::open(&config.database_path()?)?;
    let user = config.user();
    if let Some(user) = &user {
        store.ensure_user(user)?;
    }
    info!(log = %log_path.display(), signed_in = user.is_some(), "starting chordbook");

    let identity = ConfiguredIdentity::new(user);
    let mut app = App::new(store, Box::new(identity), config.drag_threshold)?;
    run_app(&mut app)
}
