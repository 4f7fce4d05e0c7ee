// Entrypoint for the admin console.
// - Keeps `main` small: load settings, build the API client and the
//   users store, hand both to the UI loop.
// - Logging goes to stderr via `RUST_LOG` so it never interleaves with
//   the interactive surface on stdout.

use spider_admin::{api::ApiClient, config::Settings, store::Store, ui};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::load()?;
    let api = ApiClient::new(&settings.base_api)?;
    let store = Store::connect(&settings.database_url)?;

    // Start the interactive session. This call blocks until the
    // operator exits.
    ui::run(api, store)
}
