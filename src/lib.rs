// Library root
// -----------
// This crate exposes a small library surface for the admin console. The
// binary (`main.rs`) wires these modules into the interactive loop.
//
// Module responsibilities:
// - `config`: Startup settings (database URL, API base URL) from an
//   optional TOML file plus environment overrides.
// - `api`: Blocking HTTP session against the backend (login lifecycle,
//   bearer token, config browsing) and the `{"data": ...}` envelope.
// - `store`: Parameter-bound CRUD gateway over the `users` table.
// - `command`: The menu command table and input-token parser.
// - `ui`: Terminal flows; prompts the operator and delegates to `api`
//   and `store`.
// - `render`: Tables, colors and screen control for the console output.
//
// Keeping this separation makes the API and store logic testable
// without a terminal attached.
pub mod api;
pub mod command;
pub mod config;
pub mod render;
pub mod store;
pub mod ui;
