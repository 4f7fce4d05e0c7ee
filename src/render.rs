// Render module: everything the console prints that is more than a
// bare line: the menu, the user table, numbered name listings and
// config key/value dumps. Kept apart from the flows in `ui` so the
// table shapes can be asserted in tests.

use crate::command::Command;
use crate::store::User;
use crossterm::cursor::MoveTo;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use serde_json::{Map, Value};
use tabled::builder::Builder;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct UserRow {
    #[tabled(rename = "account")]
    account: String,
    #[tabled(rename = "quota")]
    quota: i64,
    #[tabled(rename = "role")]
    role: &'static str,
    #[tabled(rename = "status")]
    status: &'static str,
}

/// Role label for the `is_admin` flag.
pub fn role_label(is_admin: bool) -> &'static str {
    if is_admin {
        "admin"
    } else {
        "user"
    }
}

/// Status label for the `is_disabled` flag.
pub fn status_label(is_disabled: bool) -> &'static str {
    if is_disabled {
        "banned"
    } else {
        "active"
    }
}

/// A `System:`-prefixed line, the console's voice for every outcome.
pub fn system(msg: impl AsRef<str>) {
    println!("{}{}", "System: ".blue(), msg.as_ref());
}

/// Clear the terminal. Failures are ignored; a console that cannot
/// clear the screen still works.
pub fn clear_screen() {
    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(stdout, Clear(ClearType::All), MoveTo(0, 0));
}

/// The numbered command menu plus the reserved tokens.
pub fn menu() {
    println!("{}", format!("{:-^44}", " user management ").yellow());
    for (index, command) in Command::ALL.iter().enumerate() {
        print!("{:>3} {:<18}", index + 1, command.label());
        if (index + 1) % 2 == 0 {
            println!();
        }
    }
    println!("{:^44}", "enter 0|q|exit|quit to leave");
    println!("{:^44}", "enter cls to clear the screen");
}

/// Grid of users with readable role/status labels.
pub fn user_table(users: &[User]) -> String {
    let rows: Vec<UserRow> = users
        .iter()
        .map(|user| UserRow {
            account: user.uname.clone(),
            quota: user.max_limit,
            role: role_label(user.is_admin),
            status: status_label(user.is_disabled),
        })
        .collect();
    Table::new(rows).with(Style::ascii()).to_string()
}

/// Numbered two-column grid; `header` names the second column.
pub fn numbered_table(header: &str, names: &[String]) -> String {
    let mut builder = Builder::default();
    builder.push_record(["#".to_string(), header.to_string()]);
    for (index, name) in names.iter().enumerate() {
        builder.push_record([index.to_string(), name.clone()]);
    }
    let mut table = builder.build();
    table.with(Style::ascii());
    table.to_string()
}

/// Key -> value dump of one config artifact. Nested values print as
/// compact JSON.
pub fn config_entries(entries: &Map<String, Value>) {
    for (key, value) in entries {
        let value = match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        println!("{} -> {}", key.as_str().blue(), value);
    }
}
