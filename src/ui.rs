// UI layer: the interactive session. A login loop first, then the
// read-dispatch loop over the numbered menu using `dialoguer` prompts.
// Every handler resolves its own failures to a printed `System:` line;
// nothing a handler does can take the loop down.

use crate::api::ApiClient;
use crate::command::{Command, Token};
use crate::render;
use crate::store::{Store, User};
use anyhow::Result;
use dialoguer::{Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::warn;

/// Run the console: authenticate, then dispatch commands until the
/// operator leaves. This call blocks for the whole session.
pub fn run(mut api: ApiClient, store: Store) -> Result<()> {
    render::clear_screen();
    if !login_loop(&mut api)? {
        // Blank credentials are an operator abort, not an error.
        return Ok(());
    }
    render::menu();
    loop {
        let line: String = Input::new()
            .with_prompt(">>>")
            .allow_empty(true)
            .interact_text()?;
        match Token::parse(&line) {
            Token::Quit => {
                render::system("leaving the console...");
                break;
            }
            Token::Clear => {
                render::clear_screen();
                render::menu();
            }
            Token::Unknown => render::system("that option is not recognized"),
            Token::Command(command) => {
                if let Err(err) = dispatch(command, &mut api, &store) {
                    warn!(error = %err, "command failed");
                    render::system(format!("{err:#}"));
                }
                println!();
            }
        }
    }
    Ok(())
}

/// Prompt for credentials until a login succeeds. Returns false when
/// the operator aborts by leaving the account or password blank.
fn login_loop(api: &mut ApiClient) -> Result<bool> {
    loop {
        let username = prompt("admin account")?;
        if username.is_empty() {
            return Ok(false);
        }
        let password = prompt_password("admin password")?;
        if password.is_empty() {
            return Ok(false);
        }
        render::clear_screen();
        let busy = spinner("logging in...");
        let (success, msg) = api.login(&username, &password);
        busy.finish_and_clear();
        render::system(&msg);
        if success {
            return Ok(true);
        }
    }
}

fn dispatch(command: Command, api: &mut ApiClient, store: &Store) -> Result<()> {
    match command {
        Command::Menu => {
            render::menu();
            Ok(())
        }
        Command::AddUser => add_user(api),
        Command::ViewUsers => view_users(store),
        Command::DeleteUser => delete_user(store),
        Command::PromoteUser => promote_user(store),
        Command::ChangeLimit => change_limit(store),
        Command::RenameUser => rename_user(store),
        Command::ChangePassword => change_password(api),
        Command::BanUser => ban_user(store),
        Command::ViewConfigs => view_configs(api),
    }
}

/// Collect fields for a new user and trigger registration through the
/// backend. The database row appears as a side effect of the API call.
fn add_user(api: &ApiClient) -> Result<()> {
    let uname = prompt("set account")?;
    let upwd = prompt_password("set password")?;
    let max_limit: i64 = Input::new().with_prompt("set quota").interact_text()?;

    if uname.is_empty() || upwd.is_empty() {
        render::system("account and password must not be blank");
        return Ok(());
    }
    if max_limit < 0 {
        render::system("quota must not be negative");
        return Ok(());
    }
    if !confirm(format!("create user `{uname}`? [Y/n]"))? {
        return Ok(());
    }

    let busy = spinner("registering...");
    let msg = api.register(&uname, &upwd, max_limit);
    busy.finish_and_clear();
    render::system(msg?);
    Ok(())
}

fn view_users(store: &Store) -> Result<()> {
    let filter = prompt("account to look up (blank for all)")?;
    let filter = if filter.is_empty() {
        None
    } else {
        Some(filter.as_str())
    };
    let users = store.list_users(filter)?;
    if users.is_empty() {
        render::system("no matching users");
        return Ok(());
    }
    println!("{}", render::user_table(&users));
    Ok(())
}

fn delete_user(store: &Store) -> Result<()> {
    let uname = prompt("account to delete")?;
    let Some(user) = store.find_user(&uname)? else {
        render::system(format!("user {uname} does not exist"));
        return Ok(());
    };
    let proceed = confirm(format!("really delete user `{}`? [Y/n]", user.uname))?;
    if delete_confirmed(store, &user, proceed)? {
        render::system(format!("deleted user `{}`", user.uname));
    }
    Ok(())
}

fn delete_confirmed(store: &Store, user: &User, proceed: bool) -> Result<bool> {
    if !proceed {
        return Ok(false);
    }
    store.delete_user(&user.uname)?;
    Ok(true)
}

fn promote_user(store: &Store) -> Result<()> {
    let uname = prompt("account to promote or demote")?;
    let Some(user) = store.find_user(&uname)? else {
        render::system(format!("user {uname} does not exist"));
        return Ok(());
    };
    let target = render::role_label(!user.is_admin);
    let proceed = confirm(format!("change user {} to {target}? [Y/n]", user.uname))?;
    if promote_confirmed(store, &user, proceed)? {
        render::system(format!("user {} is now {target}", user.uname));
    }
    Ok(())
}

fn promote_confirmed(store: &Store, user: &User, proceed: bool) -> Result<bool> {
    if !proceed {
        return Ok(false);
    }
    store.set_admin(&user.uname, !user.is_admin)?;
    Ok(true)
}

fn change_limit(store: &Store) -> Result<()> {
    let uname = prompt("account to change the quota for")?;
    let new_limit: i64 = Input::new().with_prompt("new quota").interact_text()?;
    if new_limit < 0 {
        render::system("quota must not be negative");
        return Ok(());
    }
    let Some(user) = store.find_user(&uname)? else {
        render::system(format!("user {uname} does not exist"));
        return Ok(());
    };
    let proceed = confirm(format!("set the quota of {} to {new_limit}? [Y/n]", user.uname))?;
    if change_limit_confirmed(store, &user, new_limit, proceed)? {
        render::system(format!("quota for {} is now {new_limit}", user.uname));
    }
    Ok(())
}

fn change_limit_confirmed(
    store: &Store,
    user: &User,
    new_limit: i64,
    proceed: bool,
) -> Result<bool> {
    if !proceed {
        return Ok(false);
    }
    store.set_limit(&user.uname, new_limit)?;
    Ok(true)
}

fn rename_user(store: &Store) -> Result<()> {
    let uname = prompt("account to rename")?;
    let new_uname = prompt("new account name")?;
    if new_uname.is_empty() {
        render::system("the new account name must not be blank");
        return Ok(());
    }
    let Some(user) = store.find_user(&uname)? else {
        render::system(format!("user {uname} does not exist"));
        return Ok(());
    };
    store.rename(&user.uname, &new_uname)?;
    render::system(format!("account {} is now {new_uname}", user.uname));
    Ok(())
}

/// Password changes go through the backend so it can re-hash; this is
/// a bearer-gated endpoint, so refuse up front without a session.
fn change_password(api: &ApiClient) -> Result<()> {
    if !api.has_token() {
        render::system("no permission for this operation");
        return Ok(());
    }
    let uname = prompt("account to change the password for")?;
    let upwd = prompt_password("new password")?;
    if uname.is_empty() || upwd.is_empty() {
        render::system("account and password must not be blank");
        return Ok(());
    }
    let busy = spinner("updating password...");
    let msg = api.change_password(&uname, &upwd);
    busy.finish_and_clear();
    render::system(msg?);
    Ok(())
}

fn ban_user(store: &Store) -> Result<()> {
    let uname = prompt("account to ban or unban")?;
    let Some(user) = store.find_user(&uname)? else {
        render::system(format!("user {uname} does not exist"));
        return Ok(());
    };
    let action = if user.is_disabled { "unban" } else { "ban" };
    let proceed = confirm(format!("{action} user {}? [Y/n]", user.uname))?;
    if ban_confirmed(store, &user, proceed)? {
        let done = if user.is_disabled { "unbanned" } else { "banned" };
        render::system(format!("{done} user {}", user.uname));
    }
    Ok(())
}

fn ban_confirmed(store: &Store, user: &User, proceed: bool) -> Result<bool> {
    if !proceed {
        return Ok(false);
    }
    store.set_disabled(&user.uname, !user.is_disabled)?;
    Ok(true)
}

/// Browse the config artifacts the backend stores per user: pick a
/// user, pick one of their crawler configs, dump its key/value pairs.
/// Read-only; every level re-fetches from the backend.
fn view_configs(api: &ApiClient) -> Result<()> {
    if !api.has_token() {
        render::system("no permission for this operation");
        return Ok(());
    }
    loop {
        if !confirm("browse the registered users? [Y/n]")? {
            return Ok(());
        }
        let busy = spinner("fetching users...");
        let users = api.list_users();
        busy.finish_and_clear();
        let users = users?;
        if users.is_empty() {
            render::system("no users to show");
            continue;
        }
        println!("{}", render::numbered_table("account", &users));

        let uname = prompt("whose configs? (account, blank to go back)")?;
        if uname.is_empty() {
            continue;
        }
        let busy = spinner("fetching config names...");
        let configs = api.list_configs(&uname);
        busy.finish_and_clear();
        let configs = configs?;
        if configs.is_empty() {
            render::system(format!("no configs found for {uname}"));
            continue;
        }
        println!("{}", render::numbered_table("config", &configs));

        let spider_name = prompt("which crawler config? (name, blank to go back)")?;
        if spider_name.is_empty() {
            continue;
        }
        let busy = spinner("fetching the config...");
        let artifact = api.get_config(&uname, &spider_name);
        busy.finish_and_clear();
        render::config_entries(&artifact?);
    }
}

/// Visible line prompt. Accounts must never contain spaces, so any the
/// operator types are stripped, matching the registration rules.
fn prompt(label: &str) -> Result<String> {
    let value: String = Input::new()
        .with_prompt(label)
        .allow_empty(true)
        .interact_text()?;
    Ok(value.replace(' ', ""))
}

/// Hidden line prompt for passwords.
fn prompt_password(label: &str) -> Result<String> {
    let value = Password::new()
        .with_prompt(label)
        .allow_empty_password(true)
        .interact()?;
    Ok(value.replace(' ', ""))
}

/// Yes/no confirmation read as a plain line so the default applies to
/// whatever the operator types: anything but an explicit "n" proceeds.
fn confirm(question: impl Into<String>) -> Result<bool> {
    let answer: String = Input::new()
        .with_prompt(question)
        .allow_empty(true)
        .interact_text()?;
    Ok(answer_is_yes(&answer))
}

fn answer_is_yes(answer: &str) -> bool {
    !answer.trim().eq_ignore_ascii_case("n")
}

/// Spinner shown while a blocking round trip is in flight.
fn spinner(msg: &'static str) -> ProgressBar {
    let busy = ProgressBar::new_spinner();
    busy.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
    busy.set_message(msg);
    busy.enable_steady_tick(Duration::from_millis(80));
    busy
}
