// Command table for the interactive menu. A tagged enum instead of a
// map of numeric strings to closures, so the dispatcher match is
// checked for exhaustiveness at compile time.

/// One menu command. Numeric codes 1–10 in menu order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Menu,
    AddUser,
    ViewUsers,
    DeleteUser,
    PromoteUser,
    ChangeLimit,
    RenameUser,
    ChangePassword,
    BanUser,
    ViewConfigs,
}

/// What one line of operator input means to the console loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// A recognized menu command.
    Command(Command),
    /// `cls`: redraw the menu, nothing else changes.
    Clear,
    /// `0`, `q`, `exit` or `quit` (case-insensitive): leave the console.
    Quit,
    /// Anything else: report and stay idle.
    Unknown,
}

impl Command {
    /// All commands in menu order; index + 1 is the numeric code.
    pub const ALL: [Command; 10] = [
        Command::Menu,
        Command::AddUser,
        Command::ViewUsers,
        Command::DeleteUser,
        Command::PromoteUser,
        Command::ChangeLimit,
        Command::RenameUser,
        Command::ChangePassword,
        Command::BanUser,
        Command::ViewConfigs,
    ];

    /// Menu label shown next to the numeric code.
    pub fn label(&self) -> &'static str {
        match self {
            Command::Menu => "show menu",
            Command::AddUser => "add user",
            Command::ViewUsers => "view users",
            Command::DeleteUser => "delete user",
            Command::PromoteUser => "promote/demote",
            Command::ChangeLimit => "change quota",
            Command::RenameUser => "rename account",
            Command::ChangePassword => "change password",
            Command::BanUser => "ban/unban",
            Command::ViewConfigs => "view configs",
        }
    }
}

impl Token {
    /// Parse one line of operator input. Whitespace is trimmed; the
    /// reserved quit tokens match case-insensitively, `cls` and the
    /// numeric codes must match exactly.
    pub fn parse(input: &str) -> Token {
        let input = input.trim();
        if matches!(
            input.to_ascii_lowercase().as_str(),
            "0" | "q" | "exit" | "quit"
        ) {
            return Token::Quit;
        }
        if input == "cls" {
            return Token::Clear;
        }
        let command = match input {
            "1" => Command::Menu,
            "2" => Command::AddUser,
            "3" => Command::ViewUsers,
            "4" => Command::DeleteUser,
            "5" => Command::PromoteUser,
            "6" => Command::ChangeLimit,
            "7" => Command::RenameUser,
            "8" => Command::ChangePassword,
            "9" => Command::BanUser,
            "10" => Command::ViewConfigs,
            _ => return Token::Unknown,
        };
        Token::Command(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_codes_map_in_menu_order() {
        for (index, command) in Command::ALL.iter().enumerate() {
            let code = (index + 1).to_string();
            assert_eq!(Token::parse(&code), Token::Command(*command));
        }
    }

    #[test]
    fn quit_tokens_are_case_insensitive() {
        for token in ["0", "q", "Q", "exit", "EXIT", "quit", "Quit"] {
            assert_eq!(Token::parse(token), Token::Quit);
        }
    }

    #[test]
    fn clear_token_redraws() {
        assert_eq!(Token::parse("cls"), Token::Clear);
        assert_eq!(Token::parse(" cls "), Token::Clear);
    }

    #[test]
    fn clear_token_is_lowercase_only() {
        assert_eq!(Token::parse("CLS"), Token::Unknown);
        assert_eq!(Token::parse("Cls"), Token::Unknown);
    }

    #[test]
    fn junk_is_unknown() {
        for junk in ["", "11", "abc", "1.5", "-1", "clear"] {
            assert_eq!(Token::parse(junk), Token::Unknown);
        }
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(Token::parse("  3 "), Token::Command(Command::ViewUsers));
    }
}
