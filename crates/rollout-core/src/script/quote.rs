//! POSIX shell quoting for rendered commands.

fn is_safe(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(c, '_' | '-' | '.' | '/' | ':' | '=' | '@' | '+' | ',' | '%')
}

/// Quote a word for a POSIX shell.
///
/// Words made only of safe characters are returned unchanged so the common
/// commands render exactly as typed (`git pull origin main`).
pub fn shell_quote(word: &str) -> String {
    if word.is_empty() {
        return "''".to_string();
    }
    if word.chars().all(is_safe) {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', r"'\''"))
}

/// Quote a path, leaving a leading `~/` for the remote shell to expand.
pub fn quote_path(path: &str) -> String {
    if path == "~" {
        return path.to_string();
    }
    match path.strip_prefix("~/") {
        Some("") => "~/".to_string(),
        Some(rest) => format!("~/{}", shell_quote(rest)),
        None => shell_quote(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_words_are_untouched() {
        assert_eq!(shell_quote("requirements.txt"), "requirements.txt");
        assert_eq!(shell_quote("/srv/placement-bot"), "/srv/placement-bot");
        assert_eq!(shell_quote("-d"), "-d");
    }

    #[test]
    fn unsafe_words_are_single_quoted() {
        assert_eq!(shell_quote("my app.py"), "'my app.py'");
        assert_eq!(shell_quote("$(reboot)"), "'$(reboot)'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn home_prefix_stays_expandable() {
        assert_eq!(quote_path("~/placement-bot"), "~/placement-bot");
        assert_eq!(quote_path("~/my bot"), "~/'my bot'");
        assert_eq!(quote_path("~"), "~");
        assert_eq!(quote_path("/opt/my bot"), "'/opt/my bot'");
        // only a leading tilde directory is special
        assert_eq!(quote_path("/srv/~bot"), "'/srv/~bot'");
    }
}
