//! Input rules for account credentials.

pub const USERNAME_LEN: std::ops::RangeInclusive<usize> = 4..=64;
pub const PASSWORD_LEN: std::ops::RangeInclusive<usize> = 8..=64;

const PASSWORD_SPECIALS: &str = "_!@#$%&*^.";

/// Letters, digits and underscores, starting with a letter.
pub fn is_valid_username(username: &str) -> bool {
    let mut chars = username.chars();
    USERNAME_LEN.contains(&username.len())
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn is_valid_password(password: &str) -> bool {
    PASSWORD_LEN.contains(&password.len())
        && password
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SPECIALS.contains(c))
}
