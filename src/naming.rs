// Container naming rules.
//
// A container name is 3 to 63 characters of lowercase letters, digits and
// dashes. It starts and ends with a letter or digit, and every dash sits
// between two letters or digits, so `my--container` is refused.

use thiserror::Error;

pub const MIN_LEN: usize = 3;
pub const MAX_LEN: usize = 63;

/// Human readable rules, printed before asking for a new name.
pub const RULES: &str = "\t 3 to 63 Characters\n\
                         \t Starts With Letter or Number\n\
                         \t Contains Letters, Numbers, and Dash (-)\n\
                         \t All letters must be lowercase\n\
                         \t Every Dash (-) Must Be Immediately Preceded and Followed by a Letter or Number\n";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContainerNameError {
    #[error("name must be 3 to 63 characters long (got {0})")]
    Length(usize),

    #[error("name must start with a lowercase letter or number")]
    BadFirst,

    #[error("name must end with a lowercase letter or number")]
    BadLast,

    #[error("'{0}' is not allowed; use lowercase letters, numbers and dashes")]
    BadChar(char),

    #[error("every dash must be preceded and followed by a letter or number")]
    ConsecutiveDashes,
}

fn is_alnum(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit()
}

/// Check `name` against the container naming rules.
pub fn validate_container_name(name: &str) -> Result<(), ContainerNameError> {
    let chars: Vec<char> = name.chars().collect();
    if !(MIN_LEN..=MAX_LEN).contains(&chars.len()) {
        return Err(ContainerNameError::Length(chars.len()));
    }

    if let Some(bad) = chars.iter().copied().find(|c| !is_alnum(*c) && *c != '-') {
        return Err(ContainerNameError::BadChar(bad));
    }
    if !is_alnum(chars[0]) {
        return Err(ContainerNameError::BadFirst);
    }
    if !is_alnum(chars[chars.len() - 1]) {
        return Err(ContainerNameError::BadLast);
    }
    if chars.windows(2).any(|w| w[0] == '-' && w[1] == '-') {
        return Err(ContainerNameError::ConsecutiveDashes);
    }
    Ok(())
}
