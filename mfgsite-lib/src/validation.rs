use std::str::FromStr;

use email_address::EmailAddress;

pub const MIN_PASSWORD_CHARS: usize = 8;
pub const MAX_PASSWORD_CHARS: usize = 512;
pub const MAX_NAME_CHARS: usize = 64;

pub fn check_control_leading_trailing<G>(
    given: G,
    max_chars: Option<usize>
) -> bool
where
    G: AsRef<str>
{
    let given_ref = given.as_ref();
    let mut iter = given_ref.chars();
    let mut char_count = 0;

    if let Some(ch) = iter.next() {
        char_count += 1;

        if ch.is_control() || ch.is_whitespace() {
            return false
        }
    }

    // check for trailing whitespace/control
    if let Some(ch) = iter.next_back() {
        char_count += 1;

        if ch.is_control() || ch.is_whitespace() {
            return false
        }
    }

    for ch in iter {
        if ch.is_control() {
            return false;
        }

        char_count += 1;
    }

    if let Some(max_chars) = max_chars {
        char_count <= max_chars
    } else {
        true
    }
}

pub fn password_valid<G>(given: G) -> bool
where
    G: AsRef<str>
{
    let mut char_count = 0;

    for ch in given.as_ref().chars() {
        if ch.is_control() {
            return false;
        }

        char_count += 1;

        if char_count > MAX_PASSWORD_CHARS {
            return false;
        }
    }

    char_count >= MIN_PASSWORD_CHARS
}

pub fn name_valid<G>(given: G) -> bool
where
    G: AsRef<str>
{
    let given_ref = given.as_ref();

    !given_ref.is_empty() && check_control_leading_trailing(given_ref, Some(MAX_NAME_CHARS))
}

pub fn email_valid<G>(given: G) -> bool
where
    G: AsRef<str>
{
    EmailAddress::from_str(given.as_ref()).is_ok()
}
