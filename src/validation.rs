//! Stateless input checks shared by the dialogs and the persistence layer.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::{LibraryError, Result};
use crate::models::{BookInput, StaffInput};

pub const MIN_ISBN_LENGTH: usize = 10;
pub const MAX_ISBN_LENGTH: usize = 13;
pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_TITLE_LENGTH: usize = 255;
pub const MIN_PHONE_LENGTH: usize = 10;

fn get_regex(re: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    re.get_or_init(|| Regex::new(pattern).expect("Invalid regex pattern defined in code"))
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(&RE, r"^[A-Za-z0-9+_.-]+@(.+)$")
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(&RE, r"^[0-9\-+()\s]+$")
}

fn username_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(&RE, r"^[a-zA-Z0-9_]{3,30}$")
}

fn isbn_separator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(&RE, r"[\s-]")
}

fn whitespace_run_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(&RE, r"\s+")
}

pub fn is_not_empty(value: &str) -> bool {
    !value.trim().is_empty()
}

pub fn is_valid_email(email: &str) -> bool {
    is_not_empty(email) && email_regex().is_match(email)
}

/// Phone numbers are optional: a blank value passes.
pub fn is_valid_phone(phone: &str) -> bool {
    if !is_not_empty(phone) {
        return true;
    }
    phone_regex().is_match(phone) && phone.chars().count() >= MIN_PHONE_LENGTH
}

/// Drop spaces and hyphens so "978-0-441-01359-3" and "9780441013593" are
/// stored identically.
pub fn normalize_isbn(isbn: &str) -> String {
    isbn_separator_regex().replace_all(isbn, "").into_owned()
}

pub fn is_valid_isbn(isbn: &str) -> bool {
    if !is_not_empty(isbn) {
        return false;
    }
    let clean = normalize_isbn(isbn);
    let len = clean.chars().count();
    (MIN_ISBN_LENGTH..=MAX_ISBN_LENGTH).contains(&len) && clean.chars().all(|c| c.is_ascii_digit())
}

pub fn is_valid_password(password: &str) -> bool {
    is_not_empty(password) && password.chars().count() >= MIN_PASSWORD_LENGTH
}

pub fn is_valid_username(username: &str) -> bool {
    is_not_empty(username) && username_regex().is_match(username)
}

pub fn is_valid_number(value: &str) -> bool {
    is_not_empty(value) && value.parse::<i32>().is_ok()
}

pub fn is_non_negative_integer(value: &str) -> bool {
    value.parse::<i32>().map(|n| n >= 0).unwrap_or(false)
}

/// Trim and collapse internal whitespace runs to a single space.
pub fn sanitize_input(input: &str) -> String {
    whitespace_run_regex()
        .replace_all(input.trim(), " ")
        .into_owned()
}

/// Bounds are inclusive and measured on the trimmed value.
pub fn is_valid_length(value: &str, min: usize, max: usize) -> bool {
    let len = value.trim().chars().count();
    len >= min && len <= max
}

/// Full record check run before any book row is written.
pub fn validate_book(input: &BookInput) -> Result<()> {
    if !is_not_empty(&input.title) {
        return Err(LibraryError::validation("Title is required."));
    }
    if input.title.chars().count() > MAX_TITLE_LENGTH {
        return Err(LibraryError::validation(format!(
            "Title must be at most {MAX_TITLE_LENGTH} characters."
        )));
    }
    if !is_not_empty(&input.author) {
        return Err(LibraryError::validation("Author is required."));
    }
    if input.author.chars().count() > MAX_NAME_LENGTH {
        return Err(LibraryError::validation(format!(
            "Author must be at most {MAX_NAME_LENGTH} characters."
        )));
    }
    if !is_valid_isbn(&input.isbn) {
        return Err(LibraryError::validation(
            "Please enter a valid ISBN (10-13 digits).",
        ));
    }
    if input.quantity < 0 {
        return Err(LibraryError::validation("Quantity cannot be negative."));
    }
    Ok(())
}

/// Full record check run before any staff row is written. `today` is passed
/// in so hire dates can be checked without reading the clock here.
pub fn validate_staff(input: &StaffInput, today: NaiveDate) -> Result<()> {
    if !is_not_empty(&input.name) {
        return Err(LibraryError::validation("Name is required."));
    }
    if input.name.chars().count() > MAX_NAME_LENGTH {
        return Err(LibraryError::validation(format!(
            "Name must be at most {MAX_NAME_LENGTH} characters."
        )));
    }
    if !is_not_empty(&input.role) {
        return Err(LibraryError::validation("Role is required."));
    }
    if input.hire_date > today {
        return Err(LibraryError::validation(
            "Hire date cannot be in the future.",
        ));
    }
    if let Some(email) = input.email.as_deref().filter(|e| !e.is_empty()) {
        if !is_valid_email(email) {
            return Err(LibraryError::validation(
                "Please enter a valid email address.",
            ));
        }
    }
    if let Some(phone) = input.phone.as_deref().filter(|p| !p.is_empty()) {
        if !is_valid_phone(phone) {
            return Err(LibraryError::validation(
                "Please enter a valid phone number.",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StaffStatus;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn staff_input() -> StaffInput {
        StaffInput {
            name: "Ada Lovelace".into(),
            role: "Librarian".into(),
            hire_date: date(2020, 5, 1),
            email: Some("ada@example.org".into()),
            phone: Some("+1 (555) 010-2030".into()),
            status: StaffStatus::Active,
        }
    }

    #[test]
    fn isbn_accepts_ten_to_thirteen_digits() {
        for len in MIN_ISBN_LENGTH..=MAX_ISBN_LENGTH {
            let digits = "1234567890123"[..len].to_string();
            assert!(is_valid_isbn(&digits), "{digits} should be valid");
        }
        assert!(is_valid_isbn("978-0-441-01359-3"));
        assert!(is_valid_isbn("0 441 01359 7"));
    }

    #[test]
    fn isbn_rejects_wrong_length_or_characters() {
        assert!(!is_valid_isbn(""));
        assert!(!is_valid_isbn("   "));
        assert!(!is_valid_isbn("123456789"));
        assert!(!is_valid_isbn("12345678901234"));
        assert!(!is_valid_isbn("123456789X"));
        assert!(!is_valid_isbn("12345.67890"));
        assert!(!is_valid_isbn("----------"));
    }

    #[test]
    fn normalize_strips_separators() {
        assert_eq!(normalize_isbn(" 978-0 441-013593 "), "9780441013593");
    }

    #[test]
    fn email_and_phone_shapes() {
        assert!(is_valid_email("someone@library.org"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("bad space@x.org"));
        assert!(is_valid_phone(""));
        assert!(is_valid_phone("(555) 123-4567"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("555-CALL-NOW"));
    }

    #[test]
    fn username_and_password_rules() {
        assert!(is_valid_username("admin"));
        assert!(is_valid_username("head_librarian_01"));
        assert!(!is_valid_username("ab"));
        assert!(!is_valid_username("has space"));
        assert!(is_valid_password("admin123"));
        assert!(!is_valid_password("short"));
        assert!(!is_valid_password("      "));
    }

    #[test]
    fn numeric_helpers() {
        assert!(is_valid_number("-4"));
        assert!(!is_valid_number("4.5"));
        assert!(is_non_negative_integer("0"));
        assert!(!is_non_negative_integer("-1"));
        assert!(!is_non_negative_integer(""));
    }

    #[test]
    fn sanitize_collapses_whitespace() {
        assert_eq!(sanitize_input("  The   Left Hand \t of  Darkness "), "The Left Hand of Darkness");
        assert!(is_valid_length("  abc ", 3, 3));
        assert!(!is_valid_length("abcd", 1, 3));
    }

    #[test]
    fn book_validation_messages() {
        let mut input = BookInput {
            title: "Dune".into(),
            author: "Frank Herbert".into(),
            isbn: "9780441013593".into(),
            quantity: 0,
        };
        assert!(validate_book(&input).is_ok());

        input.quantity = -1;
        let err = validate_book(&input).unwrap_err();
        assert_eq!(err.to_string(), "Quantity cannot be negative.");

        input.quantity = 1;
        input.title = "x".repeat(MAX_TITLE_LENGTH + 1);
        assert!(validate_book(&input).is_err());
    }

    #[test]
    fn staff_validation_rejects_future_hire_date() {
        let today = date(2024, 6, 1);
        assert!(validate_staff(&staff_input(), today).is_ok());

        let mut input = staff_input();
        input.hire_date = date(2024, 6, 2);
        let err = validate_staff(&input, today).unwrap_err();
        assert_eq!(err.to_string(), "Hire date cannot be in the future.");
    }

    #[test]
    fn staff_optional_contact_fields() {
        let today = date(2024, 6, 1);
        let mut input = staff_input();
        input.email = None;
        input.phone = Some(String::new());
        assert!(validate_staff(&input, today).is_ok());

        input.email = Some("nope".into());
        assert!(validate_staff(&input, today).is_err());
    }
}
