use chrono::NaiveDate;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::error::{LibraryError, Result};
use crate::models::{Book, BookInput, Staff, StaffInput, StaffStatus};
use crate::validation::{
    is_non_negative_integer, is_not_empty, is_valid_email, is_valid_isbn, is_valid_password,
    is_valid_phone, is_valid_username, normalize_isbn, sanitize_input, validate_book,
    validate_staff, MIN_PASSWORD_LENGTH,
};

use super::helpers::{cursor_column, field_line, mask};

/// Date format typed into the hire-date field.
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
/// Quantity prefilled in the add-book dialog.
const DEFAULT_BOOK_QUANTITY: &str = "1";

/// What the modal renderer needs from any form.
pub(crate) trait FormView {
    /// One line per field, in display order.
    fn lines(&self) -> Vec<Line<'static>>;
    /// Cursor position as (column, row) relative to the form's inner area.
    fn cursor(&self) -> (u16, u16);
    fn error(&self) -> Option<&str>;
}

/// Cycle `current` through `order`, forwards or backwards.
fn step<T: Copy + PartialEq>(order: &[T], current: T, forward: bool) -> T {
    let idx = order.iter().position(|f| *f == current).unwrap_or(0);
    let len = order.len();
    let next = if forward {
        (idx + 1) % len
    } else {
        (idx + len - 1) % len
    };
    order[next]
}

#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub(crate) enum LoginField {
    #[default]
    Username,
    Password,
}

/// Username/password entry on the sign-in screen.
#[derive(Default, Clone)]
pub(crate) struct LoginForm {
    pub(crate) username: String,
    pub(crate) password: String,
    pub(crate) active: LoginField,
    pub(crate) error: Option<String>,
}

impl LoginForm {
    pub(crate) fn toggle_field(&mut self) {
        self.active = match self.active {
            LoginField::Username => LoginField::Password,
            LoginField::Password => LoginField::Username,
        };
    }

    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        match self.active {
            LoginField::Username => self.username.push(ch),
            LoginField::Password => self.password.push(ch),
        }
        true
    }

    pub(crate) fn backspace(&mut self) {
        match self.active {
            LoginField::Username => {
                self.username.pop();
            }
            LoginField::Password => {
                self.password.pop();
            }
        }
    }

    /// Check the shape of the credentials before anything hits the
    /// database. On failure the offending field gets focus.
    pub(crate) fn parse_inputs(&mut self) -> Result<(String, String)> {
        let username = self.username.trim().to_string();
        if !is_valid_username(&username) {
            self.active = LoginField::Username;
            return Err(LibraryError::validation("Please enter a valid username."));
        }
        if !is_valid_password(&self.password) {
            self.active = LoginField::Password;
            return Err(LibraryError::validation(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters."
            )));
        }
        Ok((username, self.password.clone()))
    }

    /// Drop the typed password after a failed attempt.
    pub(crate) fn reset_password(&mut self) {
        self.password.clear();
        self.active = LoginField::Password;
    }
}

impl FormView for LoginForm {
    fn lines(&self) -> Vec<Line<'static>> {
        vec![
            field_line(
                "Username",
                &self.username,
                "<required>",
                self.active == LoginField::Username,
            ),
            field_line(
                "Password",
                &mask(&self.password),
                "<required>",
                self.active == LoginField::Password,
            ),
        ]
    }

    fn cursor(&self) -> (u16, u16) {
        match self.active {
            LoginField::Username => (
                cursor_column("Username", self.username.chars().count()),
                0,
            ),
            LoginField::Password => (
                cursor_column("Password", self.password.chars().count()),
                1,
            ),
        }
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub(crate) enum BookField {
    #[default]
    Title,
    Author,
    Isbn,
    Quantity,
}

const BOOK_FIELDS: [BookField; 4] = [
    BookField::Title,
    BookField::Author,
    BookField::Isbn,
    BookField::Quantity,
];

/// Add/edit dialog for a book.
#[derive(Default, Clone)]
pub(crate) struct BookForm {
    pub(crate) title: String,
    pub(crate) author: String,
    pub(crate) isbn: String,
    pub(crate) quantity: String,
    pub(crate) active: BookField,
    pub(crate) error: Option<String>,
}

impl BookForm {
    pub(crate) fn new() -> Self {
        Self {
            quantity: DEFAULT_BOOK_QUANTITY.to_string(),
            ..Self::default()
        }
    }

    pub(crate) fn from_book(book: &Book) -> Self {
        Self {
            title: book.title.clone(),
            author: book.author.clone(),
            isbn: book.isbn.clone(),
            quantity: book.quantity.to_string(),
            active: BookField::Title,
            error: None,
        }
    }

    pub(crate) fn next_field(&mut self) {
        self.active = step(&BOOK_FIELDS, self.active, true);
    }

    pub(crate) fn previous_field(&mut self) {
        self.active = step(&BOOK_FIELDS, self.active, false);
    }

    fn value_mut(&mut self, field: BookField) -> &mut String {
        match field {
            BookField::Title => &mut self.title,
            BookField::Author => &mut self.author,
            BookField::Isbn => &mut self.isbn,
            BookField::Quantity => &mut self.quantity,
        }
    }

    fn value(&self, field: BookField) -> &str {
        match field {
            BookField::Title => &self.title,
            BookField::Author => &self.author,
            BookField::Isbn => &self.isbn,
            BookField::Quantity => &self.quantity,
        }
    }

    /// Quantity only takes digits; ISBN takes digits, hyphens and spaces.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        let allowed = match self.active {
            BookField::Quantity => ch.is_ascii_digit(),
            BookField::Isbn => ch.is_ascii_digit() || ch == '-' || ch == ' ',
            BookField::Title | BookField::Author => !ch.is_control(),
        };
        if allowed {
            let field = self.active;
            self.value_mut(field).push(ch);
        }
        allowed
    }

    pub(crate) fn backspace(&mut self) {
        let field = self.active;
        self.value_mut(field).pop();
    }

    /// Validate in field order, focusing the first bad field, and return the
    /// cleaned-up input.
    pub(crate) fn parse_inputs(&mut self) -> Result<BookInput> {
        let title = sanitize_input(&self.title);
        if !is_not_empty(&title) {
            return self.fail(BookField::Title, "Title is required.");
        }
        let author = sanitize_input(&self.author);
        if !is_not_empty(&author) {
            return self.fail(BookField::Author, "Author is required.");
        }
        if !is_valid_isbn(&self.isbn) {
            return self.fail(BookField::Isbn, "Please enter a valid ISBN (10-13 digits).");
        }
        let quantity_raw = self.quantity.trim();
        if !is_non_negative_integer(quantity_raw) {
            return self.fail(BookField::Quantity, "Quantity must be a whole number, 0 or more.");
        }
        let quantity = quantity_raw
            .parse::<i64>()
            .map_err(|_| LibraryError::validation("Quantity is too large."))?;

        let input = BookInput {
            title,
            author,
            isbn: normalize_isbn(&self.isbn),
            quantity,
        };
        validate_book(&input)?;
        Ok(input)
    }

    fn fail<T>(&mut self, field: BookField, message: &str) -> Result<T> {
        self.active = field;
        Err(LibraryError::validation(message))
    }
}

impl FormView for BookForm {
    fn lines(&self) -> Vec<Line<'static>> {
        BOOK_FIELDS
            .iter()
            .map(|&field| {
                let (label, placeholder) = book_field_label(field);
                field_line(label, self.value(field), placeholder, self.active == field)
            })
            .collect()
    }

    fn cursor(&self) -> (u16, u16) {
        let row = BOOK_FIELDS
            .iter()
            .position(|f| *f == self.active)
            .unwrap_or(0);
        let (label, _) = book_field_label(self.active);
        (
            cursor_column(label, self.value(self.active).chars().count()),
            row as u16,
        )
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

fn book_field_label(field: BookField) -> (&'static str, &'static str) {
    match field {
        BookField::Title => ("Title", "<required>"),
        BookField::Author => ("Author", "<required>"),
        BookField::Isbn => ("ISBN", "<10-13 digits>"),
        BookField::Quantity => ("Quantity", "<0 or more>"),
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub(crate) enum StaffField {
    #[default]
    Name,
    Role,
    HireDate,
    Email,
    Phone,
    Status,
}

const NEW_STAFF_FIELDS: [StaffField; 5] = [
    StaffField::Name,
    StaffField::Role,
    StaffField::HireDate,
    StaffField::Email,
    StaffField::Phone,
];

const EDIT_STAFF_FIELDS: [StaffField; 6] = [
    StaffField::Name,
    StaffField::Role,
    StaffField::HireDate,
    StaffField::Email,
    StaffField::Phone,
    StaffField::Status,
];

/// Add/edit dialog for a staff member. The status row only appears when
/// editing; new hires are always active.
#[derive(Clone)]
pub(crate) struct StaffForm {
    pub(crate) name: String,
    pub(crate) role: String,
    pub(crate) hire_date: String,
    pub(crate) email: String,
    pub(crate) phone: String,
    pub(crate) status: StaffStatus,
    pub(crate) active: StaffField,
    pub(crate) error: Option<String>,
    editing: bool,
}

impl StaffForm {
    /// Blank form with the hire date preset to `today`.
    pub(crate) fn new(today: NaiveDate) -> Self {
        Self {
            name: String::new(),
            role: String::new(),
            hire_date: today.format(DATE_FORMAT).to_string(),
            email: String::new(),
            phone: String::new(),
            status: StaffStatus::Active,
            active: StaffField::Name,
            error: None,
            editing: false,
        }
    }

    pub(crate) fn from_staff(staff: &Staff) -> Self {
        Self {
            name: staff.name.clone(),
            role: staff.role.clone(),
            hire_date: staff.hire_date.format(DATE_FORMAT).to_string(),
            email: staff.email.clone().unwrap_or_default(),
            phone: staff.phone.clone().unwrap_or_default(),
            status: staff.status,
            active: StaffField::Name,
            error: None,
            editing: true,
        }
    }

    fn fields(&self) -> &'static [StaffField] {
        if self.editing {
            &EDIT_STAFF_FIELDS
        } else {
            &NEW_STAFF_FIELDS
        }
    }

    pub(crate) fn next_field(&mut self) {
        self.active = step(self.fields(), self.active, true);
    }

    pub(crate) fn previous_field(&mut self) {
        self.active = step(self.fields(), self.active, false);
    }

    fn value_mut(&mut self, field: StaffField) -> Option<&mut String> {
        match field {
            StaffField::Name => Some(&mut self.name),
            StaffField::Role => Some(&mut self.role),
            StaffField::HireDate => Some(&mut self.hire_date),
            StaffField::Email => Some(&mut self.email),
            StaffField::Phone => Some(&mut self.phone),
            StaffField::Status => None,
        }
    }

    fn value(&self, field: StaffField) -> &str {
        match field {
            StaffField::Name => &self.name,
            StaffField::Role => &self.role,
            StaffField::HireDate => &self.hire_date,
            StaffField::Email => &self.email,
            StaffField::Phone => &self.phone,
            StaffField::Status => self.status.as_str(),
        }
    }

    /// Space toggles the status row; other fields take printable input.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        if self.active == StaffField::Status {
            if ch == ' ' {
                self.status = self.status.toggled();
                return true;
            }
            return false;
        }
        if self.active == StaffField::HireDate && !(ch.is_ascii_digit() || ch == '-') {
            return false;
        }
        let field = self.active;
        match self.value_mut(field) {
            Some(value) => {
                value.push(ch);
                true
            }
            None => false,
        }
    }

    pub(crate) fn backspace(&mut self) {
        let field = self.active;
        if let Some(value) = self.value_mut(field) {
            value.pop();
        }
    }

    pub(crate) fn parse_inputs(&mut self, today: NaiveDate) -> Result<StaffInput> {
        let name = sanitize_input(&self.name);
        if !is_not_empty(&name) {
            return self.fail(StaffField::Name, "Name is required.");
        }
        let role = sanitize_input(&self.role);
        if !is_not_empty(&role) {
            return self.fail(StaffField::Role, "Role is required.");
        }
        let Ok(hire_date) = NaiveDate::parse_from_str(self.hire_date.trim(), DATE_FORMAT) else {
            return self.fail(StaffField::HireDate, "Hire date must look like YYYY-MM-DD.");
        };
        if hire_date > today {
            return self.fail(StaffField::HireDate, "Hire date cannot be in the future.");
        }
        let email = sanitize_input(&self.email);
        if !email.is_empty() && !is_valid_email(&email) {
            return self.fail(StaffField::Email, "Please enter a valid email address.");
        }
        let phone = sanitize_input(&self.phone);
        if !phone.is_empty() && !is_valid_phone(&phone) {
            return self.fail(StaffField::Phone, "Please enter a valid phone number.");
        }

        let input = StaffInput {
            name,
            role,
            hire_date,
            email: Some(email).filter(|e| !e.is_empty()),
            phone: Some(phone).filter(|p| !p.is_empty()),
            status: self.status,
        };
        validate_staff(&input, today)?;
        Ok(input)
    }

    fn fail<T>(&mut self, field: StaffField, message: &str) -> Result<T> {
        self.active = field;
        Err(LibraryError::validation(message))
    }
}

impl FormView for StaffForm {
    fn lines(&self) -> Vec<Line<'static>> {
        self.fields()
            .iter()
            .map(|&field| {
                let (label, placeholder) = staff_field_label(field);
                if field == StaffField::Status {
                    let style = if self.active == field {
                        Style::default().fg(Color::Yellow)
                    } else {
                        Style::default()
                    };
                    Line::from(vec![
                        Span::raw(format!("{label}: ")),
                        Span::styled(self.status.as_str().to_string(), style),
                        Span::styled("  (Space to toggle)", Style::default().fg(Color::DarkGray)),
                    ])
                } else {
                    field_line(label, self.value(field), placeholder, self.active == field)
                }
            })
            .collect()
    }

    fn cursor(&self) -> (u16, u16) {
        let row = self
            .fields()
            .iter()
            .position(|f| *f == self.active)
            .unwrap_or(0);
        let (label, _) = staff_field_label(self.active);
        (
            cursor_column(label, self.value(self.active).chars().count()),
            row as u16,
        )
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

fn staff_field_label(field: StaffField) -> (&'static str, &'static str) {
    match field {
        StaffField::Name => ("Name", "<required>"),
        StaffField::Role => ("Role", "<required>"),
        StaffField::HireDate => ("Hire Date", "<YYYY-MM-DD>"),
        StaffField::Email => ("Email", "<optional>"),
        StaffField::Phone => ("Phone", "<optional>"),
        StaffField::Status => ("Status", ""),
    }
}

/// Row picked for deletion, captured when the confirmation opens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ConfirmDelete {
    Book { id: i64, title: String },
    Staff { id: i64, name: String },
}

impl ConfirmDelete {
    pub(crate) fn prompt(&self) -> String {
        match self {
            Self::Book { title, .. } => format!("Delete the book \"{title}\"?"),
            Self::Staff { name, .. } => format!("Delete staff member {name}?"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn type_into(form: &mut BookForm, text: &str) {
        for ch in text.chars() {
            form.push_char(ch);
        }
    }

    #[test]
    fn login_checks_shape_before_submitting() {
        let mut form = LoginForm {
            username: "ab".into(),
            password: "admin123".into(),
            ..LoginForm::default()
        };
        assert!(form.parse_inputs().is_err());
        assert_eq!(form.active, LoginField::Username);

        form.username = "admin".into();
        form.password = "123".into();
        let err = form.parse_inputs().unwrap_err();
        assert_eq!(err.to_string(), "Password must be at least 6 characters.");
        assert_eq!(form.active, LoginField::Password);

        form.password = "admin123".into();
        assert_eq!(
            form.parse_inputs().unwrap(),
            ("admin".to_string(), "admin123".to_string())
        );
    }

    #[test]
    fn password_is_masked_in_render() {
        let form = LoginForm {
            password: "hunter22".into(),
            ..LoginForm::default()
        };
        let rendered: String = form.lines()[1]
            .spans
            .iter()
            .map(|s| s.content.to_string())
            .collect();
        assert!(!rendered.contains("hunter22"));
        assert!(rendered.contains("••••••••"));
    }

    #[test]
    fn book_form_filters_characters_and_cycles_fields() {
        let mut form = BookForm::new();
        assert_eq!(form.quantity, "1");
        form.active = BookField::Quantity;
        assert!(!form.push_char('x'));
        form.previous_field();
        assert_eq!(form.active, BookField::Isbn);
        type_into(&mut form, "978-0-441x");
        assert_eq!(form.isbn, "978-0-441");
        form.next_field();
        form.next_field();
        assert_eq!(form.active, BookField::Title);
    }

    #[test]
    fn book_form_produces_clean_input() {
        let mut form = BookForm::new();
        type_into(&mut form, "  Dune ");
        form.next_field();
        type_into(&mut form, "Frank  Herbert");
        form.next_field();
        type_into(&mut form, "978-0441-013593");
        form.next_field();
        form.backspace();
        type_into(&mut form, "3");

        let input = form.parse_inputs().unwrap();
        assert_eq!(
            input,
            BookInput {
                title: "Dune".into(),
                author: "Frank Herbert".into(),
                isbn: "9780441013593".into(),
                quantity: 3,
            }
        );
    }

    #[test]
    fn book_form_focuses_first_invalid_field() {
        let mut form = BookForm::new();
        form.title = "Dune".into();
        form.author = "Frank Herbert".into();
        form.isbn = "123".into();
        let err = form.parse_inputs().unwrap_err();
        assert_eq!(err.to_string(), "Please enter a valid ISBN (10-13 digits).");
        assert_eq!(form.active, BookField::Isbn);
    }

    #[test]
    fn staff_form_status_row_only_when_editing() {
        let mut form = StaffForm::new(today());
        assert_eq!(form.lines().len(), 5);
        form.active = StaffField::Phone;
        form.next_field();
        assert_eq!(form.active, StaffField::Name);

        let staff = Staff {
            id: 3,
            name: "Grace Hopper".into(),
            role: "Archivist".into(),
            hire_date: NaiveDate::from_ymd_opt(2019, 9, 9).unwrap(),
            status: StaffStatus::Active,
            email: None,
            phone: None,
        };
        let mut form = StaffForm::from_staff(&staff);
        assert_eq!(form.lines().len(), 6);
        form.active = StaffField::Status;
        assert!(form.push_char(' '));
        assert_eq!(form.status, StaffStatus::Inactive);
        let input = form.parse_inputs(today()).unwrap();
        assert_eq!(input.status, StaffStatus::Inactive);
        assert_eq!(input.hire_date, staff.hire_date);
    }

    #[test]
    fn staff_form_rejects_bad_dates() {
        let mut form = StaffForm::new(today());
        form.name = "Ada".into();
        form.role = "Clerk".into();
        form.hire_date = "2024-13-01".into();
        assert!(form.parse_inputs(today()).is_err());
        assert_eq!(form.active, StaffField::HireDate);

        form.hire_date = "2024-06-02".into();
        let err = form.parse_inputs(today()).unwrap_err();
        assert_eq!(err.to_string(), "Hire date cannot be in the future.");
    }

    #[test]
    fn confirm_prompt_names_the_row() {
        let confirm = ConfirmDelete::Book {
            id: 1,
            title: "Dune".into(),
        };
        assert_eq!(confirm.prompt(), "Delete the book \"Dune\"?");
    }
}
