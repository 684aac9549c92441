use std::mem;

use chrono::{Local, NaiveDate};
use crossterm::event::KeyCode;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Tabs, Wrap,
};
use ratatui::Frame;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::db::{
    authenticate, create_book, create_staff, delete_book, delete_staff, fetch_books, fetch_staff,
    fetch_stats, search_books, update_book, update_staff, Database,
};
use crate::error::{LibraryError, Result};
use crate::models::{Admin, Book, BookInput, BookStatus, Staff, StaffInput, StaffStatus, Stats};
use crate::validation::sanitize_input;
use crate::worker::{self, Task};

use super::forms::{BookForm, ConfirmDelete, FormView, LoginForm, StaffForm};
use super::helpers::{centered_rect, truncate};
use super::screens::RecordList;

const APP_TITLE: &str = "Library Management System";
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
const TAB_BAR_HEIGHT: u16 = 3;
/// Rows skipped by PageUp/PageDown in the tables.
const PAGE_STEP: isize = 10;

/// Whether anyone is signed in yet.
enum Screen {
    Login(LoginForm),
    Main,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Tab {
    Dashboard,
    Books,
    Staff,
}

impl Tab {
    const ALL: [Tab; 3] = [Tab::Dashboard, Tab::Books, Tab::Staff];

    fn title(self) -> &'static str {
        match self {
            Tab::Dashboard => "[1] Dashboard",
            Tab::Books => "[2] Books",
            Tab::Staff => "[3] Staff",
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    fn previous(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Modal state layered over the main screen.
enum Mode {
    Normal,
    AddingBook(BookForm),
    EditingBook { id: i64, form: BookForm },
    AddingStaff(StaffForm),
    EditingStaff { id: i64, form: StaffForm },
    ConfirmDelete(ConfirmDelete),
    Searching(String),
    About,
    ConfirmExit,
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Everything the panels show, loaded in one go.
struct Snapshot {
    books: Vec<Book>,
    staff: Vec<Staff>,
    stats: Stats,
}

/// One panel's rows plus the dashboard numbers, read after a change.
struct Listing<T> {
    rows: Vec<T>,
    stats: Stats,
}

/// What a finished background task hands back to the UI thread.
///
/// For the panel variants the task itself succeeded (any write is
/// committed); `listing` carries the follow-up reload separately.
enum Outcome {
    LoggedIn(Admin),
    Refreshed {
        data: Snapshot,
        notice: String,
    },
    Books {
        listing: Result<Listing<Book>>,
        focus: Option<i64>,
        notice: Option<String>,
    },
    Staff {
        listing: Result<Listing<Staff>>,
        focus: Option<i64>,
        notice: Option<String>,
    },
}

fn load_books(conn: &Connection, search: Option<&str>) -> Result<Vec<Book>> {
    match search {
        Some(term) => search_books(conn, term),
        None => fetch_books(conn),
    }
}

fn load_snapshot(conn: &Connection, search: Option<&str>) -> Result<Snapshot> {
    Ok(Snapshot {
        books: load_books(conn, search)?,
        staff: fetch_staff(conn)?,
        stats: fetch_stats(conn)?,
    })
}

fn list_books(conn: &Connection, search: Option<&str>) -> Result<Listing<Book>> {
    Ok(Listing {
        rows: load_books(conn, search)?,
        stats: fetch_stats(conn)?,
    })
}

fn list_staff(conn: &Connection) -> Result<Listing<Staff>> {
    Ok(Listing {
        rows: fetch_staff(conn)?,
        stats: fetch_stats(conn)?,
    })
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Central application state shared across the TUI.
pub struct App {
    db: Database,
    screen: Screen,
    admin: Option<Admin>,
    tab: Tab,
    mode: Mode,
    books: RecordList<Book>,
    /// Term the book table is currently filtered by.
    book_search: Option<String>,
    staff: RecordList<Staff>,
    stats: Stats,
    /// Cached so drawing never waits on the connection lock.
    connection: String,
    status: Option<StatusMessage>,
    pending: Option<Task<Outcome>>,
}

impl App {
    pub fn new(db: Database) -> Self {
        let connection = db.connection_status();
        Self {
            db,
            screen: Screen::Login(LoginForm::default()),
            admin: None,
            tab: Tab::Dashboard,
            mode: Mode::Normal,
            books: RecordList::default(),
            book_search: None,
            staff: RecordList::default(),
            stats: Stats::default(),
            connection,
            status: None,
            pending: None,
        }
    }

    /// True while a background task has not reported back.
    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn signed_in(&self) -> Option<&Admin> {
        self.admin.as_ref()
    }

    /// Collect the result of the in-flight task, if it has finished.
    pub fn poll_pending(&mut self) {
        let Some(result) = self.pending.as_ref().and_then(|task| task.poll()) else {
            return;
        };
        self.pending = None;
        self.connection = self.db.connection_status();
        match result {
            Ok(outcome) => self.apply(outcome),
            Err(err) => self.report_failure(err),
        }
    }

    /// Log the session end. Called once the draw loop has stopped.
    pub fn logout(&mut self) {
        if let Some(admin) = self.admin.take() {
            info!(user = %admin, "Admin logged out");
        }
    }

    /// Handle one key press; returns `true` when the app should exit.
    /// Input is dropped while a task is pending.
    pub fn handle_key(&mut self, code: KeyCode) -> bool {
        if self.is_busy() {
            return false;
        }
        if matches!(self.screen, Screen::Login(_)) {
            return self.handle_login_key(code);
        }

        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);
        self.mode = match mode {
            Mode::Normal => self.handle_normal_key(code),
            Mode::AddingBook(form) => self.handle_book_form(code, None, form),
            Mode::EditingBook { id, form } => self.handle_book_form(code, Some(id), form),
            Mode::AddingStaff(form) => self.handle_staff_form(code, None, form),
            Mode::EditingStaff { id, form } => self.handle_staff_form(code, Some(id), form),
            Mode::ConfirmDelete(confirm) => self.handle_confirm_delete(code, confirm),
            Mode::Searching(query) => self.handle_search(code, query),
            Mode::About => match code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('?') => Mode::Normal,
                _ => Mode::About,
            },
            Mode::ConfirmExit => match code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    exit = true;
                    Mode::Normal
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Mode::Normal,
                _ => Mode::ConfirmExit,
            },
        };
        exit
    }

    fn handle_login_key(&mut self, code: KeyCode) -> bool {
        let Screen::Login(form) = &mut self.screen else {
            return false;
        };

        let credentials = match code {
            KeyCode::Esc => return true,
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                form.toggle_field();
                None
            }
            KeyCode::Backspace => {
                form.backspace();
                None
            }
            KeyCode::Enter => match form.parse_inputs() {
                Ok(credentials) => {
                    form.error = None;
                    Some(credentials)
                }
                Err(err) => {
                    form.error = Some(err.to_string());
                    None
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
                None
            }
            _ => None,
        };

        if let Some((username, password)) = credentials {
            self.start("login", move |conn| {
                authenticate(conn, &username, &password).map(Outcome::LoggedIn)
            });
        }
        false
    }

    fn handle_normal_key(&mut self, code: KeyCode) -> Mode {
        match code {
            KeyCode::Char('q') | KeyCode::Char('Q') => return Mode::ConfirmExit,
            KeyCode::Char('?') => return Mode::About,
            KeyCode::F(5) => {
                self.refresh_all("Data refreshed.".to_string());
                return Mode::Normal;
            }
            KeyCode::Tab => {
                self.tab = self.tab.next();
                return Mode::Normal;
            }
            KeyCode::BackTab => {
                self.tab = self.tab.previous();
                return Mode::Normal;
            }
            KeyCode::Char('1') => {
                self.tab = Tab::Dashboard;
                return Mode::Normal;
            }
            KeyCode::Char('2') => {
                self.tab = Tab::Books;
                return Mode::Normal;
            }
            KeyCode::Char('3') => {
                self.tab = Tab::Staff;
                return Mode::Normal;
            }
            _ => {}
        }

        match self.tab {
            Tab::Dashboard => self.handle_dashboard_key(code),
            Tab::Books => self.handle_books_key(code),
            Tab::Staff => self.handle_staff_key(code),
        }
    }

    fn handle_dashboard_key(&mut self, code: KeyCode) -> Mode {
        match code {
            KeyCode::Char('b') => {
                self.clear_status();
                return Mode::AddingBook(BookForm::new());
            }
            KeyCode::Char('s') => {
                self.clear_status();
                return Mode::AddingStaff(StaffForm::new(today()));
            }
            KeyCode::Char('B') => self.tab = Tab::Books,
            KeyCode::Char('S') => self.tab = Tab::Staff,
            _ => {}
        }
        Mode::Normal
    }

    fn handle_books_key(&mut self, code: KeyCode) -> Mode {
        match code {
            KeyCode::Up => self.books.move_selection(-1),
            KeyCode::Down => self.books.move_selection(1),
            KeyCode::PageUp => self.books.move_selection(-PAGE_STEP),
            KeyCode::PageDown => self.books.move_selection(PAGE_STEP),
            KeyCode::Home => self.books.select_first(),
            KeyCode::End => self.books.select_last(),
            KeyCode::Char('a') | KeyCode::Char('+') => {
                self.clear_status();
                return Mode::AddingBook(BookForm::new());
            }
            KeyCode::Char('e') | KeyCode::Enter => {
                if let Some(book) = self.books.current() {
                    let mode = Mode::EditingBook {
                        id: book.id,
                        form: BookForm::from_book(book),
                    };
                    self.clear_status();
                    return mode;
                }
                self.set_status("Select a book to edit.", StatusKind::Error);
            }
            KeyCode::Char('d') | KeyCode::Char('-') | KeyCode::Delete => {
                if let Some(book) = self.books.current() {
                    let confirm = ConfirmDelete::Book {
                        id: book.id,
                        title: book.title.clone(),
                    };
                    self.clear_status();
                    return Mode::ConfirmDelete(confirm);
                }
                self.set_status("Select a book to delete.", StatusKind::Error);
            }
            KeyCode::Char('/') | KeyCode::Char('f') => {
                return Mode::Searching(self.book_search.clone().unwrap_or_default());
            }
            KeyCode::Esc if self.book_search.is_some() => {
                self.book_search = None;
                self.reload_books(Some("Search cleared.".to_string()));
            }
            KeyCode::Char('r') => {
                self.book_search = None;
                self.reload_books(Some("Book list refreshed.".to_string()));
            }
            _ => {}
        }
        Mode::Normal
    }

    fn handle_staff_key(&mut self, code: KeyCode) -> Mode {
        match code {
            KeyCode::Up => self.staff.move_selection(-1),
            KeyCode::Down => self.staff.move_selection(1),
            KeyCode::PageUp => self.staff.move_selection(-PAGE_STEP),
            KeyCode::PageDown => self.staff.move_selection(PAGE_STEP),
            KeyCode::Home => self.staff.select_first(),
            KeyCode::End => self.staff.select_last(),
            KeyCode::Char('a') | KeyCode::Char('+') => {
                self.clear_status();
                return Mode::AddingStaff(StaffForm::new(today()));
            }
            KeyCode::Char('e') | KeyCode::Enter => {
                if let Some(member) = self.staff.current() {
                    let mode = Mode::EditingStaff {
                        id: member.id,
                        form: StaffForm::from_staff(member),
                    };
                    self.clear_status();
                    return mode;
                }
                self.set_status("Select a staff member to edit.", StatusKind::Error);
            }
            KeyCode::Char('d') | KeyCode::Char('-') | KeyCode::Delete => {
                if let Some(member) = self.staff.current() {
                    let confirm = ConfirmDelete::Staff {
                        id: member.id,
                        name: member.name.clone(),
                    };
                    self.clear_status();
                    return Mode::ConfirmDelete(confirm);
                }
                self.set_status("Select a staff member to delete.", StatusKind::Error);
            }
            KeyCode::Char('r') => self.reload_staff(Some("Staff list refreshed.".to_string())),
            _ => {}
        }
        Mode::Normal
    }

    fn handle_book_form(&mut self, code: KeyCode, id: Option<i64>, mut form: BookForm) -> Mode {
        match code {
            KeyCode::Esc => {
                self.set_status("Book changes discarded.", StatusKind::Info);
                return Mode::Normal;
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match form.parse_inputs() {
                Ok(input) => {
                    form.error = None;
                    self.save_book(id, input);
                }
                Err(err) => form.error = Some(err.to_string()),
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }

        match id {
            Some(id) => Mode::EditingBook { id, form },
            None => Mode::AddingBook(form),
        }
    }

    fn handle_staff_form(&mut self, code: KeyCode, id: Option<i64>, mut form: StaffForm) -> Mode {
        match code {
            KeyCode::Esc => {
                self.set_status("Staff changes discarded.", StatusKind::Info);
                return Mode::Normal;
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match form.parse_inputs(today()) {
                Ok(input) => {
                    form.error = None;
                    self.save_staff(id, input);
                }
                Err(err) => form.error = Some(err.to_string()),
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }

        match id {
            Some(id) => Mode::EditingStaff { id, form },
            None => Mode::AddingStaff(form),
        }
    }

    fn handle_confirm_delete(&mut self, code: KeyCode, confirm: ConfirmDelete) -> Mode {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                Mode::Normal
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                self.delete_record(&confirm);
                Mode::ConfirmDelete(confirm)
            }
            _ => Mode::ConfirmDelete(confirm),
        }
    }

    fn handle_search(&mut self, code: KeyCode, mut query: String) -> Mode {
        match code {
            KeyCode::Esc => Mode::Normal,
            KeyCode::Enter => {
                let term = sanitize_input(&query);
                self.book_search = Some(term).filter(|t| !t.is_empty());
                self.reload_books(None);
                Mode::Normal
            }
            KeyCode::Backspace => {
                query.pop();
                Mode::Searching(query)
            }
            KeyCode::Char(ch) if !ch.is_control() => {
                query.push(ch);
                Mode::Searching(query)
            }
            _ => Mode::Searching(query),
        }
    }

    /// Hand `job` to a worker thread. Only one task runs at a time.
    fn start<F>(&mut self, label: &'static str, job: F)
    where
        F: FnOnce(&Connection) -> Result<Outcome> + Send + 'static,
    {
        if let Some(task) = &self.pending {
            warn!(running = task.label(), requested = label, "Task already running, request dropped");
            return;
        }
        self.pending = Some(worker::spawn(&self.db, label, job));
    }

    fn refresh_all(&mut self, notice: String) {
        self.set_status("Refreshing data...", StatusKind::Info);
        let search = self.book_search.clone();
        self.start("refresh", move |conn| {
            let data = load_snapshot(conn, search.as_deref())?;
            Ok(Outcome::Refreshed { data, notice })
        });
    }

    fn reload_books(&mut self, notice: Option<String>) {
        let search = self.book_search.clone();
        self.start("load-books", move |conn| {
            let listing = list_books(conn, search.as_deref())?;
            let notice = notice.or_else(|| {
                search
                    .as_ref()
                    .map(|term| format!("{} book(s) match \"{term}\".", listing.rows.len()))
            });
            Ok(Outcome::Books {
                listing: Ok(listing),
                focus: None,
                notice,
            })
        });
    }

    fn reload_staff(&mut self, notice: Option<String>) {
        self.start("load-staff", move |conn| {
            Ok(Outcome::Staff {
                listing: Ok(list_staff(conn)?),
                focus: None,
                notice,
            })
        });
    }

    fn save_book(&mut self, id: Option<i64>, input: BookInput) {
        let search = self.book_search.clone();
        self.start("save-book", move |conn| {
            let book = match id {
                Some(id) => update_book(conn, id, &input)?,
                None => create_book(conn, &input)?,
            };
            let verb = if id.is_some() { "Updated" } else { "Added" };
            Ok(Outcome::Books {
                listing: list_books(conn, search.as_deref()),
                focus: Some(book.id),
                notice: Some(format!("{verb} \"{}\".", book.title)),
            })
        });
    }

    fn save_staff(&mut self, id: Option<i64>, input: StaffInput) {
        self.start("save-staff", move |conn| {
            let member = match id {
                Some(id) => update_staff(conn, id, &input)?,
                None => create_staff(conn, &input)?,
            };
            let verb = if id.is_some() { "Updated" } else { "Added" };
            Ok(Outcome::Staff {
                listing: list_staff(conn),
                focus: Some(member.id),
                notice: Some(format!("{verb} staff member {}.", member.name)),
            })
        });
    }

    fn delete_record(&mut self, confirm: &ConfirmDelete) {
        match confirm.clone() {
            ConfirmDelete::Book { id, title } => {
                let search = self.book_search.clone();
                self.start("delete-book", move |conn| {
                    delete_book(conn, id)?;
                    Ok(Outcome::Books {
                        listing: list_books(conn, search.as_deref()),
                        focus: None,
                        notice: Some(format!("Deleted \"{title}\".")),
                    })
                });
            }
            ConfirmDelete::Staff { id, name } => {
                self.start("delete-staff", move |conn| {
                    delete_staff(conn, id)?;
                    Ok(Outcome::Staff {
                        listing: list_staff(conn),
                        focus: None,
                        notice: Some(format!("Deleted staff member {name}.")),
                    })
                });
            }
        }
    }

    fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::LoggedIn(admin) => {
                info!(user = %admin, "Admin signed in");
                let welcome = format!("Welcome, {admin}!");
                self.admin = Some(admin);
                self.screen = Screen::Main;
                self.tab = Tab::Dashboard;
                self.refresh_all(welcome);
            }
            Outcome::Refreshed { data, notice } => {
                self.load_snapshot(data);
                self.set_status(notice, StatusKind::Info);
            }
            Outcome::Books {
                listing,
                focus,
                notice,
            } => {
                self.close_dialog();
                match listing {
                    Ok(listing) => {
                        self.books.set_rows(listing.rows, focus);
                        self.stats = listing.stats;
                        self.notify(notice);
                    }
                    Err(err) => self.report_stale_listing(notice, &err),
                }
            }
            Outcome::Staff {
                listing,
                focus,
                notice,
            } => {
                self.close_dialog();
                match listing {
                    Ok(listing) => {
                        self.staff.set_rows(listing.rows, focus);
                        self.stats = listing.stats;
                        self.notify(notice);
                    }
                    Err(err) => self.report_stale_listing(notice, &err),
                }
            }
        }
    }

    fn notify(&mut self, notice: Option<String>) {
        if let Some(notice) = notice {
            self.set_status(notice, StatusKind::Info);
        }
    }

    /// The write went through but the panel could not be reloaded.
    fn report_stale_listing(&mut self, notice: Option<String>, err: &LibraryError) {
        let message = match notice {
            Some(notice) => format!("{notice} The list could not be reloaded: {err}"),
            None => format!("The list could not be reloaded: {err}"),
        };
        self.set_status(message, StatusKind::Error);
    }

    fn load_snapshot(&mut self, data: Snapshot) {
        self.books.set_rows(data.books, None);
        self.staff.set_rows(data.staff, None);
        self.stats = data.stats;
    }

    /// Errors land in the open dialog when there is one, and always in the
    /// footer.
    fn report_failure(&mut self, err: LibraryError) {
        let message = err.to_string();

        if let Screen::Login(form) = &mut self.screen {
            form.reset_password();
            form.error = Some(message);
            return;
        }

        match &mut self.mode {
            Mode::AddingBook(form) | Mode::EditingBook { form, .. } => {
                form.error = Some(message.clone());
            }
            Mode::AddingStaff(form) | Mode::EditingStaff { form, .. } => {
                form.error = Some(message.clone());
            }
            _ => {}
        }
        if matches!(self.mode, Mode::ConfirmDelete(_)) {
            self.mode = Mode::Normal;
        }
        self.set_status(message, StatusKind::Error);
    }

    fn close_dialog(&mut self) {
        if matches!(
            self.mode,
            Mode::AddingBook(_)
                | Mode::EditingBook { .. }
                | Mode::AddingStaff(_)
                | Mode::EditingStaff { .. }
                | Mode::ConfirmDelete(_)
        ) {
            self.mode = Mode::Normal;
        }
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        match &self.screen {
            Screen::Login(form) => self.draw_login(frame, area, form),
            Screen::Main => self.draw_main(frame, area),
        }
    }

    fn draw_login(&self, frame: &mut Frame, area: Rect, form: &LoginForm) {
        let banner = Paragraph::new(Line::from(Span::styled(
            APP_TITLE,
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )))
        .alignment(Alignment::Center);
        frame.render_widget(banner, Rect { height: 1u16.min(area.height), ..area });

        let hint = if self.is_busy() {
            "Signing in..."
        } else {
            "Enter to sign in • Tab to switch • Esc to quit"
        };
        self.draw_form(frame, area, "Admin Login", form, 30, hint);
    }

    fn draw_main(&self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(TAB_BAR_HEIGHT),
                Constraint::Min(0),
                Constraint::Length(FOOTER_HEIGHT),
            ])
            .split(area);

        self.draw_tab_bar(frame, chunks[0]);
        match self.tab {
            Tab::Dashboard => self.draw_dashboard(frame, chunks[1]),
            Tab::Books => self.draw_books(frame, chunks[1]),
            Tab::Staff => self.draw_staff(frame, chunks[1]),
        }
        self.draw_footer(frame, chunks[2]);

        let busy = self.is_busy();
        match &self.mode {
            Mode::AddingBook(form) => {
                self.draw_form(frame, area, "Add Book", form, 40, form_hint(busy))
            }
            Mode::EditingBook { form, .. } => {
                self.draw_form(frame, area, "Edit Book", form, 40, form_hint(busy))
            }
            Mode::AddingStaff(form) => {
                self.draw_form(frame, area, "Add Staff Member", form, 45, form_hint(busy))
            }
            Mode::EditingStaff { form, .. } => {
                self.draw_form(frame, area, "Edit Staff Member", form, 50, form_hint(busy))
            }
            Mode::ConfirmDelete(confirm) => self.draw_confirm_delete(frame, area, confirm),
            Mode::Searching(query) => self.draw_search_bar(frame, chunks[1], query),
            Mode::About => self.draw_about(frame, area),
            Mode::ConfirmExit => self.draw_confirm_exit(frame, area),
            Mode::Normal => {}
        }
    }

    fn draw_tab_bar(&self, frame: &mut Frame, area: Rect) {
        let user = self
            .admin
            .as_ref()
            .map(|admin| admin.username.as_str())
            .unwrap_or("-");
        let title = format!(
            " {APP_TITLE} | {user} | {} ",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        let tabs = Tabs::new(Tab::ALL.iter().map(|tab| tab.title()))
            .block(Block::default().borders(Borders::ALL).title(title))
            .select(self.tab.index())
            .highlight_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            );
        frame.render_widget(tabs, area);
    }

    fn draw_dashboard(&self, frame: &mut Frame, area: Rect) {
        let key_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let user = self
            .admin
            .as_ref()
            .map(|admin| admin.username.clone())
            .unwrap_or_default();

        let lines = vec![
            Line::from(Span::styled(
                format!("Welcome, {user}!"),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(format!("Total Books:  {}", self.stats.total_books)),
            Line::from(format!("Active Staff: {}", self.stats.active_staff)),
            Line::from(""),
            Line::from(Span::styled(
                format!("Database: {}", self.connection),
                Style::default().fg(Color::Gray),
            )),
            Line::from(""),
            Line::from("Quick actions:"),
            Line::from(vec![
                Span::styled("[b]", key_style),
                Span::raw(" Add book   "),
                Span::styled("[s]", key_style),
                Span::raw(" Add staff   "),
                Span::styled("[B]", key_style),
                Span::raw(" Browse books   "),
                Span::styled("[S]", key_style),
                Span::raw(" Browse staff"),
            ]),
        ];

        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Dashboard"))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn draw_books(&self, frame: &mut Frame, area: Rect) {
        let title = match &self.book_search {
            Some(term) => format!("Books ({}) - search: \"{term}\"", self.books.len()),
            None => format!("Books ({})", self.books.len()),
        };
        let block = Block::default().borders(Borders::ALL).title(title);

        if self.books.is_empty() {
            let message = if self.book_search.is_some() {
                "No books match the search. Press Esc to clear it."
            } else {
                "No books yet. Press [a] to add one."
            };
            frame.render_widget(empty_panel(block, message), area);
            return;
        }

        let rows = self.books.rows.iter().map(|book| {
            let status_style = match book.status {
                BookStatus::Available => Style::default().fg(Color::Green),
                BookStatus::OutOfStock => Style::default().fg(Color::Red),
            };
            Row::new(vec![
                Cell::from(book.id.to_string()),
                Cell::from(truncate(&book.title, 40)),
                Cell::from(truncate(&book.author, 25)),
                Cell::from(book.isbn.clone()),
                Cell::from(book.quantity.to_string()),
                Cell::from(Span::styled(book.status.label(), status_style)),
                Cell::from(book.date_added.format("%Y-%m-%d").to_string()),
            ])
        });

        let widths = [
            Constraint::Length(5),
            Constraint::Percentage(30),
            Constraint::Percentage(20),
            Constraint::Length(14),
            Constraint::Length(8),
            Constraint::Length(13),
            Constraint::Length(11),
        ];
        let header = [
            "ID",
            "Title",
            "Author",
            "ISBN",
            "Quantity",
            "Status",
            "Date Added",
        ];
        render_table(frame, area, block, rows, &widths, &header, self.books.selected);
    }

    fn draw_staff(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("Staff ({})", self.staff.len()));

        if self.staff.is_empty() {
            frame.render_widget(
                empty_panel(block, "No staff members yet. Press [a] to add one."),
                area,
            );
            return;
        }

        let rows = self.staff.rows.iter().map(|member| {
            let status_style = match member.status {
                StaffStatus::Active => Style::default().fg(Color::Green),
                StaffStatus::Inactive => Style::default().fg(Color::DarkGray),
            };
            Row::new(vec![
                Cell::from(member.id.to_string()),
                Cell::from(truncate(&member.name, 30)),
                Cell::from(truncate(&member.role, 20)),
                Cell::from(member.hire_date.format("%Y-%m-%d").to_string()),
                Cell::from(Span::styled(member.status.as_str(), status_style)),
                Cell::from(truncate(member.email.as_deref().unwrap_or(""), 30)),
                Cell::from(member.phone.clone().unwrap_or_default()),
            ])
        });

        let widths = [
            Constraint::Length(5),
            Constraint::Percentage(22),
            Constraint::Percentage(15),
            Constraint::Length(11),
            Constraint::Length(9),
            Constraint::Percentage(25),
            Constraint::Length(16),
        ];
        let header = ["ID", "Name", "Role", "Hire Date", "Status", "Email", "Phone"];
        render_table(frame, area, block, rows, &widths, &header, self.staff.selected);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(task) = &self.pending {
            Line::from(Span::styled(
                format!("Working: {}...", task.label()),
                Style::default().fg(Color::Yellow),
            ))
        } else if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let paragraph = Paragraph::new(vec![status_line, self.footer_instructions()])
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        let key_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let mut spans = Vec::new();
        let mut push = |key: &'static str, label: &'static str| {
            spans.push(Span::styled(key, key_style));
            spans.push(Span::raw(format!(" {label}   ")));
        };

        match (&self.mode, self.tab) {
            (Mode::Searching(_), _) => {
                push("[Enter]", "Search");
                push("[Esc]", "Cancel");
            }
            (Mode::Normal, Tab::Dashboard) => {
                push("[Tab]", "Switch Panel");
                push("[F5]", "Refresh All");
                push("[?]", "About");
                push("[q]", "Quit");
            }
            (Mode::Normal, Tab::Books) => {
                push("[↑↓]", "Navigate");
                push("[a]", "Add");
                push("[e]", "Edit");
                push("[d]", "Delete");
                push("[/]", "Search");
                push("[r]", "Refresh");
                push("[Tab]", "Switch Panel");
                push("[q]", "Quit");
            }
            (Mode::Normal, Tab::Staff) => {
                push("[↑↓]", "Navigate");
                push("[a]", "Add");
                push("[e]", "Edit");
                push("[d]", "Delete");
                push("[r]", "Refresh");
                push("[Tab]", "Switch Panel");
                push("[q]", "Quit");
            }
            _ => {}
        }
        Line::from(spans)
    }

    fn draw_form<F: FormView>(
        &self,
        frame: &mut Frame,
        area: Rect,
        title: &str,
        form: &F,
        percent_y: u16,
        hint: &str,
    ) {
        let popup_area = centered_rect(60, percent_y, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title.to_string()).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = form.lines();
        lines.push(Line::from(""));
        match form.error() {
            Some(error) => lines.push(Line::from(Span::styled(
                error.to_string(),
                Style::default().fg(Color::Red),
            ))),
            None => lines.push(Line::from(Span::styled(
                hint.to_string(),
                Style::default().fg(Color::Gray),
            ))),
        }
        frame.render_widget(Paragraph::new(lines), inner);

        if !self.is_busy() && inner.width > 0 && inner.height > 0 {
            let (column, row) = form.cursor();
            frame.set_cursor_position((
                inner.x + column.min(inner.width - 1),
                inner.y + row.min(inner.height - 1),
            ));
        }
    }

    fn draw_confirm_delete(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmDelete) {
        let popup_area = centered_rect(50, 25, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("Confirm Delete")
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let hint = if self.is_busy() {
            "Deleting..."
        } else {
            "Press Y to confirm or N / Esc to cancel."
        };
        let lines = vec![
            Line::from(confirm.prompt()),
            Line::from("This cannot be undone."),
            Line::from(""),
            Line::from(Span::styled(hint, Style::default().fg(Color::Gray))),
        ];
        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_search_bar(&self, frame: &mut Frame, area: Rect, query: &str) {
        let height = 3u16.min(area.height);
        let popup_area = Rect {
            x: area.x,
            y: area.y,
            width: area.width,
            height,
        };
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .borders(Borders::ALL)
            .title("Search books by title or author");
        let paragraph = Paragraph::new(Span::raw(format!("Search: {query}"))).block(block.clone());
        frame.render_widget(paragraph, popup_area);

        let inner = block.inner(popup_area);
        let cursor_x = inner.x + "Search: ".len() as u16 + query.chars().count() as u16;
        frame.set_cursor_position((cursor_x.min(inner.right().saturating_sub(1)), inner.y));
    }

    fn draw_about(&self, frame: &mut Frame, area: Rect) {
        let popup_area = centered_rect(50, 35, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title("About").borders(Borders::ALL);
        let lines = vec![
            Line::from(Span::styled(
                APP_TITLE,
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(format!("Version {APP_VERSION}")),
            Line::from(""),
            Line::from("Keeps the book catalogue and staff records."),
            Line::from(format!("Database: {}", self.connection)),
            Line::from(""),
            Line::from(Span::styled(
                "Press Esc to close.",
                Style::default().fg(Color::Gray),
            )),
        ];
        let paragraph = Paragraph::new(lines)
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, popup_area);
    }

    fn draw_confirm_exit(&self, frame: &mut Frame, area: Rect) {
        let popup_area = centered_rect(40, 20, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title("Exit").borders(Borders::ALL);
        let lines = vec![
            Line::from(format!("Exit {APP_TITLE}?")),
            Line::from(""),
            Line::from(Span::styled(
                "Press Y to quit or N / Esc to stay.",
                Style::default().fg(Color::Gray),
            )),
        ];
        let paragraph = Paragraph::new(lines)
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, popup_area);
    }
}

fn form_hint(busy: bool) -> &'static str {
    if busy {
        "Saving..."
    } else {
        "Enter to save • Tab to switch • Esc to cancel"
    }
}

fn empty_panel<'a>(block: Block<'a>, message: &'a str) -> Paragraph<'a> {
    Paragraph::new(Line::from(Span::styled(
        message,
        Style::default().fg(Color::DarkGray),
    )))
    .block(block)
    .alignment(Alignment::Center)
}

fn render_table<'a>(
    frame: &mut Frame,
    area: Rect,
    block: Block<'a>,
    rows: impl IntoIterator<Item = Row<'a>>,
    widths: &[Constraint],
    header: &[&'static str],
    selected: usize,
) {
    let header = Row::new(header.iter().copied()).style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    );
    let table = Table::new(rows, widths.iter().copied())
        .header(header)
        .block(block)
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");

    let mut state = TableState::default().with_selected(Some(selected));
    frame.render_stateful_widget(table, area, &mut state);
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::db::seed_default_admin;
    use crate::error::DbResultExt;

    fn app() -> App {
        let db = Database::in_memory();
        db.with_conn(|conn| seed_default_admin(conn, "admin", "admin123"))
            .unwrap();
        App::new(db)
    }

    /// A staff row whose status label the models cannot read, so every staff
    /// listing fails while writes still go through.
    fn plant_unreadable_staff(app: &App) {
        app.db
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO staff (name, role, hire_date, status)
                     VALUES ('Ghost', 'Clerk', '2020-01-01', 'ON_LEAVE')",
                    [],
                )
                .db_context("plant staff row")
            })
            .unwrap();
    }

    fn status_text(app: &App) -> &str {
        app.status.as_ref().map(|s| s.text.as_str()).unwrap_or("")
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            app.handle_key(KeyCode::Char(ch));
        }
    }

    fn settle(app: &mut App) {
        while app.is_busy() {
            app.poll_pending();
            thread::yield_now();
        }
    }

    fn signed_in() -> App {
        let mut app = app();
        type_text(&mut app, "admin");
        app.handle_key(KeyCode::Tab);
        type_text(&mut app, "admin123");
        app.handle_key(KeyCode::Enter);
        settle(&mut app);
        app
    }

    #[test]
    fn wrong_password_stays_on_login_and_clears_it() {
        let mut app = app();
        type_text(&mut app, "admin");
        app.handle_key(KeyCode::Tab);
        type_text(&mut app, "wrongpass");
        app.handle_key(KeyCode::Enter);
        settle(&mut app);

        let Screen::Login(form) = &app.screen else {
            panic!("expected the login screen");
        };
        assert_eq!(form.error.as_deref(), Some("Invalid username or password."));
        assert!(form.password.is_empty());
        assert!(app.signed_in().is_none());
    }

    #[test]
    fn keys_are_ignored_while_a_task_is_pending() {
        let mut app = app();
        type_text(&mut app, "admin");
        app.handle_key(KeyCode::Tab);
        type_text(&mut app, "admin123");
        app.handle_key(KeyCode::Enter);
        assert!(app.is_busy());

        app.handle_key(KeyCode::Char('x'));
        if let Screen::Login(form) = &app.screen {
            assert_eq!(form.password, "admin123");
        }
        settle(&mut app);
        assert!(matches!(app.screen, Screen::Main));
        assert_eq!(app.signed_in().map(|a| a.username.as_str()), Some("admin"));
        assert!(app.signed_in().and_then(|a| a.last_login).is_some());
    }

    #[test]
    fn adding_a_book_refreshes_list_and_stats() {
        let mut app = signed_in();
        app.handle_key(KeyCode::Char('b'));
        assert!(matches!(app.mode, Mode::AddingBook(_)));

        type_text(&mut app, "Dune");
        app.handle_key(KeyCode::Tab);
        type_text(&mut app, "Frank Herbert");
        app.handle_key(KeyCode::Tab);
        type_text(&mut app, "9780441013593");
        app.handle_key(KeyCode::Enter);
        settle(&mut app);

        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(app.stats.total_books, 1);
        assert_eq!(app.books.current().map(|b| b.title.as_str()), Some("Dune"));
        assert_eq!(app.books.current().map(|b| b.quantity), Some(1));
    }

    #[test]
    fn duplicate_isbn_keeps_the_dialog_open_with_the_error() {
        let mut app = signed_in();
        for title in ["Dune", "Dune Messiah"] {
            app.handle_key(KeyCode::Char('b'));
            type_text(&mut app, title);
            app.handle_key(KeyCode::Tab);
            type_text(&mut app, "Frank Herbert");
            app.handle_key(KeyCode::Tab);
            type_text(&mut app, "9780441013593");
            app.handle_key(KeyCode::Enter);
            settle(&mut app);
        }

        let Mode::AddingBook(form) = &app.mode else {
            panic!("expected the add dialog to stay open");
        };
        assert_eq!(
            form.error.as_deref(),
            Some("A book with ISBN 9780441013593 already exists.")
        );
        assert_eq!(app.stats.total_books, 1);
    }

    #[test]
    fn delete_needs_a_selection() {
        let mut app = signed_in();
        app.handle_key(KeyCode::Char('3'));
        app.handle_key(KeyCode::Char('d'));
        assert!(matches!(app.mode, Mode::Normal));
        assert!(matches!(
            app.status.as_ref().map(|s| &s.kind),
            Some(StatusKind::Error)
        ));
    }

    #[test]
    fn staff_add_then_delete_round_trip() {
        let mut app = signed_in();
        app.handle_key(KeyCode::Char('s'));
        type_text(&mut app, "Grace Hopper");
        app.handle_key(KeyCode::Tab);
        type_text(&mut app, "Archivist");
        app.handle_key(KeyCode::Enter);
        settle(&mut app);
        assert_eq!(app.stats.active_staff, 1);

        app.handle_key(KeyCode::Char('3'));
        app.handle_key(KeyCode::Char('d'));
        assert!(matches!(app.mode, Mode::ConfirmDelete(_)));
        app.handle_key(KeyCode::Char('y'));
        settle(&mut app);

        assert!(matches!(app.mode, Mode::Normal));
        assert!(app.staff.is_empty());
        assert_eq!(app.stats.active_staff, 0);
    }

    #[test]
    fn quitting_asks_first() {
        let mut app = signed_in();
        assert!(!app.handle_key(KeyCode::Char('q')));
        assert!(!app.handle_key(KeyCode::Char('n')));
        assert!(!app.handle_key(KeyCode::Char('q')));
        assert!(app.handle_key(KeyCode::Char('y')));
        app.logout();
        assert!(app.signed_in().is_none());
    }

    #[test]
    fn listing_error_does_not_block_sign_in() {
        let mut app = app();
        plant_unreadable_staff(&app);
        type_text(&mut app, "admin");
        app.handle_key(KeyCode::Tab);
        type_text(&mut app, "admin123");
        app.handle_key(KeyCode::Enter);
        settle(&mut app);

        assert!(matches!(app.screen, Screen::Main));
        assert_eq!(app.signed_in().map(|a| a.username.as_str()), Some("admin"));
        assert!(matches!(
            app.status.as_ref().map(|s| &s.kind),
            Some(StatusKind::Error)
        ));
        assert!(status_text(&app).contains("ON_LEAVE"));
    }

    #[test]
    fn failed_reload_after_insert_closes_the_dialog() {
        let mut app = signed_in();
        plant_unreadable_staff(&app);

        app.handle_key(KeyCode::Char('s'));
        type_text(&mut app, "Grace");
        app.handle_key(KeyCode::Tab);
        type_text(&mut app, "Clerk");
        app.handle_key(KeyCode::Enter);
        settle(&mut app);

        assert!(matches!(app.mode, Mode::Normal));
        assert!(status_text(&app).starts_with("Added staff member Grace."));
        assert!(matches!(
            app.status.as_ref().map(|s| &s.kind),
            Some(StatusKind::Error)
        ));

        app.handle_key(KeyCode::Enter);
        settle(&mut app);
        let graces: i64 = app
            .db
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM staff WHERE name = 'Grace'", [], |row| {
                    row.get(0)
                })
                .db_context("count rows")
            })
            .unwrap();
        assert_eq!(graces, 1);
    }
}
