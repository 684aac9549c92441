//! Domain records that mirror the three SQLite tables. They stay plain data
//! holders; the only behavior is the handful of predicates the panels use to
//! colour rows and the status enums that know how they are spelled on disk.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use thiserror::Error;

/// Raised when a status column holds a label we do not recognise.
#[derive(Debug, Error)]
#[error("unknown status label '{0}'")]
pub struct ParseStatusError(String);

/// Implements text (de)serialization for the status enums so they can be
/// bound and read straight from rusqlite.
macro_rules! status_column {
    ($name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = ParseStatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok(Self::$variant),)+
                    other => Err(ParseStatusError(other.to_string())),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|err| FromSqlError::Other(Box::new(err)))
            }
        }
    };
}

/// Account state for an admin. Only active admins may sign in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdminStatus {
    #[default]
    Active,
    Inactive,
}

status_column!(AdminStatus { Active => "ACTIVE", Inactive => "INACTIVE" });

/// Stock label for a book, always derived from its quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookStatus {
    Available,
    OutOfStock,
}

status_column!(BookStatus { Available => "AVAILABLE", OutOfStock => "OUT_OF_STOCK" });

impl BookStatus {
    /// Recompute the label for a quantity. Every insert and update goes
    /// through here so the stored status never drifts from the stock count.
    pub fn from_quantity(quantity: i64) -> Self {
        if quantity > 0 {
            Self::Available
        } else {
            Self::OutOfStock
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::OutOfStock => "out of stock",
        }
    }
}

/// Employment state for a staff member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaffStatus {
    #[default]
    Active,
    Inactive,
}

status_column!(StaffStatus { Active => "ACTIVE", Inactive => "INACTIVE" });

impl StaffStatus {
    pub fn toggled(self) -> Self {
        match self {
            Self::Active => Self::Inactive,
            Self::Inactive => Self::Active,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// An administrator account. The password hash is kept so the record
/// matches the row, but nothing outside the database ever compares it.
pub struct Admin {
    pub id: i64,
    pub username: String,
    /// Hex-encoded SHA-256 of the password, computed by the `sha2()` SQL
    /// function registered on every connection.
    pub password_hash: String,
    pub created_date: NaiveDateTime,
    /// `None` until the first successful sign-in.
    pub last_login: Option<NaiveDateTime>,
    pub status: AdminStatus,
}

impl Admin {
    pub fn is_active(&self) -> bool {
        self.status == AdminStatus::Active
    }
}

impl fmt::Display for Admin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.username)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A catalogue entry in the `books` table.
pub struct Book {
    /// Primary key. Edit and delete flows carry it back to the persistence
    /// layer even though the table view only shows it as a column.
    pub id: i64,
    pub title: String,
    pub author: String,
    /// Digits only; separators are stripped before the row is written.
    pub isbn: String,
    pub quantity: i64,
    pub date_added: NaiveDateTime,
    pub status: BookStatus,
}

impl Book {
    /// A book can be lent out when copies remain and the stored label agrees.
    pub fn is_available(&self) -> bool {
        self.quantity > 0 && self.status == BookStatus::Available
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A member of the library staff.
pub struct Staff {
    pub id: i64,
    pub name: String,
    pub role: String,
    pub hire_date: NaiveDate,
    pub status: StaffStatus,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Staff {
    pub fn is_active(&self) -> bool {
        self.status == StaffStatus::Active
    }
}

/// Editable book fields, as collected by the book dialog. The status is not
/// part of the input because it is derived from `quantity` on write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookInput {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub quantity: i64,
}

/// Editable staff fields. `status` only matters for updates; inserts always
/// start out active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffInput {
    pub name: String,
    pub role: String,
    pub hire_date: NaiveDate,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: StaffStatus,
}

/// Aggregate numbers shown on the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_books: i64,
    pub active_staff: i64,
}
