//! Google Sheets API client and authentication.
//!
//! This module provides the [`SheetsClient`] for appending to a worksheet,
//! along with the credentials it authenticates with ([`Auth`]).

mod auth;
mod sheets;

pub use auth::{Auth, ServiceAccountKey};
pub use sheets::{SheetsClient, Spreadsheet};
