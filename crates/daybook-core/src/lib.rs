//! # daybook-core
//!
//! Core types, traits, and abstractions for daybook.
//!
//! This crate provides the calendar key derivation, the entry read model,
//! the best-entry ranking function, and the collaborator traits that the
//! other daybook crates depend on.

pub mod calendar;
pub mod error;
pub mod logging;
pub mod models;
pub mod ranking;
pub mod traits;

// Re-export commonly used types at crate root
pub use calendar::{
    month_date_range, CalendarDate, CalendarZone, DayMonthKey, DEFAULT_JOURNAL_TIMEZONE,
};
pub use error::{Error, Result};
pub use models::{
    AccessToken, AuthClaims, CalendarDay, CreateTokenRequest, CreateTokenResponse, Entry, NewEntry,
    Role, StoredEntry, UpdateEntry, User,
};
pub use ranking::{best_entry, compare_best_first, sort_best_first};
pub use traits::{
    EntryRepository, EntryStore, MediaAsset, MediaStore, MediaVariant, TokenVerifier,
    UserRepository,
};
