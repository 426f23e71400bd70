//! # daybook-recall
//!
//! Temporal bucketing and best-candidate selection engine for daybook.
//!
//! This crate answers the journal's recall queries over any [`EntryStore`]:
//! - all entries of one exact local day
//! - the best entry for "this day" in earlier months of the same year
//! - the best entry for "this day" in each previous year
//! - the single best entry of a day (today summary)
//! - a day-level rollup of a whole month for calendar rendering
//!
//! ## Example
//!
//! ```ignore
//! use daybook_recall::RecallEngine;
//! use daybook_core::CalendarZone;
//! use daybook_db::Database;
//!
//! let db = Database::connect("postgres://...").await?;
//! let zone = CalendarZone::from_name("Asia/Kolkata")?;
//! let engine = RecallEngine::new(db.recall, zone);
//!
//! let years = engine.same_day_previous_years("user_1", 2025, 3, 9).await?;
//! ```

pub mod engine;
pub mod rollup;

// Re-export core types
pub use daybook_core::*;

pub use engine::RecallEngine;
pub use rollup::rollup_days;
