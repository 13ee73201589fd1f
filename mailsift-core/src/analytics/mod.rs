//! Analytics for mailsift
//!
//! Derived statistics over the aggregation store: totals, top senders,
//! priority/action/category distributions, the weighted average priority,
//! and the time-bucketed views (7-day timeline, hourly histogram,
//! response-urgency breakdown).
//!
//! All of it is read-only and referentially transparent: a [`Report`] is a
//! pure function of the collection contents plus an explicit `now`.

pub mod report;

pub use report::{snapshot, Report, UrgencyBreakdown};
