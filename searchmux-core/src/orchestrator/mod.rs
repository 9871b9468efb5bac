//! Fan-out and merge stages of a search.
//!
//! [`dispatch`] invokes eligible engines concurrently under timeouts and a
//! request deadline, reporting each outcome to the health tracker.
//! [`merge`] deduplicates and ranks the hits that came back, using
//! [`url_normalize`] for identity and [`scoring`] for order.

pub mod dispatch;
pub mod merge;
pub mod scoring;
pub mod url_normalize;
