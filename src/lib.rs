//! Locate signed comments in wiki discussion source.
//!
//! The pipeline is pure and synchronous: [`signature::scan`] recovers the
//! ordered signatures of a text, [`boundary::build`] turns them into comment
//! spans, and [`matcher::match_target`] picks the span a caller's
//! [`types::TargetDescriptor`] refers to. [`locator::locate`] runs it over
//! current page source; [`origin::find_originating_edit`] runs it over the
//! text added by each revision of a page history.

pub mod boundary;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod locator;
pub mod markup;
pub mod mask;
pub mod matcher;
pub mod origin;
pub mod signature;
pub mod timestamp;
pub mod types;
pub mod weights;

pub use config::Config;
pub use error::Error;
pub use locator::{locate, locate_all};
pub use origin::{RevisionDiff, find_originating_edit};
