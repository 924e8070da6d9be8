//! Content assembly pipeline.
//!
//! Backend revisions have returned preview data nested under different
//! optional keys. Rather than scattered optional-chaining fallbacks, the
//! pipeline evaluates one declarative precedence table (field → ordered
//! source paths) with a single generic resolver, then:
//!
//! - passes `memo_data` through, or synthesizes it from full-artifact
//!   intelligence counts;
//! - carries the cross-border audit summary verbatim, or synthesizes it
//!   from the wealth-projection starting position and the optional
//!   real-asset audit;
//! - gates the theoretical tax-savings display;
//! - derives the adverse-framing ("via negativa") context for
//!   do-not-proceed verdicts.
//!
//! The pipeline never fails: any missing optional input yields an absent
//! downstream field, and presentation omits sections with absent data.

pub mod cross_border;
pub mod memo;
pub mod merge;
pub mod via_negativa;

pub use memo::{AssembledMemoData, IntelligenceSources, assemble};
pub use merge::{MERGE_FIELDS, is_present, resolve_field};
pub use via_negativa::{DO_NOT_PROCEED, FailureGates, ViaNegativa};
