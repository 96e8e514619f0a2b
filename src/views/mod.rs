//! Record sets and named inline views
//!
//! A [`View`] is a header plus string records, the unit of work the parallel
//! runner is handed. [`InlineTables`] keeps views registered under names (for
//! example the tables of a `WITH` clause), looked up case-insensitively from the
//! innermost scope outwards.

pub mod inline;
pub mod view;

pub use inline::{InlineQuery, InlineTable, InlineTableMap, InlineTables};
pub use view::View;

/// Errors raised while registering or resolving named views
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    #[error("inline table {0} is redefined")]
    Redefined(String),

    #[error("inline table {0} is undefined")]
    Undefined(String),

    #[error("select query should return exactly {expected} field(s) for inline table {name}, got {actual}")]
    FieldLength {
        name: String,
        expected: usize,
        actual: usize,
    },
}
