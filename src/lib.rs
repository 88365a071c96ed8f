pub mod app;
pub mod domain;
pub mod error;
pub mod infra;
pub mod storage;
pub mod transport;

// Convenience re-exports (keeps call-sites clean)
pub use app::table_service::{RowsPage, TableEditorService};
pub use domain::metadata::{Column, Table};
pub use domain::query::QueryOptions;
pub use domain::value::{Row, SqlValue, ValueMap};
pub use error::{EditorError, EditorResult};
