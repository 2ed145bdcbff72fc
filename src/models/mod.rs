pub mod account;
pub mod report;
pub mod row;

pub use account::{normalize_resource_id, normalize_timestamp, Account, Property};
pub use report::{DateRange, Report, USAGE_DIMENSIONS, USAGE_METRICS};
pub use row::{
    AnalyticsRow, FailureKind, PropertyReport, ReportBatch, ReportFailure, ReportOutcome,
    RowError,
};
