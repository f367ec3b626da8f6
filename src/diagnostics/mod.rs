pub mod aggregator;
pub mod record;

pub use aggregator::{DiagnosticsAggregator, DiagnosticsSummary};
pub use record::{Finding, LogRecord, ProblemCategory, Severity, Synthesis, VariantScope};
