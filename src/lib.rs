//! Inspect the TLS certificate a host presents.
//!
//! ```no_run
//! let report = certinspect::inspect("example.com")?;
//! println!("{} expires in {} days", report.subject, report.days_left);
//! # Ok::<(), certinspect::InspectionError>(())
//! ```
//!
//! Verification is disabled for every connection, so self-signed and expired
//! certificates are reported rather than rejected. See [`Inspector`].

pub mod config;
pub mod error;
pub mod host;
pub mod inspector;
pub mod output;
pub mod report;

pub use error::{ErrorKind, InspectionError};
pub use inspector::Inspector;
pub use report::CertificateReport;

/// Inspects `hostname` on port 443 with the default 10 second timeout.
pub fn inspect(hostname: &str) -> Result<CertificateReport, InspectionError> {
    Inspector::default().inspect(hostname)
}
