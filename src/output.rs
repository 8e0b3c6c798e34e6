//! Rendering of inspection outcomes for the command line.

use comfy_table::Table;
use serde::Serialize;

use crate::error::InspectionError;
use crate::report::CertificateReport;

/// Why a host produced no report.
#[derive(Debug)]
pub enum Failure {
    /// The inspector ran and reported an error
    Inspection(InspectionError),
    /// The host argument was empty after normalization
    MissingParameter,
    /// Something unexpected went wrong outside the inspector
    Internal,
}

impl Failure {
    /// Tag shown to users next to the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Failure::Inspection(e) => e.kind().into(),
            Failure::MissingParameter => "MissingParameter",
            Failure::Internal => "InternalFailure",
        }
    }

    /// User-facing message. Internal failures carry no details.
    pub fn message(&self) -> String {
        match self {
            Failure::Inspection(e) => e.to_string(),
            Failure::MissingParameter => "Domain parameter is required".to_string(),
            Failure::Internal => "Internal error".to_string(),
        }
    }
}

impl From<InspectionError> for Failure {
    fn from(e: InspectionError) -> Self {
        Failure::Inspection(e)
    }
}

/// Result of inspecting one host as given on the command line.
#[derive(Debug)]
pub struct Outcome {
    /// Host as the user typed it
    pub host: String,
    /// Report, or the reason there is none
    pub result: Result<CertificateReport, Failure>,
}

impl Outcome {
    /// True when the certificate is expired or no report was produced.
    pub fn is_failure(&self) -> bool {
        match &self.result {
            Ok(report) => report.is_expired(),
            Err(_) => true,
        }
    }

    fn envelope(&self) -> Envelope<'_> {
        match &self.result {
            Ok(report) => Envelope {
                success: true,
                host: &self.host,
                report: Some(report),
                kind: None,
                error: None,
            },
            Err(failure) => Envelope {
                success: false,
                host: &self.host,
                report: None,
                kind: Some(failure.kind()),
                error: Some(failure.message()),
            },
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    success: bool,
    host: &'a str,
    #[serde(flatten)]
    report: Option<&'a CertificateReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Pretty JSON array with one envelope per outcome.
pub fn render_json(outcomes: &[Outcome]) -> Result<String, serde_json::Error> {
    let envelopes: Vec<Envelope> = outcomes.iter().map(Outcome::envelope).collect();
    serde_json::to_string_pretty(&envelopes)
}

/// One block of text per outcome.
pub fn render_text(outcomes: &[Outcome]) -> String {
    let mut out = String::new();
    for outcome in outcomes {
        out.push_str("--------------------------------------\n");
        out.push_str(&format!("Hostname: {}\n", outcome.host));
        match &outcome.result {
            Ok(cert) => {
                out.push_str(&format!("Subject: {}\n", cert.subject));
                out.push_str(&format!("Issuer: {}\n", cert.issuer_name));
                out.push_str(&format!("Valid from: {}\n", cert.valid_from.to_rfc3339()));
                out.push_str(&format!("Valid to: {}\n", cert.valid_to.to_rfc3339()));
                out.push_str(&format!("Days left: {}\n", cert.days_left));
                out.push_str(&format!("Expired: {}\n", cert.is_expired()));
                out.push_str(&format!("Serial number: {}\n", cert.serial_number));
                out.push_str(&format!("Fingerprint (SHA-1): {}\n", cert.fingerprint));
                out.push_str(&format!("Fingerprint (SHA-256): {}\n", cert.fingerprint256));
                out.push_str("DNS names:\n");
                for name in &cert.dns_names {
                    out.push_str(&format!("\t{}\n", name));
                }
            }
            Err(failure) => {
                out.push_str(&format!("Error ({}): {}\n", failure.kind(), failure.message()));
            }
        }
    }
    out
}

/// A table with one row per outcome.
pub fn render_summary(outcomes: &[Outcome]) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Host", "Subject", "Issuer", "Valid to", "Days left", "Status"]);
    for outcome in outcomes {
        match &outcome.result {
            Ok(cert) => {
                let status = if cert.is_expired() { "Expired" } else { "Valid" };
                table.add_row(vec![
                    outcome.host.clone(),
                    cert.subject.clone(),
                    cert.issuer_name.clone(),
                    cert.valid_to.format("%Y-%m-%d").to_string(),
                    cert.days_left.to_string(),
                    status.to_string(),
                ]);
            }
            Err(failure) => {
                table.add_row(vec![
                    outcome.host.clone(),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                    failure.kind().to_string(),
                ]);
            }
        }
    }
    table.to_string()
}
