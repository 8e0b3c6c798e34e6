//! Normalized certificate report.
//!
//! Extraction works on any parsed [`X509Ref`], so the same code serves live
//! inspections and certificates loaded from DER or PEM bytes.

use chrono::{DateTime, SecondsFormat, Utc};
use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::x509::{X509NameRef, X509Ref, X509};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;

use crate::error::InspectionError;

/// Placeholder for certificate fields that are absent.
pub const UNKNOWN: &str = "Unknown";

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Everything reported about one leaf certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateReport {
    /// Subject common name, or the inspected hostname when the subject has none
    pub subject: String,
    /// Issuer organization, else issuer common name, else [`UNKNOWN`]
    pub issuer_name: String,
    /// Start of the validity window
    #[serde(serialize_with = "iso8601")]
    pub valid_from: DateTime<Utc>,
    /// End of the validity window
    #[serde(serialize_with = "iso8601")]
    pub valid_to: DateTime<Utc>,
    /// Whole days until `valid_to`, rounded up. Zero or negative once expired
    pub days_left: i64,
    /// Serial number in uppercase hex
    pub serial_number: String,
    /// SHA-1 fingerprint of the DER encoding
    pub fingerprint: String,
    /// SHA-256 fingerprint of the DER encoding
    pub fingerprint256: String,
    /// Subject common name followed by the DNS subject alternative names
    pub dns_names: Vec<String>,
    /// Revocation is never checked, so this is always false
    pub revoked: bool,
}

impl CertificateReport {
    /// Builds a report from a parsed certificate, computing `days_left`
    /// against the current time.
    ///
    /// ```no_run
    /// # use certinspect::CertificateReport;
    /// # use openssl::x509::X509;
    /// let pem = std::fs::read("cert.pem").unwrap();
    /// let cert = X509::from_pem(&pem).unwrap();
    /// let report = CertificateReport::from_x509("example.com", &cert).unwrap();
    /// println!("{} days left", report.days_left);
    /// ```
    pub fn from_x509(hostname: &str, cert: &X509Ref) -> Result<Self, InspectionError> {
        Self::build(hostname, cert, Utc::now())
    }

    /// Builds a report from a DER-encoded certificate.
    pub fn from_der(hostname: &str, der: &[u8]) -> Result<Self, InspectionError> {
        let cert = X509::from_der(der)
            .map_err(|e| InspectionError::parse(format!("invalid DER certificate: {}", e)))?;
        Self::from_x509(hostname, &cert)
    }

    /// Builds a report from the first certificate of a PEM document.
    pub fn from_pem(hostname: &str, pem: &[u8]) -> Result<Self, InspectionError> {
        let cert = X509::from_pem(pem)
            .map_err(|e| InspectionError::parse(format!("invalid PEM certificate: {}", e)))?;
        Self::from_x509(hostname, &cert)
    }

    /// Whether the certificate is past its `valid_to` date.
    pub fn is_expired(&self) -> bool {
        self.days_left <= 0
    }

    pub(crate) fn from_peer_certificate(
        hostname: &str,
        peer: Option<&X509Ref>,
        now: DateTime<Utc>,
    ) -> Result<Self, InspectionError> {
        match peer {
            Some(cert) => Self::build(hostname, cert, now),
            None => Err(InspectionError::NoCertificate {
                hostname: hostname.to_string(),
            }),
        }
    }

    pub(crate) fn build(
        hostname: &str,
        cert: &X509Ref,
        now: DateTime<Utc>,
    ) -> Result<Self, InspectionError> {
        let common_name = name_entry(cert.subject_name(), Nid::COMMONNAME)?;
        let issuer_name = match name_entry(cert.issuer_name(), Nid::ORGANIZATIONNAME)? {
            Some(organization) => organization,
            None => name_entry(cert.issuer_name(), Nid::COMMONNAME)?
                .unwrap_or_else(|| UNKNOWN.to_string()),
        };

        let valid_from = to_datetime(cert.not_before())?;
        let valid_to = to_datetime(cert.not_after())?;

        let serial_number = cert
            .serial_number()
            .to_bn()
            .and_then(|bn| bn.to_hex_str().map(|hex| hex.to_string()))
            .unwrap_or_else(|_| UNKNOWN.to_string());

        let mut alt_names = Vec::new();
        if let Some(names) = cert.subject_alt_names() {
            for name in names.iter() {
                if let Some(dns) = name.dnsname() {
                    alt_names.push(dns.to_string());
                }
            }
        }

        Ok(CertificateReport {
            subject: common_name
                .clone()
                .unwrap_or_else(|| hostname.to_string()),
            issuer_name,
            valid_from,
            valid_to,
            days_left: days_left(valid_to, now),
            serial_number,
            fingerprint: fingerprint(cert, MessageDigest::sha1()),
            fingerprint256: fingerprint(cert, MessageDigest::sha256()),
            dns_names: dns_names(common_name, alt_names),
            revoked: false,
        })
    }
}

/// Days from `now` until `valid_to`, rounded up.
///
/// A certificate valid for any part of its final day reports 1. One that
/// expired less than a day ago reports 0.
pub fn days_left(valid_to: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (valid_to - now).num_milliseconds();
    let days = millis.div_euclid(MILLIS_PER_DAY);
    if millis.rem_euclid(MILLIS_PER_DAY) == 0 {
        days
    } else {
        days + 1
    }
}

fn dns_names(common_name: Option<String>, alt_names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    common_name
        .into_iter()
        .chain(alt_names)
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

fn name_entry(name: &X509NameRef, nid: Nid) -> Result<Option<String>, InspectionError> {
    match name.entries_by_nid(nid).next() {
        Some(entry) => Ok(Some(entry.data().as_utf8()?.to_string())),
        None => Ok(None),
    }
}

fn to_datetime(time: &Asn1TimeRef) -> Result<DateTime<Utc>, InspectionError> {
    let epoch = Asn1Time::from_unix(0)?;
    let diff = epoch.diff(time)?;
    let seconds = i64::from(diff.days) * 86_400 + i64::from(diff.secs);
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| InspectionError::parse(format!("timestamp out of range: {}", time)))
}

fn fingerprint(cert: &X509Ref, digest: MessageDigest) -> String {
    match cert.digest(digest) {
        Ok(bytes) => bytes
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(":"),
        Err(_) => UNKNOWN.to_string(),
    }
}

fn iso8601<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Millis, true))
}
