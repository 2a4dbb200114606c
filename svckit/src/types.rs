use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a payment as reported by the payments endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Pending,
        PaymentStatus::Processing,
        PaymentStatus::Success,
        PaymentStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "processing" => Ok(PaymentStatus::Processing),
            "success" => Ok(PaymentStatus::Success),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(format!("unknown payment status '{}'", other)),
        }
    }
}

/// Status dropdown value: either every status or exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(PaymentStatus),
}

impl StatusFilter {
    /// Dropdown order: all, success, pending, processing, failed.
    pub const CHOICES: [StatusFilter; 5] = [
        StatusFilter::All,
        StatusFilter::Only(PaymentStatus::Success),
        StatusFilter::Only(PaymentStatus::Pending),
        StatusFilter::Only(PaymentStatus::Processing),
        StatusFilter::Only(PaymentStatus::Failed),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Only(status) => status.as_str(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusFilter::All => "All Status",
            StatusFilter::Only(PaymentStatus::Success) => "Success",
            StatusFilter::Only(PaymentStatus::Pending) => "Pending",
            StatusFilter::Only(PaymentStatus::Processing) => "Processing",
            StatusFilter::Only(PaymentStatus::Failed) => "Failed",
        }
    }

    pub fn matches(&self, status: PaymentStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => *wanted == status,
        }
    }

    pub fn next(&self) -> StatusFilter {
        let idx = self.choice_index();
        Self::CHOICES[(idx + 1) % Self::CHOICES.len()]
    }

    pub fn prev(&self) -> StatusFilter {
        let idx = self.choice_index();
        Self::CHOICES[(idx + Self::CHOICES.len() - 1) % Self::CHOICES.len()]
    }

    fn choice_index(&self) -> usize {
        Self::CHOICES.iter().position(|c| c == self).unwrap_or(0)
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(StatusFilter::All);
        }
        s.parse::<PaymentStatus>().map(StatusFilter::Only)
    }
}

/// Payment record as returned by `GET /api/payments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub amount: f64,
    pub status: PaymentStatus,
    pub email: String,
    pub date: String,
}

/// A payment plus its 1-based position in the result set it arrived in.
///
/// `no` is recomputed on every fetch and only means something for display.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRow {
    pub no: usize,
    pub payment: Payment,
}

impl PaymentRow {
    /// Assign ordinals by arrival order.
    pub fn number(payments: Vec<Payment>) -> Vec<PaymentRow> {
        payments
            .into_iter()
            .enumerate()
            .map(|(idx, payment)| PaymentRow { no: idx + 1, payment })
            .collect()
    }
}
