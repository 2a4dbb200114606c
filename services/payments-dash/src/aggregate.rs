// services/payments-dash/src/aggregate.rs
//
// Status counts over the current result set, for the bar chart

use svckit::{PaymentRow, PaymentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCount {
    pub status: PaymentStatus,
    pub count: u64,
}

/// One entry per distinct status, in the order statuses first appear.
pub fn status_counts(rows: &[PaymentRow]) -> Vec<StatusCount> {
    let mut counts: Vec<StatusCount> = Vec::with_capacity(PaymentStatus::ALL.len());
    for row in rows {
        match counts.iter().position(|c| c.status == row.payment.status) {
            Some(idx) => counts[idx].count += 1,
            None => counts.push(StatusCount {
                status: row.payment.status,
                count: 1,
            }),
        }
    }
    counts
}

/// Format large numbers with commas
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.insert(0, ',');
        }
        result.insert(0, c);
    }
    result
}
