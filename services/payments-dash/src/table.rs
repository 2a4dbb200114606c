// services/payments-dash/src/table.rs
//
// Table model: column definitions, cell rendering and sort state

use std::cmp::Ordering;

use svckit::{PaymentRow, PaymentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    No,
    Email,
    Amount,
    Status,
}

impl Column {
    pub const ALL: [Column; 4] = [Column::No, Column::Email, Column::Amount, Column::Status];

    pub fn header(&self) -> &'static str {
        match self {
            Column::No => "No",
            Column::Email => "Email",
            Column::Amount => "Amount",
            Column::Status => "Status",
        }
    }

    /// Width in pixels of the reference layout; the terminal scales these down.
    pub fn size(&self) -> u16 {
        match self {
            Column::No => 80,
            Column::Email => 220,
            Column::Amount => 100,
            Column::Status => 120,
        }
    }

    /// Only the email column exposes a sort toggle.
    pub fn is_user_sortable(&self) -> bool {
        matches!(self, Column::Email)
    }

    fn compare(&self, a: &PaymentRow, b: &PaymentRow) -> Ordering {
        match self {
            Column::No => a.no.cmp(&b.no),
            Column::Email => natural_cmp(&a.payment.email, &b.payment.email),
            Column::Amount => a
                .payment
                .amount
                .partial_cmp(&b.payment.amount)
                .unwrap_or(Ordering::Equal),
            Column::Status => a.payment.status.as_str().cmp(b.payment.status.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSort {
    pub column: Column,
    pub direction: SortDirection,
}

/// Ordered sort chain; the first entry is the primary key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortState {
    sorts: Vec<ColumnSort>,
}

impl SortState {
    pub fn new(sorts: Vec<ColumnSort>) -> Self {
        Self { sorts }
    }

    pub fn sorts(&self) -> &[ColumnSort] {
        &self.sorts
    }

    pub fn is_empty(&self) -> bool {
        self.sorts.is_empty()
    }

    pub fn direction(&self, column: Column) -> Option<SortDirection> {
        self.sorts
            .iter()
            .find(|s| s.column == column)
            .map(|s| s.direction)
    }

    /// Header activation: ascending becomes descending, anything else becomes
    /// ascending. Replaces the whole chain with this column.
    pub fn toggle(&mut self, column: Column) {
        let direction = match self.direction(column) {
            Some(SortDirection::Asc) => SortDirection::Desc,
            _ => SortDirection::Asc,
        };
        self.sorts = vec![ColumnSort { column, direction }];
    }

    fn compare(&self, a: &PaymentRow, b: &PaymentRow) -> Ordering {
        for sort in &self.sorts {
            let ord = sort.column.compare(a, b);
            let ord = match sort.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

/// Row indices of `rows` in display order. Ties keep arrival order.
pub fn sorted_indices(rows: &[PaymentRow], sort: &SortState) -> Vec<usize> {
    let mut order: Vec<usize> = (0..rows.len()).collect();
    if !sort.is_empty() {
        order.sort_by(|&a, &b| sort.compare(&rows[a], &rows[b]));
    }
    order
}

/// Case-insensitive ordering in which digit runs compare by value, so
/// `ali2@x.com` sorts before `ali12@x.com`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let mut left = chunks(&a).into_iter();
    let mut right = chunks(&b).into_iter();

    loop {
        let ord = match (left.next(), right.next()) {
            (None, None) => return a.cmp(&b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => compare_chunk(x, y),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
}

// Maximal runs of ASCII digits and of everything else
fn chunks(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_digits = None;
    for (i, c) in s.char_indices() {
        let digit = c.is_ascii_digit();
        if in_digits.is_some_and(|d| d != digit) {
            out.push(&s[start..i]);
            start = i;
        }
        in_digits = Some(digit);
    }
    if start < s.len() {
        out.push(&s[start..]);
    }
    out
}

fn compare_chunk(x: &str, y: &str) -> Ordering {
    let numeric = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if numeric(x) && numeric(y) {
        let x = x.trim_start_matches('0');
        let y = y.trim_start_matches('0');
        x.len().cmp(&y.len()).then_with(|| x.cmp(y))
    } else {
        x.cmp(y)
    }
}

/// Visual class of the status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeClass {
    Green,
    Red,
    Slate,
}

pub fn badge_class(status: PaymentStatus) -> BadgeClass {
    match status {
        PaymentStatus::Success => BadgeClass::Green,
        PaymentStatus::Failed => BadgeClass::Red,
        _ => BadgeClass::Slate,
    }
}

/// `$` followed by the shortest decimal form of the amount.
pub fn format_amount(amount: f64) -> String {
    format!("${}", amount)
}

/// Rendered text of one cell.
pub fn cell_text(row: &PaymentRow, column: Column) -> String {
    match column {
        Column::No => row.no.to_string(),
        Column::Email => row.payment.email.clone(),
        Column::Amount => format_amount(row.payment.amount),
        Column::Status => row.payment.status.to_string(),
    }
}
