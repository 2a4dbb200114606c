// services/payments-dash/src/mock.rs
//
// In-process payments endpoint for demo mode

use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use svckit::{Payment, PaymentStatus, Result};

use crate::fetcher::{PaymentsBackend, QueryKey};

const FIRST_NAMES: [&str; 12] = [
    "ali", "bianca", "carlos", "dana", "eun-ji", "farah", "gus", "hana", "ivan", "jules", "kenji",
    "lena",
];

const DOMAINS: [&str; 5] = [
    "example.com",
    "mail.test",
    "payments.dev",
    "shop.io",
    "acme.org",
];

/// Serves a generated dataset the way the real endpoint filters it.
pub struct MockBackend {
    payments: Vec<Payment>,
    latency_ms: (u64, u64),
}

impl MockBackend {
    pub fn new(count: usize, seed: u64) -> Self {
        Self {
            payments: generate(count, seed),
            latency_ms: (150, 700),
        }
    }

    /// Same dataset, no simulated latency.
    pub fn instant(count: usize, seed: u64) -> Self {
        Self {
            payments: generate(count, seed),
            latency_ms: (0, 0),
        }
    }

    pub fn len(&self) -> usize {
        self.payments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payments.is_empty()
    }

    fn simulate_latency(&self) {
        let (lo, hi) = self.latency_ms;
        if hi == 0 {
            return;
        }
        let delay = rand::thread_rng().gen_range(lo..=hi);
        thread::sleep(Duration::from_millis(delay));
    }
}

impl PaymentsBackend for MockBackend {
    fn fetch(&self, key: &QueryKey) -> Result<Vec<Payment>> {
        self.simulate_latency();

        let needle = key.search.to_lowercase();
        Ok(self
            .payments
            .iter()
            .filter(|p| key.status.matches(p.status))
            .filter(|p| needle.is_empty() || p.email.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }
}

fn generate(count: usize, seed: u64) -> Vec<Payment> {
    let mut rng = StdRng::seed_from_u64(seed);

    (0..count)
        .map(|i| {
            let name = FIRST_NAMES[rng.gen_range(0..FIRST_NAMES.len())];
            let domain = DOMAINS[rng.gen_range(0..DOMAINS.len())];
            // Weighted towards success, like a healthy payments feed
            let status = match rng.gen_range(0..100) {
                0..=59 => PaymentStatus::Success,
                60..=74 => PaymentStatus::Processing,
                75..=89 => PaymentStatus::Pending,
                _ => PaymentStatus::Failed,
            };
            let month = rng.gen_range(1..=12);
            let day = rng.gen_range(1..=28);

            Payment {
                id: format!("pay_{:06}", i + 1),
                amount: rng.gen_range(5..2_000) as f64,
                status,
                email: format!("{}{}@{}", name, rng.gen_range(1..100), domain),
                date: format!("2024-{:02}-{:02}", month, day),
            }
        })
        .collect()
}
