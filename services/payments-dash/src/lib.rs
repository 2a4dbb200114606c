// services/payments-dash/src/lib.rs
//
// Payments dashboard - library exports
//

pub mod aggregate;
pub mod api;
pub mod debounce;
pub mod fetcher;
pub mod location;
pub mod mock;
pub mod state;
pub mod table;
pub mod window;

pub use fetcher::{FetchEvent, PaymentsBackend, QueryClient, QueryKey};
pub use location::FilterLocation;
pub use state::DashboardState;
