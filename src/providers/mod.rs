pub mod exchangerate_api;
pub mod limiter;
pub mod util;

pub use exchangerate_api::ExchangeRateApiProvider;
pub use limiter::TokenBucketLimiter;
pub use util::{RetryPolicy, with_retry};
