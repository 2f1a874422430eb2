#![allow(dead_code)]
pub mod app;
pub mod fake_mailer;
pub mod mock_output;
pub mod mock_ws;

use brandwatch::pipeline::DetectionContext;
use brandwatch::scoring::ScoringPolicy;
use brandwatch::watchlist::{BrandSet, Whitelist};
use chrono::{DateTime, TimeZone, Utc};

/// Detection inputs used by most tests: two brands and one whitelisted domain.
pub fn test_context() -> DetectionContext {
    DetectionContext::new(
        BrandSet::new(["paypal", "apple"]).unwrap(),
        Whitelist::new(["google.com"]),
        ScoringPolicy::default(),
    )
}

/// A fixed point in time so cooldown arithmetic is reproducible.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 5, 12, 0, 0).unwrap()
}
