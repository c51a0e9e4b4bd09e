//! Deterministic synthetic market data.

use backlab_core::feed::Bar;
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generates `count` daily bars as a seeded random walk.
///
/// Bars land on weekdays from 2020-01-02 onward with midnight stamps. The
/// same seed always produces the same bars, which keeps run IDs honest: a
/// config hash pins its data along with its parameters.
pub fn generate_bars(seed: u64, count: usize, start_price: f64) -> Vec<Bar> {
    // Widen the seed through blake3 so nearby seeds do not walk alike.
    let hash = blake3::hash(&seed.to_le_bytes());
    let mut rng = StdRng::from_seed(*hash.as_bytes());

    let mut bars = Vec::with_capacity(count);
    let mut price = start_price;
    let mut current = NaiveDate::from_ymd_opt(2020, 1, 2).expect("valid calendar date");

    while bars.len() < count {
        let weekday = current.weekday();
        if weekday == Weekday::Sat || weekday == Weekday::Sun {
            current += Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000.0..5_000_000.0);

        bars.push(Bar {
            datetime: current.and_time(NaiveTime::MIN),
            open,
            high,
            low,
            close,
            volume,
            openinterest: 0.0,
        });

        price = close;
        current += Duration::days(1);
    }

    bars
}
