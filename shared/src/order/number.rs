//! Order number generation and classification
//!
//! Format: `<PREFIX>-<YYYYMMDD>-<SUFFIX>`, e.g. `DEL-20261018-7KQ2XM`.
//!
//! | Prefix | Origin |
//! |--------|--------|
//! | `DEL` | Orders created through the business portal |
//! | `MKT` | Orders imported from the marketplace |
//! | `SHD` | Orders that exist only on the dispatch provider |

use chrono::NaiveDate;
use rand::Rng;

use super::types::OrderSource;

const SUFFIX_LEN: usize = 6;

/// No 0/O or 1/I, so numbers can be read back over the phone
const SUFFIX_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

impl OrderSource {
    /// Order number prefix for this origin
    pub fn prefix(&self) -> &'static str {
        match self {
            OrderSource::InternalDelivery => "DEL",
            OrderSource::Marketplace => "MKT",
            OrderSource::ProviderNative => "SHD",
        }
    }
}

/// Generate a new order number for `origin` dated `reference_date`
///
/// Uniqueness is probabilistic (32^6 suffixes per origin per day) and is
/// not checked against existing orders.
pub fn generate(origin: OrderSource, reference_date: NaiveDate) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_CHARSET[rng.gen_range(0..SUFFIX_CHARSET.len())] as char)
        .collect();
    format!(
        "{}-{}-{}",
        origin.prefix(),
        reference_date.format("%Y%m%d"),
        suffix
    )
}

/// Determine which system an order number originated from
///
/// Never fails: anything without a recognized prefix (bare numeric ids
/// included) is treated as an internal delivery order.
pub fn classify(order_number: &str) -> OrderSource {
    let trimmed = order_number.trim();
    let head = trimmed
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();

    match head.as_str() {
        "MKT" => OrderSource::Marketplace,
        "SHD" => OrderSource::ProviderNative,
        _ => OrderSource::InternalDelivery,
    }
}

/// Whether `value` starts with one of the order number prefixes
pub fn has_origin_prefix(value: &str) -> bool {
    let origin = classify(value);
    value
        .trim()
        .split(['-', '_'])
        .next()
        .is_some_and(|head| head.eq_ignore_ascii_case(origin.prefix()))
}
