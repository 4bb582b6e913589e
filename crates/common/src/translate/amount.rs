// Currency amount bounds, in the smallest units of the currency.

use tracing::error;

use crate::error::ClientError;

/// Largest accepted absolute amount.
pub const MAX_AMOUNT: i64 = 999_999_999_999;

/// Value substituted for out-of-range amounts received from the server.
pub const CLAMPED_AMOUNT: i64 = 1 << 40;

/// Maximum number of suggested tip amounts exposed to callers.
pub const MAX_SUGGESTED_TIP_AMOUNTS: usize = 4;

#[must_use]
pub fn check_currency_amount(amount: i64) -> bool {
    amount.unsigned_abs() <= MAX_AMOUNT.unsigned_abs()
}

/// Corrects an out-of-range amount received from the server to `±2^40`,
/// keeping its sign.
pub fn clamp_remote_amount(amount: i64, what: &str) -> i64 {
    if check_currency_amount(amount) {
        return amount;
    }
    error!(amount, what, "received invalid currency amount");
    if amount < 0 { -CLAMPED_AMOUNT } else { CLAMPED_AMOUNT }
}

/// Tip amounts are never negative; invalid ones become zero.
pub fn clean_remote_tip_amount(amount: i64, what: &str) -> i64 {
    if amount < 0 || !check_currency_amount(amount) {
        error!(amount, what, "received invalid tip amount");
        return 0;
    }
    amount
}

pub fn clean_suggested_tip_amounts(mut amounts: Vec<i64>) -> Vec<i64> {
    amounts.retain(|&amount| amount >= 0 && check_currency_amount(amount));
    amounts.truncate(MAX_SUGGESTED_TIP_AMOUNTS);
    amounts
}

/// Validates a caller-supplied amount before it is sent.
pub fn validate_amount(amount: i64) -> Result<i64, ClientError> {
    if check_currency_amount(amount) {
        Ok(amount)
    } else {
        Err(ClientError::validation("Too big amount of the currency specified"))
    }
}
