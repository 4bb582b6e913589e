// Protocol Translation Layer: stateless mapping and validation between the
// external shapes callers use and the wire shapes the server speaks.
//
// Caller mistakes become 400 validation errors. Server data that parses but
// is out of domain is corrected here and logged, never surfaced.

pub mod amount;
pub mod notification_settings;
pub mod payments;
pub mod text;

pub use amount::{check_currency_amount, clamp_remote_amount, validate_amount};
pub use text::{clean_input_string, require_clean};
