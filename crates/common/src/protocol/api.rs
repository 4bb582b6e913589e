// External (application-facing) shapes accepted from and returned to callers.

use serde::{Deserialize, Serialize};

use crate::types::{DialogId, MessageId, UserId};

// ── Payments ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabeledPricePart {
    pub label: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Invoice {
    pub currency: String,
    pub price_parts: Vec<LabeledPricePart>,
    pub max_tip_amount: i64,
    pub suggested_tip_amounts: Vec<i64>,
    pub recurring_payment_terms_of_service_url: String,
    pub is_test: bool,
    pub need_name: bool,
    pub need_phone_number: bool,
    pub need_email_address: bool,
    pub need_shipping_address: bool,
    pub send_phone_number_to_provider: bool,
    pub send_email_address_to_provider: bool,
    pub is_flexible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentProvider {
    SmartGlocal {
        public_token: String,
    },
    Stripe {
        publishable_key: String,
        need_country: bool,
        need_postal_code: bool,
        need_cardholder_name: bool,
    },
    Other {
        url: String,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentOption {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    pub country_code: String,
    pub state: String,
    pub city: String,
    pub street_line1: String,
    pub street_line2: String,
    pub postal_code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderInfo {
    pub name: String,
    pub phone_number: String,
    pub email_address: String,
    pub shipping_address: Option<Address>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShippingOption {
    pub id: String,
    pub title: String,
    pub price_parts: Vec<LabeledPricePart>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedCredentials {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductInfo {
    pub title: String,
    pub description: String,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentForm {
    pub id: i64,
    pub invoice: Invoice,
    pub seller_bot_user_id: UserId,
    pub payment_provider_user_id: UserId,
    pub payment_provider: PaymentProvider,
    pub additional_payment_options: Vec<PaymentOption>,
    pub saved_order_info: Option<OrderInfo>,
    pub saved_credentials: Vec<SavedCredentials>,
    pub can_save_credentials: bool,
    pub need_password: bool,
    pub product_info: ProductInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidatedOrderInfo {
    pub order_info_id: String,
    pub shipping_options: Vec<ShippingOption>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentResult {
    pub success: bool,
    pub verification_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub product_info: ProductInfo,
    pub date: i32,
    pub seller_bot_user_id: UserId,
    pub payment_provider_user_id: UserId,
    pub invoice: Invoice,
    pub order_info: Option<OrderInfo>,
    pub shipping_option: Option<ShippingOption>,
    pub credentials_title: String,
    pub tip_amount: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BankCardActionOpenUrl {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BankCardInfo {
    pub title: String,
    pub actions: Vec<BankCardActionOpenUrl>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputInvoice {
    Message { chat_id: DialogId, message_id: MessageId },
    Name { name: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputCredentials {
    Saved { saved_credentials_id: String },
    New { data: String, allow_save: bool },
    ApplePay { data: String },
    GooglePay { data: String },
}

/// Colors are `0xRRGGBB` integers.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThemeParameters {
    pub background_color: i32,
    pub secondary_background_color: i32,
    pub text_color: i32,
    pub hint_color: i32,
    pub link_color: i32,
    pub button_color: i32,
    pub button_text_color: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputMessageInvoice {
    pub invoice: Invoice,
    pub title: String,
    pub description: String,
    pub photo_url: String,
    pub photo_size: i32,
    pub photo_width: i32,
    pub photo_height: i32,
    pub payload: Vec<u8>,
    pub provider_token: String,
    pub provider_data: String,
    pub start_parameter: String,
}

// ── Notification settings ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatNotificationSettings {
    pub use_default_mute_for: bool,
    pub mute_for: i32,
    pub use_default_sound: bool,
    pub sound_id: i64,
    pub use_default_show_preview: bool,
    pub show_preview: bool,
    pub use_default_disable_pinned_message_notifications: bool,
    pub disable_pinned_message_notifications: bool,
    pub use_default_disable_mention_notifications: bool,
    pub disable_mention_notifications: bool,
}
