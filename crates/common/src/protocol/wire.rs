// Wire-side shapes exchanged with the remote service.
//
// These mirror what the transport encodes; the byte layout itself belongs
// to the transport. Flag words keep the server's bit assignments.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Shared ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataJson {
    pub data: String,
}

impl DataJson {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }
}

/// Peer reference with the access hash the server requires.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputPeer {
    pub peer_id: i64,
    pub access_hash: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebDocument {
    pub url: String,
    pub size: i32,
    pub mime_type: String,
    #[serde(default)]
    pub width: i32,
    #[serde(default)]
    pub height: i32,
}

// ── Invoices and prices ────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabeledPrice {
    pub label: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Invoice {
    pub flags: u32,
    pub currency: String,
    pub prices: Vec<LabeledPrice>,
    #[serde(default)]
    pub max_tip_amount: i64,
    #[serde(default)]
    pub suggested_tip_amounts: Vec<i64>,
    #[serde(default)]
    pub recurring_terms_url: String,
}

impl Invoice {
    pub const TEST_MASK: u32 = 1 << 0;
    pub const NAME_REQUESTED_MASK: u32 = 1 << 1;
    pub const PHONE_REQUESTED_MASK: u32 = 1 << 2;
    pub const EMAIL_REQUESTED_MASK: u32 = 1 << 3;
    pub const SHIPPING_ADDRESS_REQUESTED_MASK: u32 = 1 << 4;
    pub const FLEXIBLE_MASK: u32 = 1 << 5;
    pub const PHONE_TO_PROVIDER_MASK: u32 = 1 << 6;
    pub const EMAIL_TO_PROVIDER_MASK: u32 = 1 << 7;
    pub const MAX_TIP_AMOUNT_MASK: u32 = 1 << 8;
    pub const RECURRING_MASK: u32 = 1 << 9;

    pub fn has(&self, mask: u32) -> bool {
        self.flags & mask != 0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostAddress {
    pub street_line1: String,
    pub street_line2: String,
    pub city: String,
    pub state: String,
    pub country_iso2: String,
    pub post_code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentRequestedInfo {
    pub flags: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<PostAddress>,
}

impl PaymentRequestedInfo {
    pub const NAME_MASK: u32 = 1 << 0;
    pub const PHONE_MASK: u32 = 1 << 1;
    pub const EMAIL_MASK: u32 = 1 << 2;
    pub const SHIPPING_ADDRESS_MASK: u32 = 1 << 3;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShippingOption {
    pub id: String,
    pub title: String,
    pub prices: Vec<LabeledPrice>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentSavedCredentialsCard {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentFormMethod {
    pub url: String,
    pub title: String,
}

/// Which invoice a payment call is about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputInvoice {
    Message { peer: InputPeer, msg_id: i32 },
    Slug { slug: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputPaymentCredentials {
    Saved { id: String, tmp_password: Vec<u8> },
    New { save: bool, data: DataJson },
    ApplePay { payment_data: DataJson },
    GooglePay { payment_token: DataJson },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputWebDocument {
    pub url: String,
    pub size: i32,
    pub mime_type: String,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputMediaInvoice {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<InputWebDocument>,
    pub invoice: Invoice,
    pub payload: Vec<u8>,
    pub provider: String,
    pub provider_data: DataJson,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_param: Option<String>,
}

// ── Payment responses ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentForm {
    pub form_id: i64,
    pub bot_id: i64,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub photo: Option<WebDocument>,
    pub invoice: Invoice,
    pub provider_id: i64,
    pub url: String,
    #[serde(default)]
    pub native_provider: Option<String>,
    #[serde(default)]
    pub native_params: Option<DataJson>,
    #[serde(default)]
    pub additional_methods: Vec<PaymentFormMethod>,
    #[serde(default)]
    pub saved_info: Option<PaymentRequestedInfo>,
    #[serde(default)]
    pub saved_credentials: Vec<PaymentSavedCredentialsCard>,
    #[serde(default)]
    pub can_save_credentials: bool,
    #[serde(default)]
    pub password_missing: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidatedRequestedInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub shipping_options: Vec<ShippingOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentResult {
    /// Payment accepted; `updates` must be applied before reporting success.
    Accepted { updates: Value },
    VerificationNeeded { url: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub date: i32,
    pub bot_id: i64,
    pub provider_id: i64,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub photo: Option<WebDocument>,
    pub invoice: Invoice,
    #[serde(default)]
    pub info: Option<PaymentRequestedInfo>,
    #[serde(default)]
    pub shipping: Option<ShippingOption>,
    #[serde(default)]
    pub tip_amount: i64,
    pub currency: String,
    pub total_amount: i64,
    pub credentials_title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedInfo {
    #[serde(default)]
    pub saved_info: Option<PaymentRequestedInfo>,
    #[serde(default)]
    pub has_saved_credentials: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportedInvoice {
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BankCardOpenUrl {
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BankCardData {
    pub title: String,
    #[serde(default)]
    pub open_urls: Vec<BankCardOpenUrl>,
}

// ── Payment requests ───────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetBotShippingResults {
    pub query_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_options: Option<Vec<ShippingOption>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetBotPrecheckoutResults {
    pub query_id: i64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetPaymentForm {
    pub invoice: InputInvoice,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_params: Option<DataJson>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidateRequestedInfo {
    pub save: bool,
    pub invoice: InputInvoice,
    pub info: PaymentRequestedInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendPaymentForm {
    pub form_id: i64,
    pub invoice: InputInvoice,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_info_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_option_id: Option<String>,
    pub credentials: InputPaymentCredentials,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip_amount: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetPaymentReceipt {
    pub peer: InputPeer,
    pub msg_id: i32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClearSavedInfo {
    pub credentials: bool,
    pub info: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportInvoice {
    pub invoice_media: InputMediaInvoice,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetBankCardData {
    pub number: String,
}

// ── Speech recognition ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranscribeAudio {
    pub peer: InputPeer,
    pub msg_id: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateTranscribedAudio {
    pub peer: InputPeer,
    pub msg_id: i32,
    pub transcription_id: i64,
    pub good: bool,
}

/// Result of `messages.transcribeAudio` and payload of the
/// `updateTranscribedAudio` push.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateTranscribedAudio {
    pub transcription_id: i64,
    pub pending: bool,
    pub text: String,
}

// ── Media ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputFile {
    pub id: i64,
    pub parts: i32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentAttribute {
    Video { round_message: bool, duration: i32, w: i32, h: i32 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputMedia {
    Document {
        id: i64,
        access_hash: i64,
        file_reference: Vec<u8>,
    },
    DocumentExternal {
        url: String,
    },
    UploadedDocument {
        nosound_video: bool,
        file: InputFile,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thumb: Option<InputFile>,
        mime_type: String,
        attributes: Vec<DocumentAttribute>,
    },
}

// ── Notification settings ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationSound {
    Default,
    None,
    Ringtone { id: i64 },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerNotifySettings {
    pub flags: u32,
    #[serde(default)]
    pub show_previews: bool,
    #[serde(default)]
    pub silent: bool,
    #[serde(default)]
    pub mute_until: i32,
    #[serde(default)]
    pub sound: Option<NotificationSound>,
}

impl PeerNotifySettings {
    pub const SHOW_PREVIEWS_MASK: u32 = 1 << 0;
    pub const SILENT_MASK: u32 = 1 << 1;
    pub const MUTE_UNTIL_MASK: u32 = 1 << 2;
    pub const SOUND_MASK: u32 = 1 << 3;
}

// ── Emoji groups ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmojiGroup {
    pub title: String,
    pub icon_emoji_id: i64,
    pub emoticons: Vec<String>,
}
