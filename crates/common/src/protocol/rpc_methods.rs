// Remote method and push names used by the managers.

// ── Speech recognition ─────────────────────────────────────────────
pub const MESSAGES_TRANSCRIBE_AUDIO: &str = "messages.transcribeAudio";
pub const MESSAGES_RATE_TRANSCRIBED_AUDIO: &str = "messages.rateTranscribedAudio";

// ── Bot-side payments ──────────────────────────────────────────────
pub const MESSAGES_SET_BOT_SHIPPING_RESULTS: &str = "messages.setBotShippingResults";
pub const MESSAGES_SET_BOT_PRECHECKOUT_RESULTS: &str = "messages.setBotPrecheckoutResults";

// ── Payments ───────────────────────────────────────────────────────
pub const PAYMENTS_GET_PAYMENT_FORM: &str = "payments.getPaymentForm";
pub const PAYMENTS_VALIDATE_REQUESTED_INFO: &str = "payments.validateRequestedInfo";
pub const PAYMENTS_SEND_PAYMENT_FORM: &str = "payments.sendPaymentForm";
pub const PAYMENTS_GET_PAYMENT_RECEIPT: &str = "payments.getPaymentReceipt";
pub const PAYMENTS_GET_SAVED_INFO: &str = "payments.getSavedInfo";
pub const PAYMENTS_CLEAR_SAVED_INFO: &str = "payments.clearSavedInfo";
pub const PAYMENTS_EXPORT_INVOICE: &str = "payments.exportInvoice";
pub const PAYMENTS_GET_BANK_CARD_DATA: &str = "payments.getBankCardData";

// ── Pushes ─────────────────────────────────────────────────────────
pub const UPDATE_TRANSCRIBED_AUDIO: &str = "updateTranscribedAudio";

/// Every request method the managers may send.
pub const REQUEST_METHODS: &[&str] = &[
    MESSAGES_TRANSCRIBE_AUDIO,
    MESSAGES_RATE_TRANSCRIBED_AUDIO,
    MESSAGES_SET_BOT_SHIPPING_RESULTS,
    MESSAGES_SET_BOT_PRECHECKOUT_RESULTS,
    PAYMENTS_GET_PAYMENT_FORM,
    PAYMENTS_VALIDATE_REQUESTED_INFO,
    PAYMENTS_SEND_PAYMENT_FORM,
    PAYMENTS_GET_PAYMENT_RECEIPT,
    PAYMENTS_GET_SAVED_INFO,
    PAYMENTS_CLEAR_SAVED_INFO,
    PAYMENTS_EXPORT_INVOICE,
    PAYMENTS_GET_BANK_CARD_DATA,
];

/// Every push notification the core subscribes to.
pub const PUSH_METHODS: &[&str] = &[UPDATE_TRANSCRIBED_AUDIO];
