// Payments: forms, orders, receipts and the bot-side answers.
//
// Every operation validates and translates caller data first, so a
// malformed request never reaches the transport.

use std::fmt;
use std::sync::Arc;

use msgsync_common::error::ClientError;
use msgsync_common::protocol::rpc_methods::{
    MESSAGES_SET_BOT_PRECHECKOUT_RESULTS, MESSAGES_SET_BOT_SHIPPING_RESULTS,
    PAYMENTS_CLEAR_SAVED_INFO, PAYMENTS_EXPORT_INVOICE, PAYMENTS_GET_BANK_CARD_DATA,
    PAYMENTS_GET_PAYMENT_FORM, PAYMENTS_GET_PAYMENT_RECEIPT, PAYMENTS_GET_SAVED_INFO,
    PAYMENTS_SEND_PAYMENT_FORM, PAYMENTS_VALIDATE_REQUESTED_INFO,
};
use msgsync_common::protocol::{api, wire};
use msgsync_common::translate::payments as translate;
use msgsync_common::translate::require_clean;
use msgsync_common::types::{DialogId, MessageFullId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::actor::{Mailbox, Manager};
use crate::collaborators::{DialogAccessObserver, DialogResolver, TempPasswordSource};
use crate::managers::Collaborators;
use crate::promise::Promise;
use crate::query::{encode_params, Query, QueryDispatcher, QueryHost};

/// An invoice resolved to its wire form, with the chat it lives in.
struct InvoiceTarget {
    dialog_id: Option<DialogId>,
    invoice: wire::InputInvoice,
}

pub struct PaymentsManager {
    dialogs: Arc<dyn DialogResolver>,
    passwords: Arc<dyn TempPasswordSource>,
    access_observer: Arc<dyn DialogAccessObserver>,
    dispatcher: QueryDispatcher<Self>,
    closed: bool,
}

impl PaymentsManager {
    pub fn new(collaborators: &Collaborators, mailbox: Mailbox<Self>) -> Self {
        Self {
            dialogs: Arc::clone(&collaborators.dialogs),
            passwords: Arc::clone(&collaborators.passwords),
            access_observer: Arc::clone(&collaborators.access_observer),
            dispatcher: QueryDispatcher::new(Arc::clone(&collaborators.transport), mailbox.reply_router()),
            closed: false,
        }
    }

    fn resolve_invoice(&self, invoice: api::InputInvoice) -> Result<InvoiceTarget, ClientError> {
        match invoice {
            api::InputInvoice::Message { chat_id, message_id } => {
                let server_message_id =
                    self.dialogs.invoice_message_id(MessageFullId::new(chat_id, message_id))?;
                let peer = self
                    .dialogs
                    .input_peer(chat_id)
                    .ok_or_else(|| ClientError::validation("Can't access the chat"))?;
                Ok(InvoiceTarget {
                    dialog_id: Some(chat_id),
                    invoice: wire::InputInvoice::Message { peer, msg_id: server_message_id.get() },
                })
            }
            api::InputInvoice::Name { name } => {
                require_clean(&name, "Invoice name must be encoded in UTF-8")?;
                Ok(InvoiceTarget { dialog_id: None, invoice: wire::InputInvoice::Slug { slug: name } })
            }
        }
    }

    /// Sends `params` and resolves `promise` with the converted reply.
    /// Conversion failures are attributed to `dialog_id` like remote ones.
    #[allow(clippy::too_many_arguments)]
    fn send<P, T, R>(
        &mut self,
        method: &'static str,
        params: &P,
        dialog_id: Option<DialogId>,
        source: &'static str,
        promise: Promise<R>,
        convert: impl FnOnce(T) -> Result<R, ClientError> + Send + 'static,
    ) where
        P: Serialize,
        T: DeserializeOwned,
        R: Send + 'static,
    {
        let params = match encode_params(params) {
            Ok(params) => params,
            Err(error) => return promise.set_error(error),
        };
        let query = Query::expecting::<T>(method, params, source, move |manager: &mut Self, result| {
            let reply = match result {
                Ok(reply) => reply,
                Err(error) => return promise.set_error(error),
            };
            match convert(reply) {
                Ok(value) => promise.set_value(value),
                Err(error) => {
                    if let Some(dialog_id) = dialog_id {
                        manager.access_observer.on_get_dialog_error(dialog_id, &error, source);
                    }
                    promise.set_error(error);
                }
            }
        });
        let query = match dialog_id {
            Some(dialog_id) => query.with_dialog(dialog_id),
            None => query,
        };
        self.send_query(query);
    }

    // ── Bot answers ────────────────────────────────────────────────

    pub fn answer_shipping_query(
        &mut self,
        shipping_query_id: i64,
        shipping_options: Vec<api::ShippingOption>,
        error_message: String,
        promise: Promise<()>,
    ) {
        if let Err(error) = require_clean(&error_message, "Error message must be encoded in UTF-8") {
            return promise.set_error(error);
        }
        let options = match shipping_options
            .into_iter()
            .map(translate::shipping_option_to_wire)
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(options) => options,
            Err(error) => return promise.set_error(error),
        };
        let params = wire::SetBotShippingResults {
            query_id: shipping_query_id,
            error: (!error_message.is_empty()).then_some(error_message),
            shipping_options: (!options.is_empty()).then_some(options),
        };
        self.send(MESSAGES_SET_BOT_SHIPPING_RESULTS, &params, None, "answer_shipping_query", promise, |ok: bool| {
            if !ok {
                info!("sending answer to a shipping query has failed");
            }
            Ok(())
        });
    }

    pub fn answer_pre_checkout_query(
        &mut self,
        pre_checkout_query_id: i64,
        error_message: String,
        promise: Promise<()>,
    ) {
        if let Err(error) = require_clean(&error_message, "Error message must be encoded in UTF-8") {
            return promise.set_error(error);
        }
        let params = wire::SetBotPrecheckoutResults {
            query_id: pre_checkout_query_id,
            success: error_message.is_empty(),
            error: (!error_message.is_empty()).then_some(error_message),
        };
        self.send(
            MESSAGES_SET_BOT_PRECHECKOUT_RESULTS,
            &params,
            None,
            "answer_pre_checkout_query",
            promise,
            |ok: bool| {
                if !ok {
                    info!("sending answer to a pre-checkout query has failed");
                }
                Ok(())
            },
        );
    }

    // ── Buyer flow ─────────────────────────────────────────────────

    pub fn get_payment_form(
        &mut self,
        invoice: api::InputInvoice,
        theme: Option<api::ThemeParameters>,
        promise: Promise<api::PaymentForm>,
    ) {
        let target = match self.resolve_invoice(invoice) {
            Ok(target) => target,
            Err(error) => return promise.set_error(error),
        };
        let params = wire::GetPaymentForm {
            invoice: target.invoice,
            theme_params: theme.as_ref().map(translate::theme_parameters_to_json),
        };
        self.send(
            PAYMENTS_GET_PAYMENT_FORM,
            &params,
            target.dialog_id,
            "get_payment_form",
            promise,
            translate::payment_form_from_wire,
        );
    }

    pub fn validate_order_info(
        &mut self,
        invoice: api::InputInvoice,
        order_info: Option<api::OrderInfo>,
        allow_save: bool,
        promise: Promise<api::ValidatedOrderInfo>,
    ) {
        let target = match self.resolve_invoice(invoice) {
            Ok(target) => target,
            Err(error) => return promise.set_error(error),
        };
        if let Some(info) = &order_info {
            if let Err(error) = translate::validate_order_info(info) {
                return promise.set_error(error);
            }
        }
        let params = wire::ValidateRequestedInfo {
            save: allow_save,
            invoice: target.invoice,
            info: translate::order_info_to_wire(order_info.unwrap_or_default()),
        };
        self.send(
            PAYMENTS_VALIDATE_REQUESTED_INFO,
            &params,
            target.dialog_id,
            "validate_order_info",
            promise,
            |info| Ok(translate::validated_order_info_from_wire(info)),
        );
    }

    #[allow(clippy::too_many_arguments)]
    pub fn send_payment_form(
        &mut self,
        invoice: api::InputInvoice,
        payment_form_id: i64,
        order_info_id: String,
        shipping_option_id: String,
        credentials: api::InputCredentials,
        tip_amount: i64,
        promise: Promise<api::PaymentResult>,
    ) {
        let identifiers = require_clean(&order_info_id, "Order information identifier must be encoded in UTF-8")
            .and_then(|()| require_clean(&shipping_option_id, "Shipping option identifier must be encoded in UTF-8"));
        if let Err(error) = identifiers {
            return promise.set_error(error);
        }
        let target = match self.resolve_invoice(invoice) {
            Ok(target) => target,
            Err(error) => return promise.set_error(error),
        };
        let passwords = Arc::clone(&self.passwords);
        let credentials = match translate::credentials_to_wire(credentials, || passwords.temp_password()) {
            Ok(credentials) => credentials,
            Err(error) => return promise.set_error(error),
        };
        let params = wire::SendPaymentForm {
            form_id: payment_form_id,
            invoice: target.invoice,
            requested_info_id: (!order_info_id.is_empty()).then_some(order_info_id),
            shipping_option_id: (!shipping_option_id.is_empty()).then_some(shipping_option_id),
            credentials,
            tip_amount: (tip_amount != 0).then_some(tip_amount),
        };
        self.send(
            PAYMENTS_SEND_PAYMENT_FORM,
            &params,
            target.dialog_id,
            "send_payment_form",
            promise,
            |result: wire::PaymentResult| {
                if let wire::PaymentResult::Accepted { updates } = &result {
                    debug!(%updates, "payment accepted");
                }
                Ok(translate::payment_result_from_wire(result))
            },
        );
    }

    pub fn get_payment_receipt(&mut self, full_id: MessageFullId, promise: Promise<api::PaymentReceipt>) {
        let server_message_id = match self.dialogs.payment_successful_message_id(full_id) {
            Ok(server_message_id) => server_message_id,
            Err(error) => return promise.set_error(error),
        };
        let Some(peer) = self.dialogs.input_peer(full_id.dialog_id) else {
            return promise.set_error(ClientError::validation("Can't access the chat"));
        };
        let params = wire::GetPaymentReceipt { peer, msg_id: server_message_id.get() };
        self.send(
            PAYMENTS_GET_PAYMENT_RECEIPT,
            &params,
            Some(full_id.dialog_id),
            "get_payment_receipt",
            promise,
            translate::payment_receipt_from_wire,
        );
    }

    // ── Saved data ─────────────────────────────────────────────────

    pub fn get_saved_order_info(&mut self, promise: Promise<Option<api::OrderInfo>>) {
        self.send(
            PAYMENTS_GET_SAVED_INFO,
            &serde_json::json!({}),
            None,
            "get_saved_order_info",
            promise,
            |saved: wire::SavedInfo| Ok(saved.saved_info.map(translate::order_info_from_wire)),
        );
    }

    pub fn delete_saved_order_info(&mut self, promise: Promise<()>) {
        self.clear_saved_info(wire::ClearSavedInfo { credentials: false, info: true }, promise);
    }

    pub fn delete_saved_credentials(&mut self, promise: Promise<()>) {
        self.clear_saved_info(wire::ClearSavedInfo { credentials: true, info: false }, promise);
    }

    fn clear_saved_info(&mut self, params: wire::ClearSavedInfo, promise: Promise<()>) {
        self.send(PAYMENTS_CLEAR_SAVED_INFO, &params, None, "clear_saved_info", promise, |_: bool| Ok(()));
    }

    // ── Misc ───────────────────────────────────────────────────────

    /// Resolves with a link that opens the invoice.
    pub fn export_invoice(&mut self, invoice: api::InputMessageInvoice, promise: Promise<String>) {
        let invoice_media = match translate::input_message_invoice_to_wire(invoice) {
            Ok(invoice_media) => invoice_media,
            Err(error) => return promise.set_error(error),
        };
        let params = wire::ExportInvoice { invoice_media };
        self.send(PAYMENTS_EXPORT_INVOICE, &params, None, "export_invoice", promise, |link: wire::ExportedInvoice| {
            Ok(link.url)
        });
    }

    pub fn get_bank_card_info(&mut self, bank_card_number: String, promise: Promise<api::BankCardInfo>) {
        if let Err(error) = require_clean(&bank_card_number, "Bank card number must be encoded in UTF-8") {
            return promise.set_error(error);
        }
        let params = wire::GetBankCardData { number: bank_card_number };
        self.send(PAYMENTS_GET_BANK_CARD_DATA, &params, None, "get_bank_card_info", promise, |data| {
            Ok(translate::bank_card_info_from_wire(data))
        });
    }
}

impl QueryHost for PaymentsManager {
    fn dispatcher(&mut self) -> &mut QueryDispatcher<Self> {
        &mut self.dispatcher
    }

    fn access_observer(&self) -> &dyn DialogAccessObserver {
        self.access_observer.as_ref()
    }
}

impl Manager for PaymentsManager {
    const NAME: &'static str = "payments";

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let cancelled = self.cancel_queries();
        info!(cancelled, "payments manager closed");
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl fmt::Debug for PaymentsManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentsManager")
            .field("pending_queries", &self.dispatcher.pending_count())
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use msgsync_common::types::{MessageId, ServerMessageId, UserId};
    use serde_json::{json, Value};
    use tokio::sync::mpsc;

    use super::*;
    use crate::actor::Command;
    use crate::collaborators::memory::{
        MemoryDialogs, MemoryFileManager, RecordingAccessObserver, RecordingObserver, StaticTempPassword,
    };
    use crate::promise::PromiseReceiver;
    use crate::query::QueryId;
    use crate::transport::RecordingTransport;
    use crate::updates::UpdatesHub;

    struct Fixture {
        manager: PaymentsManager,
        _rx: mpsc::UnboundedReceiver<Command<PaymentsManager>>,
        transport: Arc<RecordingTransport>,
        access: Arc<RecordingAccessObserver>,
        dialogs: Arc<MemoryDialogs>,
    }

    impl Fixture {
        fn new(temp_password: Option<Vec<u8>>) -> Self {
            let transport = Arc::new(RecordingTransport::default());
            let access = Arc::new(RecordingAccessObserver::default());
            let dialogs = Arc::new(MemoryDialogs::default());
            let collaborators = Collaborators {
                files: Arc::new(MemoryFileManager::default()),
                transport: transport.clone(),
                push_channel: Arc::new(UpdatesHub::new()),
                content_observer: Arc::new(RecordingObserver::default()),
                access_observer: access.clone(),
                dialogs: dialogs.clone(),
                passwords: Arc::new(StaticTempPassword(temp_password)),
            };
            let (mailbox, rx) = Mailbox::channel();
            let manager = PaymentsManager::new(&collaborators, mailbox);
            Self { manager, _rx: rx, transport, access, dialogs }
        }

        fn last_request(&self) -> (QueryId, String, Value) {
            let request = self.transport.requests().pop().expect("a request should be sent");
            let id = QueryId::from_request_id(&request.id).expect("numeric id");
            (id, request.method.clone(), request.params.clone().unwrap_or(Value::Null))
        }

        fn reply(&mut self, result: Result<Value, ClientError>) {
            let (id, _, _) = self.last_request();
            self.manager.on_query_result(id, result);
        }
    }

    fn invoice_message(chat: i64, server_id: i32) -> api::InputInvoice {
        api::InputInvoice::Message {
            chat_id: DialogId::new(chat),
            message_id: MessageId::from_server(ServerMessageId::new(server_id)),
        }
    }

    fn promise<T>() -> (Promise<T>, PromiseReceiver<T>) {
        Promise::new()
    }

    fn wire_form(provider_id: i64) -> Value {
        json!({
            "form_id": 5,
            "bot_id": 100,
            "title": "Coffee",
            "description": "Fresh",
            "invoice": {
                "flags": wire::Invoice::FLEXIBLE_MASK,
                "currency": "EUR",
                "prices": [{ "label": "Cup", "amount": 1i64 << 41 }]
            },
            "provider_id": provider_id,
            "url": "https://pay.example/form"
        })
    }

    #[test]
    fn payment_form_is_fetched_for_a_message_invoice() {
        let mut fixture = Fixture::new(None);
        let (form_promise, mut form) = promise();
        let theme = api::ThemeParameters { background_color: 0x00ff_ffff, ..Default::default() };
        fixture.manager.get_payment_form(invoice_message(-100, 3), Some(theme), form_promise);

        let (_, method, params) = fixture.last_request();
        assert_eq!(method, PAYMENTS_GET_PAYMENT_FORM);
        assert_eq!(params["invoice"]["type"], "message");
        assert_eq!(params["invoice"]["msg_id"], 3);
        assert!(params["theme_params"]["data"].as_str().expect("theme JSON").contains("#ffffff"));

        fixture.reply(Ok(wire_form(200)));
        let form = form.try_take().expect("resolved").expect("form should convert");
        assert_eq!(form.payment_provider_user_id, UserId::new(200));
        assert_eq!(form.invoice.price_parts[0].amount, 1 << 40);
        assert!(form.invoice.need_shipping_address);
        assert_eq!(form.payment_provider, api::PaymentProvider::Other { url: "https://pay.example/form".to_string() });
    }

    #[test]
    fn invalid_provider_fails_with_internal_error() {
        let mut fixture = Fixture::new(None);
        let (form_promise, mut form) = promise();
        fixture.manager.get_payment_form(api::InputInvoice::Name { name: "coffee".to_string() }, None, form_promise);
        let (_, _, params) = fixture.last_request();
        assert_eq!(params["invoice"], json!({ "type": "slug", "slug": "coffee" }));
        assert!(params.get("theme_params").is_none());

        fixture.reply(Ok(wire_form(0)));
        let error = form.try_take().expect("resolved").expect_err("provider is invalid");
        assert_eq!(error.code(), 500);
        assert_eq!(error.message(), "Receive invalid payments provider identifier");
    }

    #[test]
    fn remote_failure_is_attributed_to_the_invoice_chat() {
        let mut fixture = Fixture::new(None);
        let (form_promise, mut form) = promise();
        fixture.manager.get_payment_form(invoice_message(-100, 3), None, form_promise);
        let error = ClientError::remote(400, "CHANNEL_PRIVATE");
        fixture.reply(Err(error.clone()));

        assert_eq!(form.try_take(), Some(Err(error.clone())));
        assert_eq!(fixture.access.errors(), vec![(DialogId::new(-100), error, "get_payment_form".to_string())]);
    }

    #[test]
    fn invalid_seller_in_a_chat_invoice_is_attributed_too() {
        let mut fixture = Fixture::new(None);
        let (form_promise, mut form) = promise();
        fixture.manager.get_payment_form(invoice_message(-100, 3), None, form_promise);
        let mut reply = wire_form(200);
        reply["bot_id"] = json!(-1);
        fixture.reply(Ok(reply));

        let error = form.try_take().expect("resolved").expect_err("seller is invalid");
        assert_eq!(error.message(), "Receive invalid seller identifier");
        assert_eq!(fixture.access.errors(), vec![(DialogId::new(-100), error, "get_payment_form".to_string())]);
    }

    #[test]
    fn inaccessible_chat_and_local_message_fail_without_a_request() {
        let mut fixture = Fixture::new(None);
        fixture.dialogs.hide(DialogId::new(-100));
        let (form_promise, mut form) = promise();
        fixture.manager.get_payment_form(invoice_message(-100, 3), None, form_promise);
        assert_eq!(form.try_take(), Some(Err(ClientError::validation("Can't access the chat"))));

        let (receipt_promise, mut receipt) = promise();
        let local = MessageFullId::new(DialogId::new(5), MessageId::new(7));
        fixture.manager.get_payment_receipt(local, receipt_promise);
        assert_eq!(receipt.try_take(), Some(Err(ClientError::validation("Wrong message identifier specified"))));
        assert!(fixture.transport.requests().is_empty());
    }

    #[test]
    fn order_info_is_validated_before_sending() {
        let mut fixture = Fixture::new(None);
        let (bad_promise, mut bad) = promise();
        let info = api::OrderInfo { phone_number: "+1\u{7}".to_string(), ..Default::default() };
        fixture.manager.validate_order_info(invoice_message(-100, 3), Some(info), true, bad_promise);
        assert_eq!(bad.try_take(), Some(Err(ClientError::validation("Phone number must be encoded in UTF-8"))));
        assert!(fixture.transport.requests().is_empty());

        let (ok_promise, mut ok) = promise();
        let info = api::OrderInfo { name: "Ada".to_string(), ..Default::default() };
        fixture.manager.validate_order_info(invoice_message(-100, 3), Some(info), true, ok_promise);
        let (_, method, params) = fixture.last_request();
        assert_eq!(method, PAYMENTS_VALIDATE_REQUESTED_INFO);
        assert_eq!(params["save"], true);
        assert_eq!(params["info"]["flags"], wire::PaymentRequestedInfo::NAME_MASK);

        fixture.reply(Ok(json!({ "id": "order-1", "shipping_options": [] })));
        let validated = ok.try_take().expect("resolved").expect("should validate");
        assert_eq!(validated.order_info_id, "order-1");
    }

    #[test]
    fn saved_credentials_need_a_temporary_password() {
        let mut fixture = Fixture::new(None);
        let (result_promise, mut result) = promise();
        let saved = api::InputCredentials::Saved { saved_credentials_id: "card".to_string() };
        fixture.manager.send_payment_form(
            invoice_message(-100, 3),
            5,
            String::new(),
            String::new(),
            saved,
            0,
            result_promise,
        );
        let error = result.try_take().expect("resolved").expect_err("password missing");
        assert_eq!(error.message(), "Temporary password required to use saved credentials");
        assert!(fixture.transport.requests().is_empty());
    }

    #[test]
    fn payment_form_is_sent_with_optional_fields() {
        let mut fixture = Fixture::new(Some(vec![7]));
        let (result_promise, mut result) = promise();
        let saved = api::InputCredentials::Saved { saved_credentials_id: "card".to_string() };
        fixture.manager.send_payment_form(
            invoice_message(-100, 3),
            5,
            "order-1".to_string(),
            String::new(),
            saved,
            0,
            result_promise,
        );
        let (_, method, params) = fixture.last_request();
        assert_eq!(method, PAYMENTS_SEND_PAYMENT_FORM);
        assert_eq!(params["requested_info_id"], "order-1");
        assert!(params.get("shipping_option_id").is_none());
        assert!(params.get("tip_amount").is_none());
        assert_eq!(params["credentials"], json!({ "type": "saved", "id": "card", "tmp_password": [7] }));

        fixture.reply(Ok(json!({ "type": "verification_needed", "url": "https://verify.example" })));
        assert_eq!(
            result.try_take(),
            Some(Ok(api::PaymentResult { success: false, verification_url: "https://verify.example".to_string() }))
        );
    }

    #[test]
    fn receipt_tip_is_cleaned() {
        let mut fixture = Fixture::new(None);
        let (receipt_promise, mut receipt) = promise();
        let full_id = MessageFullId::new(DialogId::new(9), MessageId::from_server(ServerMessageId::new(4)));
        fixture.manager.get_payment_receipt(full_id, receipt_promise);
        let (_, method, params) = fixture.last_request();
        assert_eq!(method, PAYMENTS_GET_PAYMENT_RECEIPT);
        assert_eq!(params["msg_id"], 4);

        fixture.reply(Ok(json!({
            "date": 1_700_000_000,
            "bot_id": 100,
            "provider_id": 200,
            "title": "Coffee",
            "description": "Fresh",
            "invoice": { "flags": 0, "currency": "EUR", "prices": [] },
            "tip_amount": -5,
            "currency": "EUR",
            "total_amount": 300,
            "credentials_title": "Visa *1234"
        })));
        let receipt = receipt.try_take().expect("resolved").expect("receipt should convert");
        assert_eq!(receipt.tip_amount, 0);
        assert_eq!(receipt.credentials_title, "Visa *1234");
    }

    #[test]
    fn shipping_answer_rejects_bad_options_and_sends_good_ones() {
        let mut fixture = Fixture::new(None);
        let (bad_promise, mut bad) = promise();
        let oversized = api::ShippingOption {
            id: "fast".to_string(),
            title: "Courier".to_string(),
            price_parts: vec![api::LabeledPricePart { label: "Fee".to_string(), amount: 1 << 41 }],
        };
        fixture.manager.answer_shipping_query(1, vec![oversized], String::new(), bad_promise);
        assert_eq!(bad.try_take(), Some(Err(ClientError::validation("Too big amount of the currency specified"))));

        let (ok_promise, mut ok) = promise();
        fixture.manager.answer_shipping_query(2, Vec::new(), "Not shipping there".to_string(), ok_promise);
        let (_, method, params) = fixture.last_request();
        assert_eq!(method, MESSAGES_SET_BOT_SHIPPING_RESULTS);
        assert_eq!(params, json!({ "query_id": 2, "error": "Not shipping there" }));
        fixture.reply(Ok(json!(false)));
        assert_eq!(ok.try_take(), Some(Ok(())));
    }

    #[test]
    fn pre_checkout_answer_sets_success_without_error() {
        let mut fixture = Fixture::new(None);
        let (answer_promise, mut answer) = promise();
        fixture.manager.answer_pre_checkout_query(3, String::new(), answer_promise);
        let (_, method, params) = fixture.last_request();
        assert_eq!(method, MESSAGES_SET_BOT_PRECHECKOUT_RESULTS);
        assert_eq!(params, json!({ "query_id": 3, "success": true }));
        fixture.reply(Ok(json!(true)));
        assert_eq!(answer.try_take(), Some(Ok(())));
    }

    #[test]
    fn saved_info_can_be_read_and_cleared() {
        let mut fixture = Fixture::new(None);
        let (saved_promise, mut saved) = promise();
        fixture.manager.get_saved_order_info(saved_promise);
        fixture.reply(Ok(json!({ "saved_info": { "flags": 1, "name": "Ada" } })));
        let info = saved.try_take().expect("resolved").expect("should convert");
        assert_eq!(info.map(|info| info.name), Some("Ada".to_string()));

        let (info_promise, mut info) = promise();
        fixture.manager.delete_saved_order_info(info_promise);
        assert_eq!(fixture.last_request().2, json!({ "credentials": false, "info": true }));
        fixture.reply(Ok(json!(true)));
        assert_eq!(info.try_take(), Some(Ok(())));

        let (credentials_promise, _credentials) = promise();
        fixture.manager.delete_saved_credentials(credentials_promise);
        assert_eq!(fixture.last_request().2, json!({ "credentials": true, "info": false }));
    }

    #[test]
    fn export_invoice_returns_the_link() {
        let mut fixture = Fixture::new(None);
        let (link_promise, mut link) = promise();
        let invoice = api::InputMessageInvoice {
            title: "Coffee".to_string(),
            invoice: api::Invoice { currency: "USD".to_string(), ..Default::default() },
            ..Default::default()
        };
        fixture.manager.export_invoice(invoice, link_promise);
        let (_, method, _) = fixture.last_request();
        assert_eq!(method, PAYMENTS_EXPORT_INVOICE);
        fixture.reply(Ok(json!({ "url": "https://t.example/$abc" })));
        assert_eq!(link.try_take(), Some(Ok("https://t.example/$abc".to_string())));

        let (empty_promise, mut empty) = promise();
        fixture.manager.export_invoice(api::InputMessageInvoice::default(), empty_promise);
        assert_eq!(empty.try_take(), Some(Err(ClientError::validation("Invoice currency must be non-empty"))));
    }

    #[test]
    fn bank_card_info_is_translated() {
        let mut fixture = Fixture::new(None);
        let (card_promise, mut card) = promise();
        fixture.manager.get_bank_card_info("4242424242424242".to_string(), card_promise);
        fixture.reply(Ok(json!({
            "title": "Visa",
            "open_urls": [{ "url": "https://bank.example", "name": "Open bank" }]
        })));
        let info = card.try_take().expect("resolved").expect("should convert");
        assert_eq!(info.title, "Visa");
        assert_eq!(info.actions[0].text, "Open bank");
    }

    fn rejected<T: fmt::Debug>(mut receiver: PromiseReceiver<T>) -> String {
        let error = receiver.try_take().expect("resolved").expect_err("string should be refused");
        assert_eq!(error.code(), 400);
        error.message().to_string()
    }

    #[test]
    fn shipping_answer_error_must_be_clean() {
        let mut fixture = Fixture::new(None);
        let (answer_promise, answer) = promise();
        fixture.manager.answer_shipping_query(1, Vec::new(), "no\u{0}way".to_string(), answer_promise);
        assert_eq!(rejected(answer), "Error message must be encoded in UTF-8");
        assert!(fixture.transport.requests().is_empty());
    }

    #[test]
    fn pre_checkout_error_must_be_clean() {
        let mut fixture = Fixture::new(None);
        let (answer_promise, answer) = promise();
        fixture.manager.answer_pre_checkout_query(1, "bad\u{0}msg".to_string(), answer_promise);
        assert_eq!(rejected(answer), "Error message must be encoded in UTF-8");
        assert!(fixture.transport.requests().is_empty());
    }

    fn send_form_with_ids(fixture: &mut Fixture, order_info_id: &str, shipping_option_id: &str) -> String {
        let (result_promise, result) = promise();
        let saved = api::InputCredentials::Saved { saved_credentials_id: "card".to_string() };
        fixture.manager.send_payment_form(
            invoice_message(-100, 3),
            5,
            order_info_id.to_string(),
            shipping_option_id.to_string(),
            saved,
            0,
            result_promise,
        );
        rejected(result)
    }

    #[test]
    fn order_info_id_must_be_clean() {
        let mut fixture = Fixture::new(Some(vec![7]));
        assert_eq!(
            send_form_with_ids(&mut fixture, "order\u{2}", "fast"),
            "Order information identifier must be encoded in UTF-8"
        );
        assert!(fixture.transport.requests().is_empty());
    }

    #[test]
    fn shipping_option_id_must_be_clean() {
        let mut fixture = Fixture::new(Some(vec![7]));
        assert_eq!(
            send_form_with_ids(&mut fixture, "order-1", "fast\u{ffff}"),
            "Shipping option identifier must be encoded in UTF-8"
        );
        assert!(fixture.transport.requests().is_empty());
    }

    #[test]
    fn bank_card_number_must_be_clean() {
        let mut fixture = Fixture::new(None);
        let (card_promise, card) = promise();
        fixture.manager.get_bank_card_info("4242\u{1}".to_string(), card_promise);
        assert_eq!(rejected(card), "Bank card number must be encoded in UTF-8");
        assert!(fixture.transport.requests().is_empty());
    }

    #[test]
    fn invoice_name_must_be_clean() {
        let mut fixture = Fixture::new(None);
        let (form_promise, form) = promise();
        let invoice = api::InputInvoice::Name { name: "cof\u{0}fee".to_string() };
        fixture.manager.get_payment_form(invoice, None, form_promise);
        assert_eq!(rejected(form), "Invoice name must be encoded in UTF-8");
        assert!(fixture.transport.requests().is_empty());
    }

    #[test]
    fn close_cancels_pending_queries_once() {
        let mut fixture = Fixture::new(None);
        let (card_promise, mut card) = promise();
        fixture.manager.get_bank_card_info("4242".to_string(), card_promise);
        let (id, _, _) = fixture.last_request();

        fixture.manager.close();
        fixture.manager.close();
        assert_eq!(card.try_take(), Some(Err(ClientError::Shutdown)));
        fixture.manager.on_query_result(id, Ok(json!({ "title": "late" })));

        let (late_promise, mut late) = promise();
        fixture.manager.get_saved_order_info(late_promise);
        assert_eq!(late.try_take(), Some(Err(ClientError::Shutdown)));
    }
}
