// Payment shape conversions in both directions.

use serde_json::{json, Map, Value};
use tracing::{error, warn};

use crate::error::ClientError;
use crate::protocol::{api, wire};
use crate::translate::amount::{
    clamp_remote_amount, clean_remote_tip_amount, clean_suggested_tip_amounts,
    MAX_SUGGESTED_TIP_AMOUNTS,
};
use crate::translate::text::require_clean;
use crate::translate::validate_amount;
use crate::types::UserId;

// ── Inbound ────────────────────────────────────────────────────────

pub fn labeled_price_from_wire(price: wire::LabeledPrice) -> api::LabeledPricePart {
    api::LabeledPricePart {
        amount: clamp_remote_amount(price.amount, "labeled price"),
        label: price.label,
    }
}

/// Decodes the invoice flag word. Sending a contact to the provider implies
/// asking for it, and a flexible price implies a shipping address.
pub fn invoice_from_wire(invoice: wire::Invoice) -> api::Invoice {
    let send_phone_number_to_provider = invoice.has(wire::Invoice::PHONE_TO_PROVIDER_MASK);
    let send_email_address_to_provider = invoice.has(wire::Invoice::EMAIL_TO_PROVIDER_MASK);
    let is_flexible = invoice.has(wire::Invoice::FLEXIBLE_MASK);

    api::Invoice {
        is_test: invoice.has(wire::Invoice::TEST_MASK),
        need_name: invoice.has(wire::Invoice::NAME_REQUESTED_MASK),
        need_phone_number: invoice.has(wire::Invoice::PHONE_REQUESTED_MASK)
            || send_phone_number_to_provider,
        need_email_address: invoice.has(wire::Invoice::EMAIL_REQUESTED_MASK)
            || send_email_address_to_provider,
        need_shipping_address: invoice.has(wire::Invoice::SHIPPING_ADDRESS_REQUESTED_MASK)
            || is_flexible,
        send_phone_number_to_provider,
        send_email_address_to_provider,
        is_flexible,
        max_tip_amount: clean_remote_tip_amount(invoice.max_tip_amount, "maximum tip"),
        suggested_tip_amounts: clean_suggested_tip_amounts(invoice.suggested_tip_amounts),
        price_parts: invoice.prices.into_iter().map(labeled_price_from_wire).collect(),
        currency: invoice.currency,
        recurring_payment_terms_of_service_url: invoice.recurring_terms_url,
    }
}

fn parse_provider_object(params: &wire::DataJson) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(&params.data) {
        Ok(Value::Object(object)) => Some(object),
        Ok(_) => {
            error!(data = %params.data, "wrong payment provider JSON data");
            None
        }
        Err(err) => {
            error!(data = %params.data, error = %err, "can't parse payment provider JSON data");
            None
        }
    }
}

/// Recognizes natively supported providers. `None` means the caller falls
/// back to [`api::PaymentProvider::Other`].
pub fn payment_provider_from_wire(
    native_provider: Option<&str>,
    native_params: Option<&wire::DataJson>,
) -> Option<api::PaymentProvider> {
    let params = native_params?;
    match native_provider? {
        "smartglocal" => {
            let object = parse_provider_object(params)?;
            let Some(public_token) = object.get("public_token").and_then(Value::as_str) else {
                error!(data = %params.data, "unsupported smartglocal JSON data");
                return None;
            };
            if object.len() != 1 {
                warn!(data = %params.data, "unexpected smartglocal JSON fields");
            }
            Some(api::PaymentProvider::SmartGlocal { public_token: public_token.to_string() })
        }
        "stripe" => {
            let object = parse_provider_object(params)?;
            let flag = |name: &str| object.get(name).and_then(Value::as_bool);
            let publishable_key = object.get("publishable_key").and_then(Value::as_str);
            let (Some(need_country), Some(need_postal_code), Some(need_cardholder_name), Some(key)) =
                (flag("need_country"), flag("need_zip"), flag("need_cardholder_name"), publishable_key)
            else {
                error!(data = %params.data, "unsupported stripe JSON data");
                return None;
            };
            if object.len() != 5 {
                warn!(data = %params.data, "unexpected stripe JSON fields");
            }
            Some(api::PaymentProvider::Stripe {
                publishable_key: key.to_string(),
                need_country,
                need_postal_code,
                need_cardholder_name,
            })
        }
        _ => None,
    }
}

pub fn address_from_wire(address: wire::PostAddress) -> api::Address {
    api::Address {
        country_code: address.country_iso2,
        state: address.state,
        city: address.city,
        street_line1: address.street_line1,
        street_line2: address.street_line2,
        postal_code: address.post_code,
    }
}

pub fn order_info_from_wire(info: wire::PaymentRequestedInfo) -> api::OrderInfo {
    api::OrderInfo {
        name: info.name,
        phone_number: info.phone,
        email_address: info.email,
        shipping_address: info.shipping_address.map(address_from_wire),
    }
}

pub fn shipping_option_from_wire(option: wire::ShippingOption) -> api::ShippingOption {
    api::ShippingOption {
        id: option.id,
        title: option.title,
        price_parts: option.prices.into_iter().map(labeled_price_from_wire).collect(),
    }
}

pub fn saved_credentials_from_wire(
    cards: Vec<wire::PaymentSavedCredentialsCard>,
) -> Vec<api::SavedCredentials> {
    cards.into_iter().map(|card| api::SavedCredentials { id: card.id, title: card.title }).collect()
}

pub fn bank_card_info_from_wire(data: wire::BankCardData) -> api::BankCardInfo {
    api::BankCardInfo {
        title: data.title,
        actions: data
            .open_urls
            .into_iter()
            .map(|open_url| api::BankCardActionOpenUrl { text: open_url.name, url: open_url.url })
            .collect(),
    }
}

pub fn validated_order_info_from_wire(info: wire::ValidatedRequestedInfo) -> api::ValidatedOrderInfo {
    api::ValidatedOrderInfo {
        order_info_id: info.id,
        shipping_options: info.shipping_options.into_iter().map(shipping_option_from_wire).collect(),
    }
}

pub fn payment_result_from_wire(result: wire::PaymentResult) -> api::PaymentResult {
    match result {
        wire::PaymentResult::Accepted { .. } => {
            api::PaymentResult { success: true, verification_url: String::new() }
        }
        wire::PaymentResult::VerificationNeeded { url } => {
            api::PaymentResult { success: false, verification_url: url }
        }
    }
}

fn product_info(title: String, description: String, photo: Option<wire::WebDocument>) -> api::ProductInfo {
    api::ProductInfo { title, description, photo_url: photo.map(|photo| photo.url) }
}

fn remote_user_id(raw: i64, what: &str) -> Result<UserId, ClientError> {
    let user_id = UserId::new(raw);
    if user_id.is_valid() {
        Ok(user_id)
    } else {
        error!(%user_id, what, "received invalid user identifier");
        Err(ClientError::internal(format!("Receive invalid {what} identifier")))
    }
}

/// Fails with a 500 error when the server names an invalid seller or provider.
pub fn payment_form_from_wire(form: wire::PaymentForm) -> Result<api::PaymentForm, ClientError> {
    let payment_provider_user_id = remote_user_id(form.provider_id, "payments provider")?;
    let seller_bot_user_id = remote_user_id(form.bot_id, "seller")?;
    let payment_provider =
        payment_provider_from_wire(form.native_provider.as_deref(), form.native_params.as_ref())
            .unwrap_or(api::PaymentProvider::Other { url: form.url });

    Ok(api::PaymentForm {
        id: form.form_id,
        invoice: invoice_from_wire(form.invoice),
        seller_bot_user_id,
        payment_provider_user_id,
        payment_provider,
        additional_payment_options: form
            .additional_methods
            .into_iter()
            .map(|method| api::PaymentOption { title: method.title, url: method.url })
            .collect(),
        saved_order_info: form.saved_info.map(order_info_from_wire),
        saved_credentials: saved_credentials_from_wire(form.saved_credentials),
        can_save_credentials: form.can_save_credentials,
        need_password: form.password_missing,
        product_info: product_info(form.title, form.description, form.photo),
    })
}

pub fn payment_receipt_from_wire(
    receipt: wire::PaymentReceipt,
) -> Result<api::PaymentReceipt, ClientError> {
    let payment_provider_user_id = remote_user_id(receipt.provider_id, "payments provider")?;
    let seller_bot_user_id = remote_user_id(receipt.bot_id, "seller")?;

    Ok(api::PaymentReceipt {
        product_info: product_info(receipt.title, receipt.description, receipt.photo),
        date: receipt.date,
        seller_bot_user_id,
        payment_provider_user_id,
        invoice: invoice_from_wire(receipt.invoice),
        order_info: receipt.info.map(order_info_from_wire),
        shipping_option: receipt.shipping.map(shipping_option_from_wire),
        credentials_title: receipt.credentials_title,
        tip_amount: clean_remote_tip_amount(receipt.tip_amount, "receipt tip"),
    })
}

// ── Outbound ───────────────────────────────────────────────────────

pub fn address_to_wire(address: api::Address) -> wire::PostAddress {
    wire::PostAddress {
        street_line1: address.street_line1,
        street_line2: address.street_line2,
        city: address.city,
        state: address.state,
        country_iso2: address.country_code,
        post_code: address.postal_code,
    }
}

/// Checks every string of an order before it is sent.
pub fn validate_order_info(info: &api::OrderInfo) -> Result<(), ClientError> {
    require_clean(&info.name, "Name must be encoded in UTF-8")?;
    require_clean(&info.phone_number, "Phone number must be encoded in UTF-8")?;
    require_clean(&info.email_address, "Email address must be encoded in UTF-8")?;
    if let Some(address) = &info.shipping_address {
        require_clean(&address.country_code, "Country code must be encoded in UTF-8")?;
        require_clean(&address.state, "State must be encoded in UTF-8")?;
        require_clean(&address.city, "City must be encoded in UTF-8")?;
        require_clean(&address.street_line1, "Street address must be encoded in UTF-8")?;
        require_clean(&address.street_line2, "Street address must be encoded in UTF-8")?;
        require_clean(&address.postal_code, "Postal code must be encoded in UTF-8")?;
    }
    Ok(())
}

/// Sets a flag for every field that is present.
pub fn order_info_to_wire(info: api::OrderInfo) -> wire::PaymentRequestedInfo {
    let mut flags = 0;
    if !info.name.is_empty() {
        flags |= wire::PaymentRequestedInfo::NAME_MASK;
    }
    if !info.phone_number.is_empty() {
        flags |= wire::PaymentRequestedInfo::PHONE_MASK;
    }
    if !info.email_address.is_empty() {
        flags |= wire::PaymentRequestedInfo::EMAIL_MASK;
    }
    if info.shipping_address.is_some() {
        flags |= wire::PaymentRequestedInfo::SHIPPING_ADDRESS_MASK;
    }
    wire::PaymentRequestedInfo {
        flags,
        name: info.name,
        phone: info.phone_number,
        email: info.email_address,
        shipping_address: info.shipping_address.map(address_to_wire),
    }
}

fn labeled_prices_to_wire(
    parts: Vec<api::LabeledPricePart>,
    label_message: &str,
) -> Result<Vec<wire::LabeledPrice>, ClientError> {
    parts
        .into_iter()
        .map(|part| {
            require_clean(&part.label, label_message)?;
            let amount = validate_amount(part.amount)?;
            Ok(wire::LabeledPrice { label: part.label, amount })
        })
        .collect()
}

pub fn shipping_option_to_wire(
    option: api::ShippingOption,
) -> Result<wire::ShippingOption, ClientError> {
    require_clean(&option.id, "Shipping option identifier must be encoded in UTF-8")?;
    require_clean(&option.title, "Shipping option title must be encoded in UTF-8")?;
    let prices = labeled_prices_to_wire(
        option.price_parts,
        "Shipping option price part label must be encoded in UTF-8",
    )?;
    Ok(wire::ShippingOption { id: option.id, title: option.title, prices })
}

/// Translates payment credentials. `temp_password` is only consulted for
/// saved credentials.
pub fn credentials_to_wire(
    credentials: api::InputCredentials,
    temp_password: impl FnOnce() -> Option<Vec<u8>>,
) -> Result<wire::InputPaymentCredentials, ClientError> {
    match credentials {
        api::InputCredentials::Saved { saved_credentials_id } => {
            require_clean(&saved_credentials_id, "Credentials identifier must be encoded in UTF-8")?;
            let tmp_password = temp_password().ok_or_else(|| {
                ClientError::validation("Temporary password required to use saved credentials")
            })?;
            Ok(wire::InputPaymentCredentials::Saved { id: saved_credentials_id, tmp_password })
        }
        api::InputCredentials::New { data, allow_save } => Ok(wire::InputPaymentCredentials::New {
            save: allow_save,
            data: wire::DataJson::new(data),
        }),
        api::InputCredentials::ApplePay { data } => {
            Ok(wire::InputPaymentCredentials::ApplePay { payment_data: wire::DataJson::new(data) })
        }
        api::InputCredentials::GooglePay { data } => {
            Ok(wire::InputPaymentCredentials::GooglePay { payment_token: wire::DataJson::new(data) })
        }
    }
}

fn color(value: i32) -> String {
    format!("#{:06x}", value & 0x00ff_ffff)
}

pub fn theme_parameters_to_json(theme: &api::ThemeParameters) -> wire::DataJson {
    let object = json!({
        "bg_color": color(theme.background_color),
        "secondary_bg_color": color(theme.secondary_background_color),
        "text_color": color(theme.text_color),
        "hint_color": color(theme.hint_color),
        "link_color": color(theme.link_color),
        "button_color": color(theme.button_color),
        "button_text_color": color(theme.button_text_color),
    });
    wire::DataJson::new(object.to_string())
}

fn invoice_to_wire(invoice: api::Invoice) -> Result<wire::Invoice, ClientError> {
    require_clean(&invoice.currency, "Invoice currency must be encoded in UTF-8")?;
    if invoice.currency.is_empty() {
        return Err(ClientError::validation("Invoice currency must be non-empty"));
    }
    let prices =
        labeled_prices_to_wire(invoice.price_parts, "Invoice price label must be encoded in UTF-8")?;

    let max_tip_amount = validate_amount(invoice.max_tip_amount)?;
    if max_tip_amount < 0 {
        return Err(ClientError::validation("Invalid max_tip_amount of the currency specified"));
    }
    if invoice.suggested_tip_amounts.len() > MAX_SUGGESTED_TIP_AMOUNTS {
        return Err(ClientError::validation("There can be at most 4 suggested tip amounts"));
    }
    let mut previous = 0;
    for &amount in &invoice.suggested_tip_amounts {
        if amount <= previous || amount > max_tip_amount {
            return Err(ClientError::validation(
                "Suggested tip amounts must be positive, increasing and not exceed max_tip_amount",
            ));
        }
        previous = amount;
    }

    let mut flags = 0;
    let mut set = |condition: bool, mask: u32| {
        if condition {
            flags |= mask;
        }
    };
    set(invoice.is_test, wire::Invoice::TEST_MASK);
    set(invoice.need_name, wire::Invoice::NAME_REQUESTED_MASK);
    set(invoice.need_phone_number, wire::Invoice::PHONE_REQUESTED_MASK);
    set(invoice.need_email_address, wire::Invoice::EMAIL_REQUESTED_MASK);
    set(invoice.need_shipping_address, wire::Invoice::SHIPPING_ADDRESS_REQUESTED_MASK);
    set(invoice.is_flexible, wire::Invoice::FLEXIBLE_MASK);
    set(invoice.send_phone_number_to_provider, wire::Invoice::PHONE_TO_PROVIDER_MASK);
    set(invoice.send_email_address_to_provider, wire::Invoice::EMAIL_TO_PROVIDER_MASK);
    set(max_tip_amount != 0, wire::Invoice::MAX_TIP_AMOUNT_MASK);
    set(
        !invoice.recurring_payment_terms_of_service_url.is_empty(),
        wire::Invoice::RECURRING_MASK,
    );

    Ok(wire::Invoice {
        flags,
        currency: invoice.currency,
        prices,
        max_tip_amount,
        suggested_tip_amounts: invoice.suggested_tip_amounts,
        recurring_terms_url: invoice.recurring_payment_terms_of_service_url,
    })
}

/// Validates and translates an invoice message content for export.
pub fn input_message_invoice_to_wire(
    invoice: api::InputMessageInvoice,
) -> Result<wire::InputMediaInvoice, ClientError> {
    require_clean(&invoice.title, "Invoice title must be encoded in UTF-8")?;
    require_clean(&invoice.description, "Invoice description must be encoded in UTF-8")?;
    require_clean(&invoice.photo_url, "Invoice photo URL must be encoded in UTF-8")?;
    require_clean(&invoice.provider_token, "Invoice provider token must be encoded in UTF-8")?;
    require_clean(&invoice.provider_data, "Invoice provider data must be encoded in UTF-8")?;
    require_clean(&invoice.start_parameter, "Invoice start parameter must be encoded in UTF-8")?;

    let photo = (!invoice.photo_url.is_empty()).then(|| wire::InputWebDocument {
        url: invoice.photo_url,
        size: invoice.photo_size.max(0),
        mime_type: "image/jpeg".to_string(),
        width: invoice.photo_width.max(0),
        height: invoice.photo_height.max(0),
    });

    Ok(wire::InputMediaInvoice {
        title: invoice.title,
        description: invoice.description,
        photo,
        invoice: invoice_to_wire(invoice.invoice)?,
        payload: invoice.payload,
        provider: invoice.provider_token,
        provider_data: wire::DataJson::new(invoice.provider_data),
        start_param: (!invoice.start_parameter.is_empty()).then_some(invoice.start_parameter),
    })
}
