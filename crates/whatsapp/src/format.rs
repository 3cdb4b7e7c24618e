//! Rendering of business events into WhatsApp message text.
//!
//! Every optional field is rendered with a fixed placeholder instead of being
//! dropped, so a message of a given kind always has the same set of lines.

use std::fmt::Write as _;

use {
    serde::{Deserialize, Deserializer, Serialize, de::Error as _},
    serde_json::{Map, Value},
};

const FOOTER: &str = "📱 *Sent from Hugli Printing Press Website*";
const NOT_PROVIDED: &str = "Not provided";
const NOT_SPECIFIED: &str = "Not specified";

/// A contact form submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContactForm {
    #[serde(deserialize_with = "scalar_string")]
    pub name: String,
    #[serde(deserialize_with = "scalar_text")]
    pub email: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub phone: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub company: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub subject: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub message: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub service_type: Option<String>,
}

/// A placed order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Order {
    #[serde(deserialize_with = "scalar_text")]
    pub order_id: Option<String>,
    pub customer_info: CustomerInfo,
    pub delivery_info: DeliveryInfo,
    pub preferences: Preferences,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CustomerInfo {
    #[serde(deserialize_with = "scalar_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub email: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub phone: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub company: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeliveryInfo {
    #[serde(deserialize_with = "scalar_text")]
    pub delivery_type: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub delivery_address: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub delivery_date: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub delivery_time: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub special_instructions: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    #[serde(deserialize_with = "scalar_text")]
    pub urgency: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub contact_method: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub preferred_contact_time: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(deserialize_with = "scalar_string")]
    pub name: String,
    #[serde(deserialize_with = "scalar_text")]
    pub description: Option<String>,
    /// Kept as submitted (`2`, `"500 pcs"`, `2.5`) and rendered verbatim.
    pub quantity: Option<Value>,
    /// Option name → chosen value, rendered in submission order.
    pub options: Option<Map<String, Value>>,
}

/// Form fields arrive as whatever the browser produced: numbers and booleans
/// are taken as their JSON text, null as absent.
fn scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(scalar @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(scalar.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "invalid type: expected a string or number, found {other}"
        ))),
    }
}

fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_text(deserializer)?.unwrap_or_default())
}

/// Message kinds the gateway can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    ContactForm,
    Order,
}

/// A request to notify the target. Rendered on demand and never stored.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    ContactForm(ContactForm),
    Order(Order),
}

impl OutboundMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::ContactForm(_) => MessageKind::ContactForm,
            Self::Order(_) => MessageKind::Order,
        }
    }

    /// Render with the current local time.
    pub fn render(&self) -> String {
        self.render_at(&local_timestamp())
    }

    /// Render with an explicit timestamp string.
    pub fn render_at(&self, timestamp: &str) -> String {
        match self {
            Self::ContactForm(form) => format_contact(form, timestamp),
            Self::Order(order) => format_order(order, timestamp),
        }
    }
}

/// Local time in the long `en-IN` style, e.g. `19 October 2026, 03:04:05 pm`.
pub fn local_timestamp() -> String {
    chrono::Local::now()
        .format("%-d %B %Y, %I:%M:%S %P")
        .to_string()
}

/// Blank strings count as absent.
fn or<'a>(field: &'a Option<String>, placeholder: &'a str) -> &'a str {
    field
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(placeholder)
}

pub fn format_contact(form: &ContactForm, timestamp: &str) -> String {
    let mut out = String::from("📧 *New Contact Form Submission*\n\n");

    // Writing into a String cannot fail.
    let _ = writeln!(out, "👤 *Name:* {}", form.name);
    let _ = writeln!(out, "📧 *Email:* {}", or(&form.email, NOT_PROVIDED));
    let _ = writeln!(out, "📞 *Phone:* {}", or(&form.phone, NOT_PROVIDED));
    let _ = writeln!(out, "🏢 *Company:* {}", or(&form.company, NOT_PROVIDED));
    let _ = writeln!(out, "📝 *Subject:* {}", or(&form.subject, NOT_PROVIDED));
    let _ = writeln!(
        out,
        "🔧 *Service Required:* {}",
        or(&form.service_type, NOT_SPECIFIED)
    );

    if let Some(message) = form.message.as_deref().filter(|m| !m.trim().is_empty()) {
        let _ = writeln!(out, "\n💬 *Message:*\n{message}");
    }

    let _ = writeln!(out, "\n⏰ *Submitted:* {timestamp}");
    out.push_str("\n---\n");
    out.push_str(FOOTER);
    out
}

pub fn format_order(order: &Order, timestamp: &str) -> String {
    let customer = &order.customer_info;
    let delivery = &order.delivery_info;
    let prefs = &order.preferences;

    let mut out = String::from("🛒 *NEW ORDER RECEIVED*\n\n");
    let _ = writeln!(out, "🆔 *Order ID:* {}\n", or(&order.order_id, "N/A"));

    out.push_str("👤 *Customer Information:*\n");
    let _ = writeln!(out, "• Name: {}", or(&customer.name, NOT_PROVIDED));
    let _ = writeln!(out, "• Email: {}", or(&customer.email, NOT_PROVIDED));
    let _ = writeln!(out, "• Phone: {}", or(&customer.phone, NOT_PROVIDED));
    let _ = writeln!(out, "• Company: {}", or(&customer.company, NOT_PROVIDED));
    let _ = writeln!(out, "• Address: {}\n", or(&customer.address, NOT_PROVIDED));

    out.push_str("🚚 *Delivery Information:*\n");
    let _ = writeln!(out, "• Type: {}", or(&delivery.delivery_type, "Pickup"));
    let _ = writeln!(out, "• Address: {}", or(&delivery.delivery_address, NOT_PROVIDED));
    let _ = writeln!(out, "• Date: {}", or(&delivery.delivery_date, NOT_SPECIFIED));
    let _ = writeln!(out, "• Time: {}", or(&delivery.delivery_time, NOT_SPECIFIED));
    let _ = writeln!(
        out,
        "• Instructions: {}\n",
        or(&delivery.special_instructions, "None")
    );

    out.push_str("⚙️ *Preferences:*\n");
    let _ = writeln!(out, "• Urgency: {}", or(&prefs.urgency, "Normal"));
    let _ = writeln!(out, "• Contact Method: {}", or(&prefs.contact_method, "Phone"));
    let _ = writeln!(
        out,
        "• Preferred Time: {}\n",
        or(&prefs.preferred_contact_time, "Anytime")
    );

    out.push_str("📦 *Order Items:*\n");
    for (index, item) in order.items.iter().enumerate() {
        let _ = writeln!(out, "{}. *{}*", index + 1, item.name);
        if let Some(description) = item.description.as_deref().filter(|d| !d.is_empty()) {
            let _ = writeln!(out, "   📝 {description}");
        }
        let _ = writeln!(out, "   🔢 Quantity: {}", quantity(item.quantity.as_ref()));

        if let Some(options) = item.options.as_ref().filter(|o| !o.is_empty()) {
            out.push_str("   ⚙️ Options:\n");
            for (key, value) in options {
                let _ = writeln!(out, "     • {key}: {}", option_value(value));
            }
        }
        out.push('\n');
    }

    let _ = writeln!(out, "⏰ *Order Placed:* {timestamp}");
    out.push_str(FOOTER);
    out
}

/// Falsy quantities (absent, null, 0, empty, false) default to 1.
fn quantity(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null | Value::Bool(false)) => "1".into(),
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => "1".into(),
        Some(Value::String(s)) if s.is_empty() => "1".into(),
        Some(other) => option_value(other),
    }
}

fn option_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
