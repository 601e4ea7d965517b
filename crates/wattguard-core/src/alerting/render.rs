//! Alert message rendering

use crate::models::{AlertEvent, AlertKind};

/// Subject and body ready for a [`super::Notifier`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedAlert {
    /// Message subject
    pub subject: String,
    /// Message body
    pub body: String,
    /// Whether `body` is HTML
    pub is_html: bool,
}

const STYLE: &str = "\
body { font-family: Arial, sans-serif; line-height: 1.6; }
.container { max-width: 600px; margin: 0 auto; padding: 20px; }
.alert-header { background: #ff4757; color: white; padding: 20px; border-radius: 8px 8px 0 0; }
.alert-body { background: #f8f9fa; padding: 20px; border-radius: 0 0 8px 8px; }
.warning { color: #ff4757; font-size: 24px; font-weight: bold; }
.footer { font-size: 12px; color: #999; margin-top: 20px; }";

/// Render `event` as an HTML email
pub fn render(event: &AlertEvent, cooldown: chrono::Duration) -> RenderedAlert {
    let (subject, header, content) = match &event.kind {
        AlertKind::LowBalance { reading, threshold } => (
            format!("⚠️ Low electricity balance - only {} kWh left", reading.balance()),
            "⚡ Dormitory electricity balance is low".to_string(),
            format!(
                "<p class=\"warning\">Remaining balance: {balance} kWh</p>\n\
                 <p>The balance is below the configured threshold ({threshold} kWh). Please top up soon.</p>\n\
                 <p>Remaining credit: ¥{credit} | Price: ¥{price}/kWh</p>\n\
                 <p>Queried at: {queried}</p>",
                balance = reading.balance(),
                credit = reading.credit(),
                price = reading.unit_price(),
                queried = reading.query_time_display(),
            ),
        ),
        AlertKind::RepeatedFailure { count } => (
            "❌ Electricity monitor is failing".to_string(),
            "Balance monitor error".to_string(),
            format!(
                "<p class=\"warning\">Failed to obtain balance data {count} times in a row.</p>\n\
                 <p>Check the network and whether the session cookie has expired.</p>\n\
                 <p>Time: {time}</p>",
                time = event.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            ),
        ),
    };

    let body = format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"UTF-8\"><style>\n{STYLE}\n</style></head><body>\n\
         <div class=\"container\">\n<div class=\"alert-header\"><h2>{header}</h2></div>\n\
         <div class=\"alert-body\">\n{content}\n\
         <p class=\"footer\">Sent automatically by wattguard. No further alert will be sent for {window}.</p>\n\
         </div></div></body></html>",
        window = humantime::format_duration(cooldown.to_std().unwrap_or_default()),
    );

    RenderedAlert {
        subject,
        body,
        is_html: true,
    }
}
