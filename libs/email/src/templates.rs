//! Email template rendering.
//!
//! Templates are keyed by the bus method name (`ADD`, `DELETE`,
//! `sendWatermelon`) and use named placeholders so a template can never be
//! fed the wrong positional argument.

use handlebars::Handlebars;
use serde_json::json;

use crate::error::{EmailError, EmailResult};

/// Template key for daily delivery messages.
pub const DAILY_TEMPLATE: &str = "sendWatermelon";

const ADD_HTML: &str = r#"<html>
    <head>
        <meta http-equiv="Content-Type" content="text/html; charset=utf-8" />
        <title>Watermelon delivery</title>
    </head>
    <body>
        <p>Hi! This is confirm message for subscribing to watermelon photo daily delivery service.</p>
        <p>If you didn't try to subscribe, ignore this message.</p>
        <p>Otherwise, <a href="{{service_url}}/v1/auth/{{key}}">click here</a></p>
    </body>
</html>"#;

const DELETE_HTML: &str = r#"<html>
    <head>
        <meta http-equiv="Content-Type" content="text/html; charset=utf-8" />
        <title>Watermelon delivery</title>
    </head>
    <body>
        <p>Hi! This is confirm message for unsubscribing from watermelon photo daily delivery service.</p>
        <p>If you didn't try to unsubscribe, ignore this message.</p>
        <p>Otherwise, <a href="{{service_url}}/v1/auth/{{key}}">click here</a></p>
    </body>
</html>"#;

const DAILY_HTML: &str = r#"<html>
    <head>
        <meta http-equiv="Content-Type" content="text/html; charset=utf-8" />
        <title>Here comes watermelon</title>
    </head>
    <body>
        <p><b>Have a nice day, {{nickname}}!</b></p>
        <p><img src="cid:{{attachment_name}}" alt="Watermelon" /></p>
    </body>
</html>"#;

/// Handlebars-based renderer holding the three message templates.
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

impl TemplateEngine {
    pub fn new() -> EmailResult<Self> {
        let mut handlebars = Handlebars::new();
        for (name, template) in [
            ("ADD", ADD_HTML),
            ("DELETE", DELETE_HTML),
            (DAILY_TEMPLATE, DAILY_HTML),
        ] {
            handlebars
                .register_template_string(name, template)
                .map_err(|e| EmailError::Template(e.to_string()))?;
        }
        Ok(Self { handlebars })
    }

    /// Render a confirmation message for `ADD` or `DELETE`.
    pub fn render_auth(&self, method: &str, service_url: &str, key: &str) -> EmailResult<String> {
        self.handlebars
            .render(method, &json!({ "service_url": service_url, "key": key }))
            .map_err(|e| EmailError::Template(e.to_string()))
    }

    /// Render the daily message referencing the inline attachment.
    pub fn render_daily(&self, nickname: &str, attachment_name: &str) -> EmailResult<String> {
        self.handlebars
            .render(
                DAILY_TEMPLATE,
                &json!({ "nickname": nickname, "attachment_name": attachment_name }),
            )
            .map_err(|e| EmailError::Template(e.to_string()))
    }
}
