//! Server-rendered HTML pages for the public registration flow.

use loyalink_common::i18n::{normalize_locale, tr};

const REGISTER_TEMPLATE: &str = include_str!("templates/register.html");
const MESSAGE_TEMPLATE: &str = include_str!("templates/message.html");

/// The registration form. `encrypted_token` is echoed into a hidden field.
pub fn register_form(locale: &str, encrypted_token: &str) -> String {
    let locale = normalize_locale(locale);
    REGISTER_TEMPLATE
        .replace("{{lang}}", locale)
        .replace("{{title}}", &html_escape(tr(locale, "page.title")))
        .replace("{{token}}", &html_escape(encrypted_token))
        .replace("{{name_label}}", &html_escape(tr(locale, "page.form.name")))
        .replace("{{phone_label}}", &html_escape(tr(locale, "page.form.phone")))
        .replace(
            "{{birthday_label}}",
            &html_escape(tr(locale, "page.form.birthday")),
        )
        .replace(
            "{{submit_label}}",
            &html_escape(tr(locale, "page.form.submit")),
        )
}

pub fn error_page(locale: &str, message: &str) -> String {
    message_page(locale, "error", message)
}

pub fn success_page(locale: &str) -> String {
    let locale = normalize_locale(locale);
    let message = tr(locale, "page.registration_success");
    message_page(locale, "success", message)
}

fn message_page(locale: &str, kind: &str, message: &str) -> String {
    let locale = normalize_locale(locale);
    MESSAGE_TEMPLATE
        .replace("{{lang}}", locale)
        .replace("{{kind}}", kind)
        .replace("{{title}}", &html_escape(tr(locale, "page.title")))
        .replace("{{message}}", &html_escape(message))
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_carries_escaped_token() {
        let html = register_form("en", "abc\"><script>");
        assert!(html.contains(r#"name="token" value="abc&quot;&gt;&lt;script&gt;""#));
        assert!(!html.contains("<script>"));
        assert!(html.contains("Date of birth"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn unknown_locale_falls_back_to_default() {
        let html = register_form("fr", "tok");
        assert!(html.contains(r#"<html lang="ru">"#));
        assert!(html.contains("Телефон"));
    }

    #[test]
    fn message_pages_render() {
        let ok = success_page("en");
        assert!(ok.contains("Registration successful!"));
        assert!(ok.contains(r#"class="card success""#));

        let err = error_page("en", "bad <link>");
        assert!(err.contains("bad &lt;link&gt;"));
        assert!(err.contains(r#"class="card error""#));
    }
}
