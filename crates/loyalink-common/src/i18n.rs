//! Lightweight i18n translation registry.
//!
//! Provides a centralized, static translation map keyed by `(locale, message_key)`.
//! Supported locales: `ru`, `en`. No external i18n framework dependency.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Default locale when none is configured.
pub const DEFAULT_LOCALE: &str = "ru";

/// Supported locales.
pub const SUPPORTED_LOCALES: &[&str] = &["ru", "en"];

/// Central translation registry.
pub struct Translations {
    map: HashMap<(&'static str, &'static str), &'static str>,
}

impl Translations {
    /// Get a translated string for the given locale and key.
    /// Falls back to `en` if the locale is not found, then to the provided default.
    pub fn get<'a>(&self, locale: &str, key: &str, default: &'a str) -> &'a str {
        if let Some(&val) = self.map.get(&(locale, key)) {
            return val;
        }
        if locale != "en" {
            if let Some(&val) = self.map.get(&("en", key)) {
                return val;
            }
        }
        default
    }

    /// Get a translated template string for formatting.
    /// Returns `None` if no translation is found for any locale.
    pub fn get_template(&self, locale: &str, key: &str) -> Option<&'static str> {
        self.map
            .get(&(locale, key))
            .or_else(|| {
                if locale != "en" {
                    self.map.get(&("en", key))
                } else {
                    None
                }
            })
            .copied()
    }
}

/// Global translation singleton.
pub static TRANSLATIONS: LazyLock<Translations> = LazyLock::new(|| {
    let mut map = HashMap::new();

    macro_rules! t {
        ($locale:expr, $key:expr, $val:expr) => {
            map.insert(($locale, $key), $val);
        };
    }

    // ---- Admin bot ----
    t!(
        "en",
        "bot.no_permission",
        "You do not have permission to use this command."
    );
    t!(
        "ru",
        "bot.no_permission",
        "У вас нет прав для использования этой команды."
    );
    t!("en", "bot.link_issued", "Your link: {link}");
    t!("ru", "bot.link_issued", "Ваша ссылка: {link}");
    t!("en", "bot.link_failed", "Failed to create a link.");
    t!("ru", "bot.link_failed", "Ошибка при создании ссылки.");
    t!(
        "en",
        "bot.link_collision",
        "Token collision while creating the link, please try again."
    );
    t!(
        "ru",
        "bot.link_collision",
        "Совпадение токена при создании ссылки, попробуйте ещё раз."
    );
    t!("en", "bot.enter_token", "Enter the token to check:");
    t!("ru", "bot.enter_token", "Введите токен для проверки:");
    t!("en", "bot.usage_not_found", "No usage recorded for this token.");
    t!(
        "ru",
        "bot.usage_not_found",
        "Токен не найден или ещё не использован."
    );
    t!("en", "bot.usage_failed", "Failed to look up the token.");
    t!("ru", "bot.usage_failed", "Ошибка при поиске данных по токену.");
    t!("en", "bot.usage_header", "Token usage:");
    t!("ru", "bot.usage_header", "Данные по токену:");
    t!("en", "bot.usage_name", "👤 Name: {name}");
    t!("ru", "bot.usage_name", "👤 Имя: {name}");
    t!("en", "bot.usage_phone", "📞 Phone: {phone}");
    t!("ru", "bot.usage_phone", "📞 Телефон: {phone}");
    t!("en", "bot.used_header", "📌 *Used tokens:*");
    t!("ru", "bot.used_header", "📌 *Список использованных токенов:*");
    t!("en", "bot.unused_header", "📌 *Unused tokens:*");
    t!("ru", "bot.unused_header", "📌 *Список неиспользованных токенов:*");
    t!("en", "bot.used_empty", "No used tokens.");
    t!("ru", "bot.used_empty", "Нет использованных токенов.");
    t!("en", "bot.unused_empty", "No unused tokens.");
    t!("ru", "bot.unused_empty", "Нет неиспользованных токенов.");
    t!("en", "bot.list_failed", "Failed to load the token list.");
    t!("ru", "bot.list_failed", "Ошибка при получении списка токенов.");
    t!(
        "en",
        "bot.help",
        "/register - issue a registration link\n/check_token <token> - who used a token\n/used_tokens - list used tokens\n/unused_tokens - list unused tokens"
    );
    t!(
        "ru",
        "bot.help",
        "/register - создать ссылку на регистрацию\n/check_token <токен> - кто использовал токен\n/used_tokens - использованные токены\n/unused_tokens - неиспользованные токены"
    );

    // ---- Public pages ----
    t!("en", "page.title", "Loyalty program registration");
    t!("ru", "page.title", "Регистрация в программе лояльности");
    t!("en", "page.form.name", "Name");
    t!("ru", "page.form.name", "Имя");
    t!("en", "page.form.phone", "Phone");
    t!("ru", "page.form.phone", "Телефон");
    t!("en", "page.form.birthday", "Date of birth");
    t!("ru", "page.form.birthday", "Дата рождения");
    t!("en", "page.form.submit", "Register");
    t!("ru", "page.form.submit", "Зарегистрироваться");
    t!("en", "page.invalid_link", "This link is invalid or has already been used.");
    t!(
        "ru",
        "page.invalid_link",
        "Ссылка недействительна или уже была использована."
    );
    t!("en", "page.registration_failed", "Registration failed. Please try again later.");
    t!(
        "ru",
        "page.registration_failed",
        "Ошибка регистрации. Попробуйте позже."
    );
    t!("en", "page.registration_success", "Registration successful!");
    t!("ru", "page.registration_success", "Регистрация прошла успешно!");
    t!("en", "page.missing_token", "Token is missing");
    t!("ru", "page.missing_token", "Отсутствует токен");
    t!("en", "page.missing_fields", "Missing required fields");
    t!("ru", "page.missing_fields", "Не заполнены обязательные поля");
    t!("en", "page.invalid_birthday", "Date of birth must be in YYYY-MM-DD format");
    t!(
        "ru",
        "page.invalid_birthday",
        "Дата рождения должна быть в формате ГГГГ-ММ-ДД"
    );

    Translations { map }
});

/// Check if a locale string is supported.
pub fn is_supported_locale(locale: &str) -> bool {
    SUPPORTED_LOCALES.contains(&locale)
}

/// Normalize locale: return the locale if supported, otherwise return the default.
pub fn normalize_locale(locale: &str) -> &str {
    if is_supported_locale(locale) {
        locale
    } else {
        DEFAULT_LOCALE
    }
}

/// Shorthand for `TRANSLATIONS.get(locale, key, key)`.
pub fn tr<'a>(locale: &str, key: &'a str) -> &'a str {
    TRANSLATIONS.get(locale, key, key)
}
