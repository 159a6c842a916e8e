use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

const COUNTRY_CODE: &str = "351";

lazy_static! {
    static ref NON_DIGITS: Regex = Regex::new(r"\D").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactLinks {
    pub whatsapp: Option<String>,
    pub mailto: Option<String>,
}

impl ContactLinks {
    pub fn new(phone: Option<&str>, email: Option<&str>) -> Self {
        Self {
            whatsapp: phone.and_then(whatsapp_link),
            mailto: email.and_then(mailto_link),
        }
    }
}

/// `https://wa.me/` link for a phone number, prefixed with the Portuguese
/// country code unless it already carries it.
pub fn whatsapp_link(phone: &str) -> Option<String> {
    let digits = NON_DIGITS.replace_all(phone, "");
    if digits.is_empty() {
        return None;
    }
    if digits.starts_with(COUNTRY_CODE) {
        Some(format!("https://wa.me/{digits}"))
    } else {
        Some(format!("https://wa.me/{COUNTRY_CODE}{digits}"))
    }
}

pub fn mailto_link(email: &str) -> Option<String> {
    let email = email.trim();
    if email.is_empty() {
        return None;
    }
    Some(format!("mailto:{email}"))
}
