pub fn digits_only(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

pub fn format_phone_number(phone: &str) -> String {
    let digits = digits_only(phone);

    if digits.len() == 10 {
        return format!("+1{}", digits);
    }
    if digits.len() == 11 && digits.starts_with('1') {
        return format!("+{}", digits);
    }
    if digits.len() > 10 {
        return format!("+{}", digits);
    }
    phone.to_string()
}

pub fn validate_phone_number(phone: &str) -> bool {
    let len = digits_only(phone).len();
    (10..=15).contains(&len)
}
