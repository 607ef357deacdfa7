//! Human-readable shipping address for order records.

/// Shipping address fields as collected by the payment form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShippingAddress {
    pub country_code: String,
    pub state: String,
    pub city: String,
    pub street_line1: String,
    pub street_line2: String,
    pub post_code: String,
}

fn country_name(code: &str) -> String {
    match code {
        "RU" => "Россия".to_string(),
        "KZ" => "Казахстан".to_string(),
        "BY" => "Беларусь".to_string(),
        other => other.to_string(),
    }
}

/// Formats an address as a single comma-separated line.
///
/// The region is skipped when it repeats the city; the city is always present.
pub fn format_address(address: &ShippingAddress) -> String {
    let mut parts: Vec<String> = Vec::new();

    let country = address.country_code.trim().to_uppercase();
    if !country.is_empty() {
        parts.push(country_name(&country));
    }

    let state = address.state.trim();
    let city = address.city.trim();
    if !state.is_empty() && state != city {
        parts.push(state.to_string());
    }

    parts.push(city.to_string());

    let line1 = address.street_line1.trim();
    if !line1.is_empty() {
        parts.push(format!("ул. {}", line1));
    }

    let line2 = address.street_line2.trim();
    if !line2.is_empty() {
        parts.push(line2.to_string());
    }

    let post_code = address.post_code.trim();
    if !post_code.is_empty() {
        parts.push(format!("индекс: {}", post_code));
    }

    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn address(country: &str, state: &str, city: &str) -> ShippingAddress {
        ShippingAddress {
            country_code: country.to_string(),
            state: state.to_string(),
            city: city.to_string(),
            street_line1: "Ленина 1".to_string(),
            street_line2: "кв. 5".to_string(),
            post_code: "101000".to_string(),
        }
    }

    #[test]
    fn test_full_russian_address() {
        assert_eq!(
            format_address(&address("ru", "Московская обл.", "Москва")),
            "Россия, Московская обл., Москва, ул. Ленина 1, кв. 5, индекс: 101000"
        );
    }

    #[test]
    fn test_state_equal_to_city_is_skipped() {
        assert_eq!(
            format_address(&address("KZ", "Алматы", "Алматы")),
            "Казахстан, Алматы, ул. Ленина 1, кв. 5, индекс: 101000"
        );
    }

    #[test]
    fn test_unknown_country_keeps_code() {
        let formatted = format_address(&address("de", "", "Berlin"));
        assert!(formatted.starts_with("DE, Berlin"));
    }

    #[test]
    fn test_minimal_address_is_city_only() {
        let addr = ShippingAddress {
            city: "Минск".to_string(),
            ..Default::default()
        };
        assert_eq!(format_address(&addr), "Минск");
    }
}
