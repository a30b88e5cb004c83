//! Indian GST state codes and courier district codes.

/// GST state codes keyed by state / union territory name.
const STATE_CODES: &[(&str, &str)] = &[
    ("Andhra Pradesh", "37"),
    ("Arunachal Pradesh", "12"),
    ("Assam", "18"),
    ("Bihar", "10"),
    ("Chhattisgarh", "22"),
    ("Goa", "30"),
    ("Gujarat", "24"),
    ("Haryana", "06"),
    ("Himachal Pradesh", "02"),
    ("Jharkhand", "20"),
    ("Karnataka", "29"),
    ("Kerala", "32"),
    ("Madhya Pradesh", "23"),
    ("Maharashtra", "27"),
    ("Manipur", "14"),
    ("Meghalaya", "17"),
    ("Mizoram", "15"),
    ("Nagaland", "13"),
    ("Odisha", "21"),
    ("Punjab", "03"),
    ("Rajasthan", "08"),
    ("Sikkim", "11"),
    ("Tamil Nadu", "33"),
    ("Telangana", "36"),
    ("Tripura", "16"),
    ("Uttar Pradesh", "09"),
    ("Uttarakhand", "05"),
    ("West Bengal", "19"),
    ("Andaman and Nicobar Islands", "35"),
    ("Chandigarh", "04"),
    ("Dadra and Nagar Haveli and Daman and Diu", "26"),
    ("Delhi", "07"),
    ("Jammu and Kashmir", "01"),
    ("Ladakh", "38"),
    ("Lakshadweep", "31"),
    ("Puducherry", "34"),
];

/// District codes used in invoice prefixes, keyed by lowercase city.
const DISTRICT_CODES: &[(&str, &str)] = &[
    ("lucknow", "LKO"),
    ("delhi", "DEL"),
    ("mumbai", "BOM"),
    ("bangalore", "BLR"),
    ("hyderabad", "HYD"),
    ("chennai", "MAA"),
    ("kolkata", "CCU"),
    ("pune", "PNQ"),
    ("ahmedabad", "AMD"),
    ("jaipur", "JAI"),
];

/// GST state code of the registered business (Uttar Pradesh).
pub const HOME_STATE_CODE: &str = "09";

/// District code used when the city is unknown (Lucknow).
pub const DEFAULT_DISTRICT_CODE: &str = "LKO";

/// Look up the two-digit GST state code for a state name.
///
/// Matching ignores surrounding whitespace and ASCII case.
#[must_use]
pub fn state_code(state: &str) -> Option<&'static str> {
    let state = state.trim();
    if state.is_empty() {
        return None;
    }
    STATE_CODES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(state))
        .map(|(_, code)| *code)
}

/// Look up the district code for a city, defaulting to Lucknow.
#[must_use]
pub fn district_code(city: &str) -> &'static str {
    let city = city.trim().to_lowercase();
    DISTRICT_CODES
        .iter()
        .find(|(name, _)| *name == city)
        .map_or(DEFAULT_DISTRICT_CODE, |(_, code)| *code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_code_lookup() {
        assert_eq!(state_code("Uttar Pradesh"), Some("09"));
        assert_eq!(state_code("  delhi "), Some("07"));
        assert_eq!(state_code("MAHARASHTRA"), Some("27"));
        assert_eq!(state_code("Atlantis"), None);
        assert_eq!(state_code(""), None);
    }

    #[test]
    fn test_every_state_code_is_two_digits() {
        assert_eq!(STATE_CODES.len(), 36);
        assert!(
            STATE_CODES
                .iter()
                .all(|(_, c)| c.len() == 2 && c.chars().all(|ch| ch.is_ascii_digit()))
        );
    }

    #[test]
    fn test_district_code_defaults_to_lucknow() {
        assert_eq!(district_code("Mumbai"), "BOM");
        assert_eq!(district_code(" pune "), "PNQ");
        assert_eq!(district_code("Varanasi"), "LKO");
        assert_eq!(district_code(""), "LKO");
    }

    #[test]
    fn test_home_state_is_uttar_pradesh() {
        assert_eq!(state_code("Uttar Pradesh"), Some(HOME_STATE_CODE));
    }
}
