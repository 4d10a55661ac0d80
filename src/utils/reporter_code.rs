use regex::Regex;
use std::sync::LazyLock;

/// Reporter code contract: letters, then a literal "PN", then one or more digits
///
/// Shared by registration and login; e.g. "HydPN101", "VizagPN202".
static REPORTER_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z]+)PN\d+$").expect("reporter code pattern is valid")
});

pub fn is_valid(code: &str) -> bool {
    REPORTER_CODE.is_match(code)
}

/// Place-name prefix embedded in a valid code ("HydPN101" -> "Hyd")
pub fn place_prefix(code: &str) -> Option<&str> {
    REPORTER_CODE
        .captures(code)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// `validator` custom-function adapter for DTO fields
pub fn validate_reporter_code(code: &str) -> Result<(), validator::ValidationError> {
    if is_valid(code) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_reporter_code")
            .with_message("Use format: {PlaceName}PN{Number} (e.g., HydPN101)".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_place_coded_identifiers() {
        assert!(is_valid("HydPN101"));
        assert!(is_valid("VizagPN202"));
        assert!(is_valid("aPN0"));
    }

    #[test]
    fn rejects_malformed_identifiers() {
        for code in ["Hyd101", "hyd_PN101", "PN101", "HydPN", "HydPN10a", " HydPN101", "HydPN101 ", ""] {
            assert!(!is_valid(code), "{code:?} should be rejected");
        }
    }

    #[test]
    fn extracts_place_prefix() {
        assert_eq!(place_prefix("VizagPN202"), Some("Vizag"));
        // The prefix is greedy but must leave "PN" for the separator
        assert_eq!(place_prefix("PNPN7"), Some("PN"));
        assert_eq!(place_prefix("Hyd101"), None);
    }
}
