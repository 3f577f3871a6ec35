/// Uppercase and strip separators from a MAC address so router-reported and
/// durable-store-reported addresses compare equal regardless of which
/// delimiter (or none) the source used (§4.10 step 3).
pub fn normalize_mac(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_hexdigit())
        .collect::<String>()
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_colons_and_dashes() {
        assert_eq!(normalize_mac("aa:bb:cc:dd:ee:ff"), "AABBCCDDEEFF");
        assert_eq!(normalize_mac("AA-BB-CC-DD-EE-FF"), "AABBCCDDEEFF");
    }

    #[test]
    fn already_normalized_is_unchanged() {
        assert_eq!(normalize_mac("AABBCCDDEEFF"), "AABBCCDDEEFF");
    }

    #[test]
    fn ignores_unexpected_characters() {
        assert_eq!(normalize_mac("aa bb.cc-dd:ee_ff"), "AABBCCDDEEFF");
    }
}
