//! Canonical region codes and the free-text locale mapping.
//!
//! Customers type region names inconsistently on the storefront; couriers
//! pick theirs from a fixed keyboard. Resolution is total: unknown input is
//! passed through unchanged and simply matches no couriers downstream.

/// Canonical code paired with the display name shown on the region keyboard.
pub const REGIONS: &[(&str, &str)] = &[
    ("tashkent", "Toshkent"),
    ("samarkand", "Samarqand"),
    ("bukhara", "Buxoro"),
    ("andijan", "Andijon"),
    ("fergana", "Fargʻona"),
    ("namangan", "Namangan"),
    ("kashkadarya", "Qashqadaryo"),
    ("surkhandarya", "Surxondaryo"),
    ("jizzakh", "Jizzax"),
    ("syrdarya", "Sirdaryo"),
    ("navoiy", "Navoiy"),
    ("khorezm", "Xorazm"),
    ("karakalpakstan", "Qoraqalpogʻiston"),
];

/// Maps a free-form locale string to a canonical region code.
///
/// Exact-match lookup over the known spellings (both the ASCII apostrophe
/// and the ʻ variants occur upstream). On a miss the input is returned
/// unchanged as a best-effort code, so already-canonical codes pass through.
pub fn resolve(free_text: &str) -> &str {
    match free_text {
        "Toshkent" | "Toshkent shahri" | "Toshkent viloyati" => "tashkent",
        "Samarqand" => "samarkand",
        "Buxoro" => "bukhara",
        "Andijon" => "andijan",
        "Farg'ona" | "Fargʻona" => "fergana",
        "Namangan" => "namangan",
        "Qashqadaryo" => "kashkadarya",
        "Surxondaryo" => "surkhandarya",
        "Jizzax" => "jizzakh",
        "Sirdaryo" => "syrdarya",
        "Navoiy" => "navoiy",
        "Xorazm" => "khorezm",
        "Qoraqalpog'iston" | "Qoraqalpogʻiston" => "karakalpakstan",
        other => other,
    }
}

/// Looks up the canonical code for a keyboard display name.
pub fn name_to_code(display_name: &str) -> Option<&'static str> {
    REGIONS
        .iter()
        .find(|(_, name)| *name == display_name)
        .map(|(code, _)| *code)
}

/// Display name for a canonical code, falling back to the code itself for
/// orders whose region never resolved.
pub fn display_name(code: &str) -> &str {
    REGIONS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or(code)
}
