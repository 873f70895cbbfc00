//! Language code to display name lookup.

use once_cell::sync::Lazy;
use std::collections::HashMap;

static LANGUAGE_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("EN", "English"),
        ("ES", "Spanish"),
        ("PT", "Portuguese"),
        ("FR", "French"),
        ("DE", "German"),
        ("IT", "Italian"),
        ("RU", "Russian"),
        ("ZH", "Chinese"),
        ("JA", "Japanese"),
        ("AR", "Arabic"),
        ("TR", "Turkish"),
        ("NL", "Dutch"),
        ("SV", "Swedish"),
        ("NO", "Norwegian"),
        ("DA", "Danish"),
        ("FI", "Finnish"),
        ("PL", "Polish"),
        ("CS", "Czech"),
        ("HU", "Hungarian"),
        ("RO", "Romanian"),
        ("BG", "Bulgarian"),
        ("HR", "Croatian"),
        ("SK", "Slovak"),
        ("SL", "Slovenian"),
        ("ET", "Estonian"),
        ("LV", "Latvian"),
        ("LT", "Lithuanian"),
        ("EL", "Greek"),
        ("CA", "Catalan"),
        ("IS", "Icelandic"),
        ("MK", "Macedonian"),
        ("SR", "Serbian"),
        ("UK", "Ukrainian"),
        ("BE", "Belarusian"),
        ("KO", "Korean"),
        ("TH", "Thai"),
        ("VI", "Vietnamese"),
        ("ID", "Indonesian"),
        ("MS", "Malay"),
        ("HI", "Hindi"),
        ("BN", "Bengali"),
        ("UR", "Urdu"),
        ("FA", "Persian"),
        ("HE", "Hebrew"),
        ("SW", "Swahili"),
        ("AF", "Afrikaans"),
    ])
});

/// Display name for a language code; unknown codes pass through unchanged.
pub fn language_name(code: &str) -> &str {
    LANGUAGE_NAMES.get(code).copied().unwrap_or(code)
}
