use once_cell::sync::Lazy;
use std::collections::HashMap;

pub(crate) const UNSUPPORTED_DATETIME_LEVELS: &str = "unsupportedDatetimeLevels";
pub(crate) const UNSUPPORTED_FILTER: &str = "unsupportedFilter";

/// User-facing message catalog. Keys are stable so embedders can ship
/// translations; the built-in catalog is the English fallback.
static CATALOG: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (
            UNSUPPORTED_DATETIME_LEVELS,
            "The date/time level combination {levels} is not supported in pivot queries.",
        ),
        (
            UNSUPPORTED_FILTER,
            "The filter on \"{title}\" uses an option that pivot queries do not support: {key}.",
        ),
    ])
});

/// Renders a catalog message, substituting `{name}` placeholders. Unknown
/// keys fall back to the key itself so a missing translation never panics.
pub fn localized(key: &str, args: &[(&str, &str)]) -> String {
    let template = CATALOG.get(key).copied().unwrap_or(key);
    let mut rendered = template.to_string();
    for (name, value) in args {
        rendered = rendered.replace(&format!("{{{name}}}"), value);
    }
    rendered
}
