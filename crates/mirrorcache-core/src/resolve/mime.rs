/// Content type for files with no known suffix.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Underscore suffix of a derived filename → content type.
const CONTENT_TYPES: &[(&str, &str)] = &[
    ("_js", "application/javascript"),
    ("_mjs", "application/javascript"),
    ("_css", "text/css"),
    ("_html", "text/html"),
    ("_htm", "text/html"),
    ("_json", "application/json"),
    ("_xml", "application/xml"),
    ("_txt", "text/plain"),
    ("_svg", "image/svg+xml"),
    ("_png", "image/png"),
    ("_jpg", "image/jpeg"),
    ("_jpeg", "image/jpeg"),
    ("_gif", "image/gif"),
    ("_webp", "image/webp"),
    ("_ico", "image/x-icon"),
    ("_woff", "font/woff"),
    ("_woff2", "font/woff2"),
    ("_ttf", "font/ttf"),
    ("_otf", "font/otf"),
    ("_wasm", "application/wasm"),
];

/// Infer a content type from a mirror filename.
///
/// Anything after a `?` is ignored. Unknown suffixes get
/// `application/octet-stream`.
///
/// Derived names turn `.` and `/` into the same `_`, so an extensionless
/// path whose last segment is a known suffix (`https://a.com/api/json`)
/// classifies as that type. The original extension cannot be recovered
/// from the filename.
pub fn classify(filename: &str) -> &'static str {
    let name = filename.split('?').next().unwrap_or(filename);
    let lower = name.to_ascii_lowercase();
    CONTENT_TYPES
        .iter()
        .find(|(suffix, _)| lower.ends_with(suffix))
        .map(|(_, content_type)| *content_type)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}
