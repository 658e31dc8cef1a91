//! Origin-specific heuristics as small declarative tables: what counts as a
//! product link, which kind a downloadable file is, which filename
//! convention implies which repair role, and the byte signatures that
//! separate real documents from soft-error HTML pages.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::AssetKind;

/// Path markers that identify non-product pages on the origin.
pub const EXCLUDED_PATH_MARKERS: &[&str] = &[
    "/products-by-category/",
    "/displays-by-size/",
    "/downloads/",
    "/media/",
    "/static/",
];

/// Image sources containing any of these are navigation chrome, not product
/// imagery.
pub const EXCLUDED_IMAGE_MARKERS: &[&str] = &["/nav/", "/logo/", "/template/", "placeholder"];

pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp"];

/// Leading-byte signatures of an HTML page. Any of these in a document body
/// means the origin served a soft-error page in place of the file.
pub const HTML_SIGNATURES: &[&[u8]] = &[b"<!doctype", b"<!DOCTYPE", b"<html"];

pub const PDF_MAGIC: &[u8] = b"%PDF";

/// How many leading bytes are inspected when classifying a file.
pub const SNIFF_LEN: usize = 100;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("static regex"));

/// Resize-parameter path segments like `/250x250/`; stripping them yields
/// the highest-resolution image variant.
static RESIZE_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+x\d+/").expect("static regex"));

/// Lowercase, collapse non-alphanumeric runs to `_`, trim, cap at 80 chars.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let slug = NON_ALNUM.replace_all(&lowered, "_");
    slug.trim_matches('_').chars().take(80).collect()
}

/// Strip resize segments from an image URL to prefer the original variant.
pub fn strip_resize_segments(url: &str) -> String {
    RESIZE_SEGMENT.replace_all(url, "/").into_owned()
}

/// Accept a URL path as a product page: not a known non-product area, at
/// least one path segment, no trailing separator, and long enough to carry
/// a product slug.
pub fn is_product_path(path: &str) -> bool {
    !EXCLUDED_PATH_MARKERS.iter().any(|m| path.contains(m))
        && path.matches('/').count() >= 1
        && !path.ends_with('/')
        && path.len() > 5
}

/// One rule in the asset classification table: needles checked against the
/// URL and the link text, in order.
struct KindRule {
    url_needles: &'static [&'static str],
    text_needles: &'static [&'static str],
    kind: AssetKind,
}

const KIND_RULES: &[KindRule] = &[
    KindRule {
        url_needles: &["graphictemplates"],
        text_needles: &["template", "artwork", "art file"],
        kind: AssetKind::Template,
    },
    KindRule {
        url_needles: &["instructionsheets"],
        text_needles: &["setup", "instruction", "assembly", "guide"],
        kind: AssetKind::SetupGuide,
    },
    KindRule {
        url_needles: &[],
        text_needles: &["brochure", "catalog", "sell sheet"],
        kind: AssetKind::Brochure,
    },
];

/// Classify a downloadable link by its URL and link text.
pub fn classify_asset(url: &str, link_text: &str) -> AssetKind {
    let url = url.to_lowercase();
    let text = link_text.to_lowercase();
    for rule in KIND_RULES {
        if rule.url_needles.iter().any(|n| url.contains(n))
            || rule.text_needles.iter().any(|n| text.contains(n))
        {
            return rule.kind;
        }
    }
    if IMAGE_EXTENSIONS.iter().any(|ext| url.contains(ext)) {
        return AssetKind::Image;
    }
    if url.contains(".pdf") {
        return AssetKind::Brochure;
    }
    if url.contains(".zip") {
        return AssetKind::Template;
    }
    AssetKind::Other
}

/// True when the sniffed header carries an HTML signature.
pub fn header_looks_html(head: &[u8]) -> bool {
    let head = &head[..head.len().min(SNIFF_LEN)];
    HTML_SIGNATURES
        .iter()
        .any(|sig| head.windows(sig.len()).any(|w| w == *sig))
}

/// Classify a persisted file header as broken: an HTML signature always
/// means broken, and a `.pdf` extension additionally demands the `%PDF`
/// magic.
pub fn header_is_broken(head: &[u8], extension: Option<&str>) -> bool {
    if header_looks_html(head) {
        return true;
    }
    match extension {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => !head.starts_with(PDF_MAGIC),
        _ => false,
    }
}

/// The role a broken file plays, inferred from its filename stem. Repair
/// only accepts a replacement candidate consistent with the role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairRole {
    GraphicTemplate,
    InstructionSheet,
    GenericResource,
    Any,
}

struct RoleRule {
    stem_suffix: &'static str,
    role: RepairRole,
}

const ROLE_RULES: &[RoleRule] = &[
    RoleRule {
        stem_suffix: "_graphic_templates",
        role: RepairRole::GraphicTemplate,
    },
    RoleRule {
        stem_suffix: "_templates_instructions",
        role: RepairRole::InstructionSheet,
    },
    RoleRule {
        stem_suffix: "_downloadable_resources",
        role: RepairRole::GenericResource,
    },
];

pub fn role_for_stem(stem: &str) -> RepairRole {
    ROLE_RULES
        .iter()
        .find(|r| stem.ends_with(r.stem_suffix))
        .map(|r| r.role)
        .unwrap_or(RepairRole::Any)
}

/// Does a candidate file from the downloads index fit the broken file's role?
pub fn candidate_matches_role(role: RepairRole, filename: &str, link_text: &str) -> bool {
    let text = link_text.to_lowercase();
    match role {
        RepairRole::GraphicTemplate => filename.contains("GT_") || text.contains("template"),
        RepairRole::InstructionSheet => filename.contains("IS_") || text.contains("instruction"),
        RepairRole::GenericResource => filename.to_lowercase().ends_with(".pdf"),
        RepairRole::Any => true,
    }
}

static STEM_SUFFIX_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)_downloadable_resources$",
        r"(?i)_graphic_templates$",
        r"(?i)_templates_instructions$",
        r"^[a-z]+_",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static regex"))
    .collect()
});

/// Recover a likely product name from a persisted filename stem by stripping
/// the known naming-convention suffixes and the leading category slug.
pub fn product_name_from_stem(stem: &str) -> String {
    let mut name = stem.to_string();
    for pattern in STEM_SUFFIX_PATTERNS.iter() {
        name = pattern.replace(&name, "").into_owned();
    }
    name
}

/// Title-case a hyphenated path segment: `banner-stands` becomes
/// `Banner Stands`.
pub fn title_case_segment(segment: &str) -> String {
    segment
        .split('-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_and_trims() {
        assert_eq!(slugify("Retractable Banner Stand 8ft"), "retractable_banner_stand_8ft");
        assert_eq!(slugify("  A -- B  "), "a_b");
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify("x".repeat(120).as_str()).len(), 80);
    }

    #[test]
    fn product_path_exclusions() {
        assert!(is_product_path("/retractable-banner-stand-8ft"));
        assert!(!is_product_path("/products-by-category/banner-stands"));
        assert!(!is_product_path("/downloads/downloadable-resources"));
        assert!(!is_product_path("/media/img.png"));
        assert!(!is_product_path("/retractable-banner/"));
        assert!(!is_product_path("/abc"));
    }

    #[test]
    fn asset_classification_table() {
        assert_eq!(
            classify_asset("https://cdn.example.com/GraphicTemplates/GT_1.pdf", ""),
            AssetKind::Template
        );
        assert_eq!(
            classify_asset("https://cdn.example.com/x.pdf", "Setup instructions"),
            AssetKind::SetupGuide
        );
        assert_eq!(
            classify_asset("https://cdn.example.com/x.pdf", "Product brochure"),
            AssetKind::Brochure
        );
        assert_eq!(classify_asset("https://cdn.example.com/a.jpg", ""), AssetKind::Image);
        assert_eq!(classify_asset("https://cdn.example.com/a.pdf", ""), AssetKind::Brochure);
        assert_eq!(classify_asset("https://cdn.example.com/a.zip", ""), AssetKind::Template);
        assert_eq!(classify_asset("https://cdn.example.com/a.bin", ""), AssetKind::Other);
    }

    #[test]
    fn pdf_magic_is_never_broken() {
        assert!(!header_is_broken(b"%PDF-1.4 rest of file", Some("pdf")));
    }

    #[test]
    fn html_header_is_always_broken_regardless_of_extension() {
        assert!(header_is_broken(b"<!doctype html><html>", Some("pdf")));
        assert!(header_is_broken(b"<!DOCTYPE HTML>", Some("zip")));
        assert!(header_is_broken(b"  <!doctype html>", Some("jpg")));
        assert!(header_is_broken(b"<html lang=\"en\">", None));
    }

    #[test]
    fn pdf_without_magic_is_broken() {
        assert!(header_is_broken(b"garbage bytes", Some("pdf")));
        assert!(!header_is_broken(b"garbage bytes", Some("zip")));
    }

    #[test]
    fn resize_segments_are_stripped() {
        assert_eq!(
            strip_resize_segments("https://x.com/media/250x250/stand.jpg"),
            "https://x.com/media/stand.jpg"
        );
        assert_eq!(
            strip_resize_segments("https://x.com/media/stand.jpg"),
            "https://x.com/media/stand.jpg"
        );
    }

    #[test]
    fn repair_roles_from_filename_conventions() {
        assert_eq!(
            role_for_stem("banner_stand_graphic_templates"),
            RepairRole::GraphicTemplate
        );
        assert_eq!(
            role_for_stem("banner_stand_templates_instructions"),
            RepairRole::InstructionSheet
        );
        assert_eq!(
            role_for_stem("banner_stand_downloadable_resources"),
            RepairRole::GenericResource
        );
        assert_eq!(role_for_stem("banner_stand"), RepairRole::Any);

        assert!(candidate_matches_role(RepairRole::GraphicTemplate, "GT_8ft.pdf", ""));
        assert!(candidate_matches_role(RepairRole::GraphicTemplate, "x.pdf", "Graphic Template"));
        assert!(!candidate_matches_role(RepairRole::GraphicTemplate, "IS_8ft.pdf", "setup"));
        assert!(candidate_matches_role(RepairRole::InstructionSheet, "IS_8ft.pdf", ""));
        assert!(candidate_matches_role(RepairRole::GenericResource, "anything.pdf", ""));
        assert!(!candidate_matches_role(RepairRole::GenericResource, "anything.zip", ""));
    }

    #[test]
    fn product_name_recovered_from_stem() {
        assert_eq!(
            product_name_from_stem("retractable_banner_stand_8ft_graphic_templates"),
            "banner_stand_8ft"
        );
        assert_eq!(
            product_name_from_stem("telescopic_stand_downloadable_resources"),
            "stand"
        );
    }

    #[test]
    fn title_case_segments() {
        assert_eq!(title_case_segment("banner-stands"), "Banner Stands");
        assert_eq!(title_case_segment("retractable"), "Retractable");
    }
}
