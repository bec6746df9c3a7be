//! Upload safety checks for customer pictures.
//!
//! Two layers:
//! 1. The browser-reported media type must be `image/*` (or, when absent,
//!    the extension must name an image format)
//! 2. Magic byte sniffing must not recognize the bytes as a non-image type
//!
//! Files that pass keep their bytes untouched; nothing is transcoded.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Magic byte signatures that are never accepted as pictures, even when the
/// claimed media type says otherwise.
pub const EXECUTABLE_SIGNATURES: &[(&str, &[u8])] = &[
    ("Windows PE/MZ", &[0x4D, 0x5A]),
    ("ELF", &[0x7F, 0x45, 0x4C, 0x46]),
    ("Mach-O 32", &[0xFE, 0xED, 0xFA, 0xCE]),
    ("Mach-O 64", &[0xFE, 0xED, 0xFA, 0xCF]),
    ("Mach-O Fat / Java Class", &[0xCA, 0xFE, 0xBA, 0xBE]),
    ("WebAssembly", &[0x00, 0x61, 0x73, 0x6D]),
];

/// Extensions accepted as images when the claimed media type is empty.
static IMAGE_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff", "heic", "heif", "avif", "svg",
        "ico",
    ]
    .into_iter()
    .collect()
});

/// Result of checking whether a selected file is an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageCheck {
    /// Accepted; carries the media type to store the blob under.
    Image { content_type: String },
    /// Rejected; carries what the file looked like instead.
    NotImage { detected: String },
}

impl ImageCheck {
    pub fn is_image(&self) -> bool {
        matches!(self, ImageCheck::Image { .. })
    }
}

/// Decide whether a selected file may be stored as a customer picture.
pub fn is_image_upload(filename: &str, data: &[u8], claimed: &str) -> ImageCheck {
    for (name, magic) in EXECUTABLE_SIGNATURES {
        if data.len() >= magic.len() && &data[..magic.len()] == *magic {
            return ImageCheck::NotImage {
                detected: format!("executable:{}", name.to_lowercase().replace(' ', "_")),
            };
        }
    }

    let claimed = claimed.trim().to_ascii_lowercase();
    let claimed_image = if claimed.is_empty() {
        extension(filename)
            .map(|ext| IMAGE_EXTENSIONS.contains(ext.as_str()))
            .unwrap_or(false)
    } else {
        claimed.starts_with("image/")
    };
    if !claimed_image {
        return ImageCheck::NotImage {
            detected: if claimed.is_empty() {
                "unknown".to_string()
            } else {
                claimed
            },
        };
    }

    match infer::get(data) {
        Some(kind) if kind.matcher_type() != infer::MatcherType::Image => ImageCheck::NotImage {
            detected: kind.mime_type().to_string(),
        },
        _ => ImageCheck::Image {
            content_type: detect_content_type(filename, data, &claimed),
        },
    }
}

/// Detect the media type to store a blob under.
///
/// Magic bytes win, then a known image extension, then the claimed type.
pub fn detect_content_type(filename: &str, data: &[u8], claimed: &str) -> String {
    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }
    if let Some(mime) = extension(filename).and_then(|ext| mime_from_extension(&ext)) {
        return mime.to_string();
    }
    if claimed.trim().is_empty() {
        return "application/octet-stream".to_string();
    }
    claimed.trim().to_string()
}

fn extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        "avif" => Some("image/avif"),
        "svg" => Some("image/svg+xml"),
        "ico" => Some("image/vnd.microsoft.icon"),
        _ => None,
    }
}

/// Sanitize filename for safe storage
pub fn sanitize_filename(filename: &str) -> String {
    // Remove path components
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let sanitized = sanitized.trim();
    if sanitized.is_empty() {
        return "unnamed_file".to_string();
    }

    // Truncate on a char boundary, keeping the extension
    if sanitized.len() > 255 {
        let (stem, ext) = match sanitized.rfind('.') {
            Some(dot) if sanitized.len() - dot <= 16 => (&sanitized[..dot], &sanitized[dot..]),
            _ => (sanitized, ""),
        };
        let mut cut = 255 - ext.len();
        while !stem.is_char_boundary(cut) {
            cut -= 1;
        }
        return format!("{}{}", &stem[..cut], ext);
    }

    sanitized.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_png_with_image_claim_accepted() {
        let check = is_image_upload("porch.png", &PNG, "image/png");
        assert_eq!(
            check,
            ImageCheck::Image {
                content_type: "image/png".to_string()
            }
        );
    }

    #[test]
    fn test_text_claim_rejected() {
        let check = is_image_upload("notes.txt", b"hello", "text/plain");
        assert_eq!(
            check,
            ImageCheck::NotImage {
                detected: "text/plain".to_string()
            }
        );
    }

    #[test]
    fn test_pdf_bytes_behind_image_claim_rejected() {
        let check = is_image_upload("scan.jpg", b"%PDF-1.4 fake content", "image/jpeg");
        assert_eq!(
            check,
            ImageCheck::NotImage {
                detected: "application/pdf".to_string()
            }
        );
    }

    #[test]
    fn test_executable_rejected_even_with_image_claim() {
        let check = is_image_upload("cat.png", b"MZ\x90\x00rest", "image/png");
        assert!(!check.is_image());
    }

    #[test]
    fn test_unrecognized_bytes_trust_image_claim() {
        let check = is_image_upload("raw.heic", &[0u8; 64], "image/heic");
        assert!(check.is_image());
    }

    #[test]
    fn test_missing_claim_falls_back_to_extension() {
        assert!(is_image_upload("photo.JPG", &[0u8; 16], "").is_image());
        assert!(!is_image_upload("photo.doc", &[0u8; 16], "").is_image());
        assert!(!is_image_upload("photo", &[0u8; 16], "").is_image());
    }

    #[test]
    fn test_detect_content_type_prefers_magic_bytes() {
        assert_eq!(detect_content_type("x.jpg", &PNG, "image/jpeg"), "image/png");
        assert_eq!(detect_content_type("x.webp", &[0u8; 4], "image/png"), "image/webp");
        assert_eq!(detect_content_type("x", &[0u8; 4], "image/x-custom"), "image/x-custom");
        assert_eq!(detect_content_type("x", &[0u8; 4], ""), "application/octet-stream");
    }

    #[test]
    fn test_sanitize_filename_strips_paths_and_specials() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\pics\\a?b.png"), "a_b.png");
        assert_eq!(sanitize_filename("   "), "unnamed_file");
    }

    #[test]
    fn test_sanitize_filename_truncates_keeping_extension() {
        let long = format!("{}.png", "é".repeat(200));
        let out = sanitize_filename(&long);
        assert!(out.len() <= 255);
        assert!(out.ends_with(".png"));
    }
}
