//! Embedding files as `data:` URIs and getting them back out.

use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::ImageFormat;

use crate::error::{CatalogError, CatalogResult};
use crate::models::Attachment;

pub const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedData {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

pub fn encode(media_type: &str, bytes: &[u8]) -> String {
    let media_type = if media_type.trim().is_empty() {
        FALLBACK_MEDIA_TYPE
    } else {
        media_type
    };
    format!("data:{media_type};base64,{}", STANDARD.encode(bytes))
}

pub fn decode(uri: &str) -> CatalogResult<DecodedData> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| CatalogError::InvalidDataUri("missing data: prefix".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| CatalogError::InvalidDataUri("missing payload separator".to_string()))?;

    let (media_type, is_base64) = match header.strip_suffix(";base64") {
        Some(media_type) => (media_type, true),
        None => (header, false),
    };
    // Parameters such as `;charset=utf-8` are not part of the media type.
    let media_type = media_type.split(';').next().unwrap_or_default();
    let media_type = if media_type.is_empty() {
        "text/plain".to_string()
    } else {
        media_type.to_string()
    };

    let bytes = if is_base64 {
        STANDARD
            .decode(payload.trim())
            .map_err(|err| CatalogError::InvalidDataUri(err.to_string()))?
    } else {
        payload.as_bytes().to_vec()
    };

    Ok(DecodedData { media_type, bytes })
}

pub fn media_type_for_path(path: &Path) -> String {
    if let Ok(format) = ImageFormat::from_path(path) {
        return format.to_mime_type().to_string();
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let media_type = match extension.as_str() {
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "epub" => "application/epub+zip",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "zip" => "application/zip",
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "mp3" => "audio/mpeg",
        _ => FALLBACK_MEDIA_TYPE,
    };
    media_type.to_string()
}

pub fn attachment_from_bytes(name: &str, media_type: Option<&str>, bytes: &[u8]) -> Attachment {
    let media_type = media_type
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| media_type_for_path(Path::new(name)));
    Attachment {
        name: name.to_string(),
        data: encode(&media_type, bytes),
        media_type,
    }
}

/// Reads a file from disk and embeds it.
pub fn read_asset(path: &Path) -> CatalogResult<Attachment> {
    let bytes = fs::read(path).map_err(|source| CatalogError::AssetRead {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "datei".to_string());
    log::debug!("embedded {} ({} bytes)", path.display(), bytes.len());
    Ok(attachment_from_bytes(&name, None, &bytes))
}

/// Writes an attachment's payload into `dir`, returning the written path.
pub fn write_attachment(attachment: &Attachment, dir: &Path) -> CatalogResult<PathBuf> {
    let decoded = decode(&attachment.data)?;
    fs::create_dir_all(dir)?;
    let target = dir.join(safe_file_name(&attachment.name));
    fs::write(&target, decoded.bytes)?;
    log::info!("saved attachment to {}", target.display());
    Ok(target)
}

fn safe_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '/' | '\\' | ':'))
        .collect();
    if cleaned.trim().is_empty() || cleaned == "." || cleaned == ".." {
        "download".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_keeps_bytes() {
        let uri = encode("image/png", &[0, 1, 2, 254, 255]);
        assert!(uri.starts_with("data:image/png;base64,"));
        let decoded = decode(&uri).unwrap();
        assert_eq!(decoded.media_type, "image/png");
        assert_eq!(decoded.bytes, vec![0, 1, 2, 254, 255]);
    }

    #[test]
    fn empty_media_type_uses_fallback() {
        assert!(encode("", b"x").starts_with("data:application/octet-stream;base64,"));
    }

    #[test]
    fn decode_rejects_other_schemes() {
        assert!(decode("https://example.com/a.png").is_err());
        assert!(decode("data:image/png;base64").is_err());
        assert!(decode("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn plain_payload_with_charset() {
        let decoded = decode("data:text/plain;charset=utf-8,hallo").unwrap();
        assert_eq!(decoded.media_type, "text/plain");
        assert_eq!(decoded.bytes, b"hallo");
    }

    #[test]
    fn media_types_from_extension() {
        assert_eq!(media_type_for_path(Path::new("cover.PNG")), "image/png");
        assert_eq!(media_type_for_path(Path::new("a/b/book.pdf")), "application/pdf");
        assert_eq!(media_type_for_path(Path::new("clip.mp4")), "video/mp4");
        assert_eq!(media_type_for_path(Path::new("noext")), FALLBACK_MEDIA_TYPE);
    }

    #[test]
    fn file_names_cannot_escape_the_target_dir() {
        assert_eq!(safe_file_name("../../etc/passwd"), "passwd");
        assert_eq!(safe_file_name(".."), "download");
        assert_eq!(safe_file_name("Kapitel 1.pdf"), "Kapitel 1.pdf");
    }

    #[test]
    fn read_and_write_attachment_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("notes.txt");
        fs::write(&source, "Inhalt").unwrap();

        let attachment = read_asset(&source).unwrap();
        assert_eq!(attachment.name, "notes.txt");
        assert_eq!(attachment.media_type, "text/plain");

        let out_dir = dir.path().join("downloads");
        let written = write_attachment(&attachment, &out_dir).unwrap();
        assert_eq!(fs::read_to_string(written).unwrap(), "Inhalt");
    }

    #[test]
    fn missing_file_reports_path() {
        let err = read_asset(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, CatalogError::AssetRead { .. }));
    }
}
