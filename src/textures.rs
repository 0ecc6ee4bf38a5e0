use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use eframe::egui;
use egui::{Color32, Stroke};

use crate::data_uri;

struct DecodedImage {
    size: [usize; 2],
    rgba: Vec<u8>,
}

/// Decodes data-URI images into egui textures once and keeps them around.
/// Failed decodes (SVG placeholders, broken payloads) are remembered too.
#[derive(Default)]
pub struct TextureCache {
    textures: HashMap<u64, Option<egui::TextureHandle>>,
}

impl TextureCache {
    pub fn get(&mut self, ctx: &egui::Context, uri: &str) -> Option<egui::TextureHandle> {
        let key = texture_key(uri);
        self.textures
            .entry(key)
            .or_insert_with(|| match decode_image(uri) {
                Ok(decoded) => {
                    let color_image =
                        egui::ColorImage::from_rgba_unmultiplied(decoded.size, &decoded.rgba);
                    Some(ctx.load_texture(
                        format!("catalog-image-{key:x}"),
                        color_image,
                        egui::TextureOptions::LINEAR,
                    ))
                }
                Err(err) => {
                    log::debug!("image not displayable: {err}");
                    None
                }
            })
            .clone()
    }

    pub fn clear(&mut self) {
        self.textures.clear();
    }
}

const SAMPLE_COUNT: usize = 32;
const SAMPLE_LEN: usize = 64;

/// Fingerprint of a data URI from its length and evenly spaced windows, so
/// lookups cost the same for a thumbnail and a multi-megabyte scan.
fn texture_key(uri: &str) -> u64 {
    let bytes = uri.as_bytes();
    let mut hasher = DefaultHasher::new();
    bytes.len().hash(&mut hasher);
    if bytes.len() <= SAMPLE_COUNT * SAMPLE_LEN {
        bytes.hash(&mut hasher);
        return hasher.finish();
    }

    let stride = bytes.len() / SAMPLE_COUNT;
    for start in (0..SAMPLE_COUNT).map(|sample| sample * stride) {
        bytes[start..start + SAMPLE_LEN].hash(&mut hasher);
    }
    bytes[bytes.len() - SAMPLE_LEN..].hash(&mut hasher);
    hasher.finish()
}

fn decode_image(uri: &str) -> Result<DecodedImage, String> {
    let decoded = data_uri::decode(uri).map_err(|err| err.to_string())?;
    let img = image::load_from_memory(&decoded.bytes)
        .map_err(|err| format!("could not decode {}: {err}", decoded.media_type))?;
    let rgba = img.to_rgba8();
    Ok(DecodedImage {
        size: [rgba.width() as usize, rgba.height() as usize],
        rgba: rgba.into_raw(),
    })
}

/// Draws `uri` scaled into `size`, or the placeholder frame when it cannot
/// be shown.
pub fn cover_image(
    ui: &mut egui::Ui,
    cache: &mut TextureCache,
    uri: &str,
    size: egui::Vec2,
) -> egui::Response {
    match cache.get(ui.ctx(), uri) {
        Some(texture) => ui.add(
            egui::Image::new(egui::load::SizedTexture::from_handle(&texture))
                .fit_to_exact_size(size)
                .maintain_aspect_ratio(true),
        ),
        None => placeholder(ui, size),
    }
}

fn placeholder(ui: &mut egui::Ui, size: egui::Vec2) -> egui::Response {
    let (rect, response) = ui.allocate_exact_size(size, egui::Sense::hover());
    let painter = ui.painter();
    painter.rect_filled(rect, 6.0, Color32::from_rgb(0x1a, 0x3d, 0x4f));
    painter.rect_stroke(rect, 6.0, Stroke::new(1.0, Color32::from_rgb(0x40, 0xe0, 0xd0)));
    painter.text(
        rect.center(),
        egui::Align2::CENTER_CENTER,
        "Buchcover",
        egui::FontId::proportional(16.0),
        Color32::from_rgb(0x40, 0xe0, 0xd0),
    );
    response
}
