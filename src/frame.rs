use image::imageops::{self, FilterType};
use image::RgbaImage;

/// Packs an RGBA capture into the BGR24 layout the encoder reads.
///
/// Captures whose size differs from the sink's frame size are resized first.
pub fn rgba_to_bgr24(image: &RgbaImage, width: u32, height: u32) -> Vec<u8> {
    let resized;
    let source = if image.dimensions() == (width, height) {
        image
    } else {
        log::debug!(
            "Resizing capture {:?} to {}x{}",
            image.dimensions(),
            width,
            height
        );
        resized = imageops::resize(image, width, height, FilterType::Triangle);
        &resized
    };

    let mut bgr = Vec::with_capacity(width as usize * height as usize * 3);
    for px in source.as_raw().chunks_exact(4) {
        bgr.extend_from_slice(&[px[2], px[1], px[0]]);
    }
    bgr
}
