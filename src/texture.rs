use std::io::Write;

use fast_image_resize::IntoImageView;
use gltf::json::image::MimeType;
use gltf::json::Root;
use image::{
    ImageEncoder, ImageFormat,
    codecs::{jpeg::JpegEncoder, png::PngEncoder},
};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::glb::{self, Staging};

/// Longest side clamped to `max_size`, aspect ratio kept, never below 1.
fn fit_within(width: u32, height: u32, max_size: u32) -> Option<(u32, u32)> {
    if width.max(height) <= max_size {
        return None;
    }
    let scale = max_size as f64 / width.max(height) as f64;
    let w = ((width as f64 * scale).round() as u32).clamp(1, max_size);
    let h = ((height as f64 * scale).round() as u32).clamp(1, max_size);
    Some((w, h))
}

fn resize<W: Write>(
    img_data: &[u8],
    format: ImageFormat,
    width: u32,
    height: u32,
    mut buf: W,
) -> Result<()> {
    let img = image::load_from_memory_with_format(img_data, format)?;
    let pixel_type = img
        .pixel_type()
        .ok_or_else(|| Error::Resize(format!("unsupported pixel layout {:?}", img.color())))?;

    let mut dst_img = fast_image_resize::images::Image::new(width, height, pixel_type);

    let mut resizer = fast_image_resize::Resizer::new();
    resizer
        .resize(&img, &mut dst_img, None)
        .map_err(|e| Error::Resize(e.to_string()))?;

    match format {
        ImageFormat::Jpeg => JpegEncoder::new(&mut buf).write_image(
            dst_img.buffer(),
            width,
            height,
            img.color().into(),
        )?,
        _ => PngEncoder::new(&mut buf).write_image(
            dst_img.buffer(),
            width,
            height,
            img.color().into(),
        )?,
    }

    Ok(())
}

/// Downscales embedded PNG/JPEG images whose longest side exceeds
/// `max_size`. A resized image replaces the original only when it is
/// smaller; failures leave the image untouched. Returns how many images
/// were replaced.
pub fn downscale_images(root: &mut Root, staging: &mut Staging, max_size: u32) -> Result<usize> {
    let mut resized = 0;

    for i in 0..root.images.len() {
        let Some(view) = root.images[i].buffer_view else {
            continue;
        };
        let data = glb::view_data(root, staging.data(), view)?;

        let format = match image::guess_format(data) {
            Ok(f @ (ImageFormat::Png | ImageFormat::Jpeg)) => f,
            _ => {
                debug!(image = i, "skipping image that is neither png nor jpeg");
                continue;
            }
        };
        let size = match imagesize::blob_size(data) {
            Ok(size) => size,
            Err(e) => {
                warn!(image = i, "cannot read image size: {e}");
                continue;
            }
        };
        let Some((width, height)) = fit_within(size.width as u32, size.height as u32, max_size)
        else {
            continue;
        };

        let mut new_data: Vec<u8> = Vec::new();
        if let Err(e) = resize(data, format, width, height, &mut new_data) {
            warn!(image = i, "resize failed, keeping original: {e}");
            continue;
        }
        if new_data.len() >= data.len() {
            debug!(image = i, "resized image is not smaller, keeping original");
            continue;
        }

        debug!(
            image = i,
            from = %format!("{}x{}", size.width, size.height),
            to = %format!("{width}x{height}"),
            "resized image"
        );
        let new_view = staging.push_view(root, &new_data);
        let img = &mut root.images[i];
        img.buffer_view = Some(new_view);
        img.mime_type = Some(MimeType(
            match format {
                ImageFormat::Jpeg => "image/jpeg",
                _ => "image/png",
            }
            .to_string(),
        ));
        resized += 1;
    }

    Ok(resized)
}
