//! 截图裁剪与编码。

use std::path::Path;

use image::{DynamicImage, GenericImageView, ImageFormat};

use super::{ElementBox, RenderError};

/// 按元素边框裁剪，超出截图范围的部分被截掉。
pub fn crop_to_box(png: &[u8], element: ElementBox) -> Result<DynamicImage, RenderError> {
    let img = image::load_from_memory(png)?;
    let (img_w, img_h) = img.dimensions();

    let left = element.x.max(0.0).floor() as u32;
    let top = element.y.max(0.0).floor() as u32;
    let right = ((element.x + element.width).ceil().max(0.0) as u32).min(img_w);
    let bottom = ((element.y + element.height).ceil().max(0.0) as u32).min(img_h);

    if right <= left || bottom <= top {
        return Err(RenderError::EmptyCrop);
    }

    Ok(img.crop_imm(left, top, right - left, bottom - top))
}

/// 裁剪后按目标扩展名编码写盘，未知扩展名按 PNG 保存。
pub fn crop_and_save(png: &[u8], element: ElementBox, destination: &Path) -> Result<(), RenderError> {
    let cropped = crop_to_box(png, element)?;
    let format = ImageFormat::from_path(destination).unwrap_or(ImageFormat::Png);
    let cropped = match format {
        // JPEG 不支持 alpha 通道
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(cropped.to_rgb8()),
        _ => cropped,
    };
    cropped.save_with_format(destination, format)?;
    Ok(())
}
