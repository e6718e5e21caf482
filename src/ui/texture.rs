use egui::{Context, TextureHandle, TextureOptions};
use image::RgbImage;

/// GPU texture that follows the live camera frame
pub struct PreviewTexture {
    name: &'static str,
    texture: Option<TextureHandle>,
}

impl PreviewTexture {
    pub fn new(name: &'static str) -> Self {
        Self { name, texture: None }
    }

    pub fn texture(&self) -> Option<&TextureHandle> {
        self.texture.as_ref()
    }

    pub fn update(&mut self, ctx: &Context, image: &RgbImage) {
        // Skip invalid frames to prevent a white flash
        if image.width() == 0 || image.height() == 0 {
            return;
        }

        let size = [image.width() as usize, image.height() as usize];
        let pixels = image.as_flat_samples();
        let color_image = egui::ColorImage::from_rgb(size, pixels.as_slice());

        // Reuse the texture while the resolution is unchanged
        if let Some(texture) = self.texture.as_mut().filter(|t| t.size() == size) {
            texture.set(color_image, TextureOptions::LINEAR);
            return;
        }
        self.texture = Some(ctx.load_texture(self.name, color_image, TextureOptions::LINEAR));
    }

    pub fn clear(&mut self) {
        self.texture = None;
    }
}

pub fn fit_image_in_rect(image_size: egui::Vec2, container_size: egui::Vec2) -> egui::Vec2 {
    let scale = (container_size.x / image_size.x).min(container_size.y / image_size.y);
    image_size * scale
}

pub fn center_rect_in_rect(content_size: egui::Vec2, container: egui::Rect) -> egui::Rect {
    let offset = (container.size() - content_size) * 0.5;
    egui::Rect::from_min_size(container.min + offset, content_size)
}
