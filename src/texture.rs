use egui::{Context, TextureHandle, TextureOptions};
use image::RgbImage;

/// GPU textures for the live preview and the frozen snapshot.
#[derive(Default)]
pub struct FrameTextures {
    pub preview: Option<TextureHandle>,
    pub captured: Option<TextureHandle>,
}

impl FrameTextures {
    pub fn update_preview(&mut self, ctx: &Context, image: &RgbImage) {
        // Skip invalid frames instead of flashing an empty texture
        if image.width() == 0 || image.height() == 0 {
            return;
        }

        let size = [image.width() as usize, image.height() as usize];
        let color_image = to_color_image(image);

        // Reuse existing texture across live frames
        if let Some(texture) = self.preview.as_mut().filter(|t| t.size() == size) {
            texture.set(color_image, TextureOptions::LINEAR);
        } else {
            self.preview = Some(ctx.load_texture("camera_preview", color_image, TextureOptions::LINEAR));
        }
    }

    pub fn set_captured(&mut self, ctx: &Context, image: &RgbImage) {
        self.captured = Some(ctx.load_texture("captured_frame", to_color_image(image), TextureOptions::LINEAR));
    }

    pub fn clear_preview(&mut self) {
        self.preview = None;
    }

    pub fn clear(&mut self) {
        self.preview = None;
        self.captured = None;
    }

    pub fn is_empty(&self) -> bool {
        self.preview.is_none() && self.captured.is_none()
    }
}

fn to_color_image(image: &RgbImage) -> egui::ColorImage {
    let size = [image.width() as usize, image.height() as usize];
    let pixels = image.as_flat_samples();
    egui::ColorImage::from_rgb(size, pixels.as_slice())
}
