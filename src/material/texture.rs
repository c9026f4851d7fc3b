use std::path::Path;
use std::sync::Arc;

use image::Rgb32FImage;
use rand::RngCore;

use crate::geometry::{Color, FloatType, Ray, TexturePoint};
use crate::scene::Intersection;

use super::{Material, ScatterSample, sample_cosine_hemisphere};

/// Bilinearly filtered image texture with repeat addressing.
pub struct Texture {
    image: Rgb32FImage,
}

impl Texture {
    pub fn open(path: impl AsRef<Path>) -> Result<Texture, image::ImageError> {
        Ok(Texture {
            image: image::open(path)?.to_rgb32f(),
        })
    }

    pub fn from_image(image: Rgb32FImage) -> Texture {
        Texture { image }
    }

    pub fn texel(&self, uv: &TexturePoint) -> Color {
        let (width, height) = (self.image.width(), self.image.height());

        // Repeat addressing; v is flipped to match the OBJ convention of
        // texture origin in the lower left corner.
        let x = uv.x.rem_euclid(1.0) * (width as FloatType) - 0.5;
        let y = (1.0 - uv.y).rem_euclid(1.0) * (height as FloatType) - 0.5;

        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;

        let fetch = |x: FloatType, y: FloatType| -> Color {
            let x = (x.rem_euclid(width as FloatType) as u32).min(width - 1);
            let y = (y.rem_euclid(height as FloatType) as u32).min(height - 1);
            let pixel = self.image.get_pixel(x, y);
            Color::new(pixel[0], pixel[1], pixel[2])
        };

        fetch(x0, y0) * ((1.0 - fx) * (1.0 - fy))
            + fetch(x0 + 1.0, y0) * (fx * (1.0 - fy))
            + fetch(x0, y0 + 1.0) * ((1.0 - fx) * fy)
            + fetch(x0 + 1.0, y0 + 1.0) * (fx * fy)
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .finish()
    }
}

/// Lambertian surface with its albedo looked up from a texture.
#[derive(Debug)]
pub struct DiffuseTextured {
    pub texture: Arc<Texture>,
}

impl DiffuseTextured {
    pub fn new(texture: Arc<Texture>) -> DiffuseTextured {
        DiffuseTextured { texture }
    }
}

impl Material for DiffuseTextured {
    fn sample_ray(
        &self,
        _ray: &Ray,
        intersection: &Intersection,
        rng: &mut dyn RngCore,
    ) -> ScatterSample {
        let normal = intersection.shading_normal();
        let direction = sample_cosine_hemisphere(&normal, rng);

        let weight = if direction.dot(&normal) > 0.0 {
            self.texture.texel(&intersection.tex)
        } else {
            Color::zeros()
        };

        ScatterSample {
            direction,
            origin: intersection.point,
            normal,
            weight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::assert;

    fn checker() -> Texture {
        // 2x2 texture: black and white checkerboard
        let image = Rgb32FImage::from_fn(2, 2, |x, y| {
            if (x + y) % 2 == 0 {
                image::Rgb([0.0, 0.0, 0.0])
            } else {
                image::Rgb([1.0, 1.0, 1.0])
            }
        });
        Texture::from_image(image)
    }

    #[test]
    fn texel_centers_are_exact() {
        let t = checker();
        // uv (0.25, 0.75) is the center of pixel (0, 0) after the v flip
        assert!(t.texel(&TexturePoint::new(0.25, 0.75)) == Color::zeros());
        assert!(t.texel(&TexturePoint::new(0.75, 0.75)) == Color::repeat(1.0));
    }

    #[test]
    fn filtering_blends_neighbours() {
        let t = checker();
        // Halfway between a black and a white texel center
        let c = t.texel(&TexturePoint::new(0.5, 0.75));
        assert!((c.x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn addressing_wraps() {
        let t = checker();
        let a = t.texel(&TexturePoint::new(0.25, 0.75));
        let b = t.texel(&TexturePoint::new(1.25, 0.75));
        assert!((a - b).norm() < 1e-5);
    }
}
