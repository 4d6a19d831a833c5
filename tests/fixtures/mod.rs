//! Generated images and CSV batches for pipeline tests

#![allow(dead_code)]

use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

pub const HEADER: &str = "S. No.,Product Name,Input Image Urls";

/// Base URL of the fake image host served by `StaticFetcher`.
pub const IMAGE_HOST: &str = "https://images.test";

pub fn image_url(name: &str) -> String {
    format!("{IMAGE_HOST}/{name}")
}

/// Incompressible RGB noise encoded as PNG.
///
/// PNG barely shrinks noise, so the JPEG pipeline reaches its size target on
/// the first iteration.
pub fn noise_png(width: u32, height: u32, seed: u64) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let v = splitmix(seed ^ ((u64::from(y) << 32) | u64::from(x)));
        Rgb([v as u8, (v >> 8) as u8, (v >> 16) as u8])
    });
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .expect("encode PNG fixture");
    out
}

fn splitmix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Bytes that no decoder accepts.
pub fn not_an_image() -> Vec<u8> {
    b"<html>definitely not an image</html>".to_vec()
}

/// Build a batch CSV. URLs for one product are joined into a single quoted cell.
pub fn batch_csv(rows: &[(i32, &str, Vec<String>)]) -> String {
    let mut csv = String::from(HEADER);
    csv.push('\n');
    for (serial, name, urls) in rows {
        csv.push_str(&format!("{serial},{name},\"{}\"\n", urls.join(", ")));
    }
    csv
}
