//! Thumbnail fetch for the preview pane.
//!
//! Best-effort like the metadata probe itself: any failure (bad URL,
//! network, decode) simply yields no preview.

use tracing::debug;

/// Decoded RGBA pixels, ready to hand to the image widget.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

pub async fn fetch_thumbnail(thumbnail_url: &str) -> Option<Thumbnail> {
    let parsed = url::Url::parse(thumbnail_url).ok()?;

    let response = reqwest::get(parsed).await.ok()?.error_for_status().ok()?;
    let bytes: bytes::Bytes = response.bytes().await.ok()?;

    let decoded = match image::load_from_memory(&bytes) {
        Ok(img) => img,
        Err(e) => {
            debug!(error = %e, "thumbnail decode failed");
            return None;
        }
    };
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();

    Some(Thumbnail {
        rgba: rgba.into_raw(),
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([255, 0, 0, 255]));
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn test_fetch_thumbnail_decodes_image() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/thumb.png")
            .with_status(200)
            .with_body(png_bytes(4, 3))
            .create_async()
            .await;

        let thumb = fetch_thumbnail(&format!("{}/thumb.png", server.url()))
            .await
            .unwrap();
        assert_eq!((thumb.width, thumb.height), (4, 3));
        assert_eq!(thumb.rgba.len(), 4 * 3 * 4);
    }

    #[tokio::test]
    async fn test_fetch_thumbnail_handles_bad_input() {
        assert!(fetch_thumbnail("not a url").await.is_none());

        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/nope.png")
            .with_status(404)
            .create_async()
            .await;
        assert!(
            fetch_thumbnail(&format!("{}/nope.png", server.url()))
                .await
                .is_none()
        );
    }
}
