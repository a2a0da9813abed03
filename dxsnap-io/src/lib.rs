use std::fs;
use std::path::{Path, PathBuf};

use dxsnap_core::document::Document;
use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use thiserror::Error;

/// JPEG 编码质量上限/默认值。
pub const DEFAULT_JPEG_QUALITY: u8 = 100;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("读取文件 {path:?} 失败: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("写入文件 {path:?} 失败: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析文档 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("序列化文档失败: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("图像编码失败: {0}")]
    Encode(#[from] image::ImageError),
    #[error("像素缓冲区长度不符: 期望 {expected} 字节，实际 {actual} 字节")]
    BufferSize { expected: usize, actual: usize },
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError>;
}

/// JSON 文档门面。
///
/// DXF 字节流的解析交由外部解析器完成；本门面只负责接手其产出的
/// 实体/块模型的序列化形态。
pub struct JsonFacade;

impl JsonFacade {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for JsonFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| IoError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl DocumentSaver for JsonFacade {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError> {
        let data = serde_json::to_string_pretty(document).map_err(IoError::Serialize)?;
        fs::write(path, data).map_err(|source| IoError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// 画布始终以不透明白底渲染，RGBA 的 Alpha 通道恒为 255，可直接丢弃。
fn rgba_to_rgb(rgba: &[u8], width: u32, height: u32) -> Result<Vec<u8>, IoError> {
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        return Err(IoError::BufferSize {
            expected,
            actual: rgba.len(),
        });
    }
    let mut rgb = vec![0u8; width as usize * height as usize * 3];
    for (src, dst) in rgba.chunks_exact(4).zip(rgb.chunks_exact_mut(3)) {
        dst.copy_from_slice(&src[..3]);
    }
    Ok(rgb)
}

/// JPEG 编码，质量 0–100（超出部分截断到 100）。
pub fn encode_jpeg(rgba: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>, IoError> {
    let rgb = rgba_to_rgb(rgba, width, height)?;
    let mut out = Vec::new();
    let mut encoder =
        JpegEncoder::new_with_quality(&mut out, quality.min(DEFAULT_JPEG_QUALITY));
    encoder.encode(&rgb, width, height, ExtendedColorType::Rgb8)?;
    Ok(out)
}

/// BMP 无损编码。
pub fn encode_bmp(rgba: &[u8], width: u32, height: u32) -> Result<Vec<u8>, IoError> {
    let rgb = rgba_to_rgb(rgba, width, height)?;
    let mut out = Vec::new();
    BmpEncoder::new(&mut out).write_image(&rgb, width, height, ExtendedColorType::Rgb8)?;
    Ok(out)
}

pub fn write_jpeg(
    path: &Path,
    rgba: &[u8],
    width: u32,
    height: u32,
    quality: u8,
) -> Result<(), IoError> {
    let bytes = encode_jpeg(rgba, width, height, quality)?;
    fs::write(path, bytes).map_err(|source| IoError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_bmp(path: &Path, rgba: &[u8], width: u32, height: u32) -> Result<(), IoError> {
    let bytes = encode_bmp(rgba, width, height)?;
    fs::write(path, bytes).map_err(|source| IoError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use dxsnap_core::geometry::Point2;

    use super::*;

    fn white_rgba(width: u32, height: u32) -> Vec<u8> {
        vec![255u8; (width * height * 4) as usize]
    }

    #[test]
    fn document_round_trips_through_json_facade() {
        let mut doc = Document::new();
        doc.add_line(Point2::new(0.0, 0.0), Point2::new(10.0, 5.0), "0");
        doc.add_circle(Point2::new(3.0, 3.0), 1.5, "GEOM");

        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("document.json");

        let facade = JsonFacade::new();
        facade.save(&doc, &path).expect("save document");
        let restored = facade.load(&path).expect("load document");

        assert_eq!(restored.entity_count(), 2);
        let bounds = restored.bounds().expect("bounds");
        assert!((bounds.max().x() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn missing_file_reports_read_error_with_path() {
        let facade = JsonFacade::new();
        let err = facade
            .load(Path::new("/does/not/exist.json"))
            .expect_err("missing file");
        assert!(matches!(err, IoError::Read { .. }));
        assert!(err.to_string().contains("exist.json"));
    }

    #[test]
    fn invalid_json_reports_parse_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").expect("write fixture");

        let err = JsonFacade::new().load(&path).expect_err("broken json");
        assert!(matches!(err, IoError::Parse { .. }));
    }

    #[test]
    fn jpeg_encoding_emits_jfif_signature() {
        let bytes = encode_jpeg(&white_rgba(4, 4), 4, 4, 90).expect("encode jpeg");
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn bmp_encoding_emits_bm_signature() {
        let bytes = encode_bmp(&white_rgba(4, 4), 4, 4).expect("encode bmp");
        assert_eq!(&bytes[..2], b"BM");
    }

    #[test]
    fn buffer_size_mismatch_is_rejected() {
        let err = encode_jpeg(&[0u8; 10], 4, 4, 100).expect_err("short buffer");
        assert!(matches!(err, IoError::BufferSize { .. }));
    }

    #[test]
    fn quality_above_limit_is_clamped() {
        let bytes = encode_jpeg(&white_rgba(2, 2), 2, 2, u8::MAX).expect("encode jpeg");
        assert!(!bytes.is_empty());
    }
}
