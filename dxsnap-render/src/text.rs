use std::env;
use std::fs;
use std::path::Path;

use rusttype::{Font, Scale, point};
use tiny_skia::Pixmap;
use tracing::{debug, warn};

/// 常见系统字体位置，按顺序探测。环境变量 `DXSNAP_FONT` 可指定覆盖路径。
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// 解析默认字体。找不到任何字体时返回 None，文字实体退化为警告。
pub fn load_default_font() -> Option<Font<'static>> {
    if let Some(path) = env::var_os("DXSNAP_FONT") {
        let path = Path::new(&path);
        match load_font_file(path) {
            Some(font) => return Some(font),
            None => {
                warn!(path = %path.display(), "DXSNAP_FONT 指定的字体加载失败，回退到系统字体");
            }
        }
    }

    for candidate in FONT_CANDIDATES {
        let path = Path::new(candidate);
        if path.exists() {
            if let Some(font) = load_font_file(path) {
                debug!(path = candidate, "已加载默认字体");
                return Some(font);
            }
        }
    }
    None
}

fn load_font_file(path: &Path) -> Option<Font<'static>> {
    let data = fs::read(path).ok()?;
    Font::try_from_vec(data)
}

/// 以 `anchor` 为基线起点绘制一行文字，按字形覆盖率向黑色压暗像素。
///
/// 不做精确排版：字符间距完全交给 rusttype 的默认布局，超出画布的
/// 字形像素直接裁掉。
pub fn draw_text(
    pixmap: &mut Pixmap,
    font: &Font<'_>,
    anchor: (f32, f32),
    content: &str,
    px_height: f32,
) {
    if content.is_empty() || !px_height.is_finite() || px_height < 1.0 {
        return;
    }

    let width = pixmap.width() as i32;
    let height = pixmap.height() as i32;
    let scale = Scale::uniform(px_height);
    let glyphs: Vec<_> = font
        .layout(content, scale, point(anchor.0, anchor.1))
        .collect();

    let data = pixmap.data_mut();
    for glyph in glyphs {
        let Some(bounding_box) = glyph.pixel_bounding_box() else {
            continue;
        };
        glyph.draw(|gx, gy, coverage| {
            let px = bounding_box.min.x + gx as i32;
            let py = bounding_box.min.y + gy as i32;
            if px < 0 || py < 0 || px >= width || py >= height {
                return;
            }
            let index = ((py * width + px) * 4) as usize;
            // 白底黑字：画布始终不透明，直接在 RGB 通道上做覆盖率混合。
            let keep = 1.0 - coverage.clamp(0.0, 1.0);
            for channel in 0..3 {
                data[index + channel] = (data[index + channel] as f32 * keep) as u8;
            }
            data[index + 3] = 255;
        });
    }
}
