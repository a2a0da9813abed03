pub mod bounds;
pub mod flatten;
pub mod raster;
pub mod text;
pub mod viewport;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum RenderError {
        #[error("文档展开后不含任何可绘制几何")]
        EmptyGeometry,
        #[error("块 {block:?} 的参照链存在循环或超出嵌套深度限制")]
        CyclicReference { block: String },
        #[error("非法画布尺寸 {width}x{height}")]
        InvalidCanvas { width: u32, height: u32 },
    }
}

use dxsnap_core::document::Document;
use tiny_skia::Pixmap;
use tracing::{debug, info};

use crate::errors::RenderError;

/// 默认画布尺寸（1080p 输出）。
pub const CANVAS_WIDTH: u32 = 1920;
pub const CANVAS_HEIGHT: u32 = 1080;

/// 渲染参数。画布尺寸可经配置覆盖，默认 1920×1080。
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: CANVAS_WIDTH,
            height: CANVAS_HEIGHT,
        }
    }
}

/// 整条转换管线：展开 → 范围 → 视口适配 → 栅格化。
///
/// 输入文档只读；输出像素图由调用方交给编码器持久化。
/// 相同输入两次调用产出逐字节相同的像素图。
pub fn render_document(
    document: &Document,
    options: &RenderOptions,
) -> Result<Pixmap, RenderError> {
    if options.width == 0 || options.height == 0 {
        return Err(RenderError::InvalidCanvas {
            width: options.width,
            height: options.height,
        });
    }

    let entities = flatten::flatten(document)?;
    info!(entity_count = entities.len(), "实体展开完成");

    let bounds = bounds::compute_bounds(&entities)?;
    let fit = viewport::fit(&bounds, options.width, options.height);
    debug!(
        scale = fit.scale,
        offset_x = fit.offset_x,
        offset_y = fit.offset_y,
        "视口适配完成"
    );

    let mut pixmap =
        Pixmap::new(options.width, options.height).ok_or(RenderError::InvalidCanvas {
            width: options.width,
            height: options.height,
        })?;
    let font = text::load_default_font();
    raster::render_into(&mut pixmap, &entities, &fit, font.as_ref())?;
    Ok(pixmap)
}

pub use bounds::compute_bounds;
pub use flatten::{FlattenedEntity, flatten};
pub use viewport::{ViewportFit, fit};
