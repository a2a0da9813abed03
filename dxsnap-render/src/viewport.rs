use dxsnap_core::geometry::{Bounds2D, Point2, Transform2D, Vector2};

/// 范围两侧各留的边距比例。
pub const MARGIN_RATIO: f64 = 0.1;
/// 零跨度轴的最小视作跨度（图纸单位），避免单点/水平线文档除零。
pub const MIN_AXIS_SPAN: f64 = 1.0;

/// 视口适配结果：统一缩放 + 居中偏移 + 含边距的范围。
#[derive(Debug, Clone, Copy)]
pub struct ViewportFit {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    expanded: Bounds2D,
}

impl ViewportFit {
    /// 含边距（及零跨度修正）后的范围。
    #[inline]
    pub fn expanded_bounds(&self) -> Bounds2D {
        self.expanded
    }

    /// 图纸坐标 → 设备坐标的复合变换：
    /// translate(offset) ∘ scale(s, −s) ∘ translate(−minX, −maxY)。
    /// Y 轴取负：图纸 Y 向上增长，栅格 Y 向下增长。
    pub fn transform(&self) -> Transform2D {
        Transform2D::from_translation(Vector2::new(self.offset_x, self.offset_y))
            * Transform2D::from_scale(self.scale, -self.scale)
            * Transform2D::from_translation(Vector2::new(
                -self.expanded.min().x(),
                -self.expanded.max().y(),
            ))
    }
}

/// 推导把 `bounds` 塞进 `width`×`height` 画布的统一缩放与居中偏移。
///
/// 两轴各加 10% 边距后取 `min(width/ew, height/eh)`，保持纵横比不变形；
/// 剩余空间对半分配实现居中。
pub fn fit(bounds: &Bounds2D, width: u32, height: u32) -> ViewportFit {
    let (min_x, max_x) = floor_axis(bounds.min().x(), bounds.max().x());
    let (min_y, max_y) = floor_axis(bounds.min().y(), bounds.max().y());

    let margin_x = (max_x - min_x) * MARGIN_RATIO;
    let margin_y = (max_y - min_y) * MARGIN_RATIO;
    let expanded = Bounds2D::new(
        Point2::new(min_x - margin_x, min_y - margin_y),
        Point2::new(max_x + margin_x, max_y + margin_y),
    );

    let scale = (width as f64 / expanded.width()).min(height as f64 / expanded.height());
    let offset_x = (width as f64 - scale * expanded.width()) / 2.0;
    let offset_y = (height as f64 - scale * expanded.height()) / 2.0;

    ViewportFit {
        scale,
        offset_x,
        offset_y,
        expanded,
    }
}

fn floor_axis(min: f64, max: f64) -> (f64, f64) {
    if max - min < 1e-9 {
        let center = (min + max) * 0.5;
        (center - MIN_AXIS_SPAN * 0.5, center + MIN_AXIS_SPAN * 0.5)
    } else {
        (min, max)
    }
}
