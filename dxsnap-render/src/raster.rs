use std::f64::consts::TAU;

use dxsnap_core::document::{Entity, Solid, Text};
use dxsnap_core::geometry::{Point2, Transform2D, Vector2};
use rusttype::Font;
use tiny_skia::{Color, FillRule, Paint, Path, PathBuilder, Pixmap, Stroke, Transform};
use tracing::warn;

use crate::errors::RenderError;
use crate::flatten::FlattenedEntity;
use crate::text;
use crate::viewport::ViewportFit;

/// XLINE / RAY 的截断长度（图纸单位）。对「无限」的有界近似。
pub const INFINITE_EXTENT: f64 = 1000.0;
/// POINT 实体的实心点半径（设备像素）。
const POINT_RADIUS_PX: f32 = 2.0;
/// 描边宽度（设备像素）。
const STROKE_WIDTH: f32 = 1.0;
/// 文字高度退化（≤0 或非有限）时的设备像素字号。
const DEFAULT_TEXT_PX: f32 = 20.0;

/// 把展开后的图元序列按文档顺序绘制到画布上。
///
/// 画布先刷白，随后每个图元以「视口变换 ∘ 实例变换」映射到设备坐标，
/// 黑色描边/填充。后绘制的图元覆盖先绘制的（画家算法）。
pub fn render_into(
    pixmap: &mut Pixmap,
    entities: &[FlattenedEntity<'_>],
    fit: &ViewportFit,
    font: Option<&Font<'static>>,
) -> Result<(), RenderError> {
    pixmap.fill(Color::from_rgba8(255, 255, 255, 255));
    let view = fit.transform();
    for flattened in entities {
        let device = view * flattened.transform;
        draw_entity(pixmap, flattened.entity, device, font);
    }
    Ok(())
}

fn draw_entity(
    pixmap: &mut Pixmap,
    entity: &Entity,
    device: Transform2D,
    font: Option<&Font<'static>>,
) {
    match entity {
        Entity::Line(line) => stroke_segment(pixmap, device, line.start, line.end),
        Entity::Circle(circle) => {
            let radius = circle.radius.abs();
            let points = sample_conic(device, circle.center, radius, radius, 0.0, 360.0);
            stroke_polyline(pixmap, &points, true);
        }
        Entity::Arc(arc) => {
            // 终止角小于起始角时补 360°，避免画出互补的错误圆弧。
            let mut end_angle = arc.end_angle;
            if end_angle < arc.start_angle {
                end_angle += 360.0;
            }
            let radius = arc.radius.abs();
            let points = sample_conic(device, arc.center, radius, radius, arc.start_angle, end_angle);
            stroke_polyline(pixmap, &points, false);
        }
        Entity::Ellipse(ellipse) => {
            // 轴对齐近似：主轴长度与短轴半径作为椭圆两轴。
            let (start_angle, end_angle) =
                normalize_ellipse_range(ellipse.start_angle, ellipse.end_angle);
            let closed = end_angle - start_angle >= 360.0 - 1e-9;
            let points = sample_conic(
                device,
                ellipse.center,
                ellipse.major_axis.length(),
                ellipse.minor_radius.abs(),
                start_angle,
                end_angle,
            );
            stroke_polyline(pixmap, &points, closed);
        }
        Entity::Text(entity) => draw_text_entity(pixmap, entity, device, font),
        Entity::XLine(xline) => {
            stroke_truncated_ray(pixmap, device, xline.origin, xline.direction);
        }
        Entity::Ray(ray) => {
            stroke_truncated_ray(pixmap, device, ray.origin, ray.direction);
        }
        Entity::Leader(leader) => stroke_vertex_chain(pixmap, device, &leader.vertices),
        Entity::MLine(mline) => stroke_vertex_chain(pixmap, device, &mline.vertices),
        Entity::Point(point) => {
            let center = device.transform_point(point.position);
            let mut builder = PathBuilder::new();
            builder.push_circle(center.x() as f32, center.y() as f32, POINT_RADIUS_PX);
            if let Some(path) = builder.finish() {
                fill(pixmap, &path);
            }
        }
        Entity::Solid(solid) => draw_solid(pixmap, solid, device),
        // 块参照在展开阶段已全部消除。
        Entity::BlockReference(_) => {}
    }
}

fn draw_text_entity(
    pixmap: &mut Pixmap,
    entity: &Text,
    device: Transform2D,
    font: Option<&Font<'static>>,
) {
    let Some(font) = font else {
        warn!(content = %entity.content, "没有可用字体，跳过文字实体");
        return;
    };
    let anchor = device.transform_point(entity.insert);
    let px_height = (entity.height * device.uniform_scale()) as f32;
    let px_height = if px_height.is_finite() && px_height >= 1.0 {
        px_height
    } else {
        DEFAULT_TEXT_PX
    };
    text::draw_text(
        pixmap,
        font,
        (anchor.x() as f32, anchor.y() as f32),
        &entity.content,
        px_height,
    );
}

fn draw_solid(pixmap: &mut Pixmap, solid: &Solid, device: Transform2D) {
    let corners: Vec<(f32, f32)> = solid
        .corners
        .iter()
        .map(|corner| to_device(device, corner.xy()))
        .collect();
    if let Some(path) = build_polyline(&corners, true) {
        fill(pixmap, &path);
        stroke(pixmap, &path);
    }
}

fn stroke_truncated_ray(
    pixmap: &mut Pixmap,
    device: Transform2D,
    origin: Point2,
    direction: Vector2,
) {
    let Some(unit) = direction.normalize() else {
        warn!("方向向量为零，跳过无限直线实体");
        return;
    };
    let end = origin.translate(Vector2::new(
        unit.x() * INFINITE_EXTENT,
        unit.y() * INFINITE_EXTENT,
    ));
    stroke_segment(pixmap, device, origin, end);
}

fn stroke_vertex_chain(pixmap: &mut Pixmap, device: Transform2D, vertices: &[Point2]) {
    if vertices.len() < 2 {
        return;
    }
    let points: Vec<(f32, f32)> = vertices
        .iter()
        .map(|vertex| to_device(device, *vertex))
        .collect();
    stroke_polyline(pixmap, &points, false);
}

fn stroke_segment(pixmap: &mut Pixmap, device: Transform2D, start: Point2, end: Point2) {
    let points = [to_device(device, start), to_device(device, end)];
    stroke_polyline(pixmap, &points, false);
}

/// 椭圆参数范围归一化：角度相等视为整椭圆，终止角偏小补 360°。
fn normalize_ellipse_range(start: f64, end: f64) -> (f64, f64) {
    if (end - start).abs() < 1e-9 {
        (start, start + 360.0)
    } else if end < start {
        (start, end + 360.0)
    } else {
        (start, end)
    }
}

/// 以参数方程采样圆/圆弧/椭圆，并把样本点映射到设备坐标。
/// 采样密度：每 τ/64 一段，至少 16 段。
fn sample_conic(
    device: Transform2D,
    center: Point2,
    radius_x: f64,
    radius_y: f64,
    start_degrees: f64,
    end_degrees: f64,
) -> Vec<(f32, f32)> {
    let start = start_degrees.to_radians();
    let sweep = (end_degrees - start_degrees).to_radians();
    let steps = ((sweep.abs() / (TAU / 64.0)).ceil() as usize).max(16);
    (0..=steps)
        .map(|i| {
            let t = start + sweep * (i as f64 / steps as f64);
            let local = Point2::new(
                center.x() + radius_x * t.cos(),
                center.y() + radius_y * t.sin(),
            );
            to_device(device, local)
        })
        .collect()
}

#[inline]
fn to_device(device: Transform2D, point: Point2) -> (f32, f32) {
    let mapped = device.transform_point(point);
    (mapped.x() as f32, mapped.y() as f32)
}

fn build_polyline(points: &[(f32, f32)], close: bool) -> Option<Path> {
    let (first, rest) = points.split_first()?;
    let mut builder = PathBuilder::new();
    builder.move_to(first.0, first.1);
    for point in rest {
        builder.line_to(point.0, point.1);
    }
    if close {
        builder.close();
    }
    builder.finish()
}

fn stroke_polyline(pixmap: &mut Pixmap, points: &[(f32, f32)], close: bool) {
    if let Some(path) = build_polyline(points, close) {
        stroke(pixmap, &path);
    }
}

fn stroke(pixmap: &mut Pixmap, path: &Path) {
    let stroke = Stroke {
        width: STROKE_WIDTH,
        ..Stroke::default()
    };
    pixmap.stroke_path(path, &black_paint(), &stroke, Transform::identity(), None);
}

fn fill(pixmap: &mut Pixmap, path: &Path) {
    pixmap.fill_path(
        path,
        &black_paint(),
        FillRule::Winding,
        Transform::identity(),
        None,
    );
}

fn black_paint() -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(0, 0, 0, 255);
    paint.anti_alias = true;
    paint
}

#[cfg(test)]
mod tests {
    use dxsnap_core::document::Document;
    use dxsnap_core::geometry::{Bounds2D, Point2, Point3};

    use super::*;
    use crate::flatten::flatten;
    use crate::viewport;

    fn luminance_at(pixmap: &Pixmap, x: u32, y: u32) -> u8 {
        let idx = ((y * pixmap.width() + x) * 4) as usize;
        pixmap.data()[idx]
    }

    /// 3×3 邻域内是否存在明显变暗的像素（抗锯齿描边不保证单像素命中）。
    fn has_dark_neighbor(pixmap: &Pixmap, x: u32, y: u32) -> bool {
        (-1..=1).any(|dy: i32| {
            (-1..=1).any(|dx: i32| {
                let px = x as i32 + dx;
                let py = y as i32 + dy;
                px >= 0
                    && py >= 0
                    && (px as u32) < pixmap.width()
                    && (py as u32) < pixmap.height()
                    && luminance_at(pixmap, px as u32, py as u32) < 128
            })
        })
    }

    /// 边距 10%、范围 (-10..110) 的 120×120 画布：scale = 1，偏移 0。
    fn unit_fit() -> ViewportFit {
        let bounds = Bounds2D::new(Point2::new(0.0, 0.0), Point2::new(100.0, 100.0));
        viewport::fit(&bounds, 120, 120)
    }

    #[test]
    fn empty_entity_list_leaves_canvas_white() {
        let mut pixmap = Pixmap::new(32, 32).expect("pixmap");
        let fitted = unit_fit();
        render_into(&mut pixmap, &[], &fitted, None).expect("render");
        assert!(pixmap.data().chunks_exact(4).all(|px| px[0] == 255));
    }

    #[test]
    fn line_is_stroked_under_viewport_transform() {
        let mut doc = Document::new();
        doc.add_line(Point2::new(0.0, 0.0), Point2::new(100.0, 100.0), "0");
        let flattened = flatten(&doc).expect("flatten");

        let mut pixmap = Pixmap::new(120, 120).expect("pixmap");
        render_into(&mut pixmap, &flattened, &unit_fit(), None).expect("render");

        // 对角线中点：图纸 (50,50) → 设备 (60,60)。
        assert!(has_dark_neighbor(&pixmap, 60, 60));
        // 远离线段处保持白色。
        assert!(!has_dark_neighbor(&pixmap, 20, 90));
    }

    #[test]
    fn solid_fills_its_interior() {
        let mut doc = Document::new();
        doc.add_solid(
            [
                Point3::new(20.0, 20.0, 0.0),
                Point3::new(80.0, 20.0, 0.0),
                Point3::new(80.0, 80.0, 0.0),
                Point3::new(20.0, 80.0, 0.0),
            ],
            "0",
        );
        doc.add_line(Point2::new(0.0, 0.0), Point2::new(100.0, 100.0), "0");
        let flattened = flatten(&doc).expect("flatten");

        let mut pixmap = Pixmap::new(120, 120).expect("pixmap");
        render_into(&mut pixmap, &flattened, &unit_fit(), None).expect("render");

        // 四边形内部（图纸 (50,50) → 设备 (60,60)）为实心黑。
        assert_eq!(luminance_at(&pixmap, 60, 60), 0);
        // 外部角落保持白色。
        assert_eq!(luminance_at(&pixmap, 5, 5), 255);
    }

    #[test]
    fn arc_wraps_across_zero_degrees() {
        let mut doc = Document::new();
        // 边框线确立范围 (-20..20)，圆弧 350°→10° 只应覆盖东侧。
        doc.add_line(Point2::new(-20.0, -20.0), Point2::new(-20.0, 20.0), "0");
        doc.add_line(Point2::new(20.0, -20.0), Point2::new(20.0, 20.0), "0");
        doc.add_arc(Point2::new(0.0, 0.0), 10.0, 350.0, 10.0, "0");
        let flattened = flatten(&doc).expect("flatten");

        let bounds = compute_bounds_for_test(&flattened);
        let fitted = viewport::fit(&bounds, 480, 480);
        let mut pixmap = Pixmap::new(480, 480).expect("pixmap");
        render_into(&mut pixmap, &flattened, &fitted, None).expect("render");

        let view = fitted.transform();
        let east = view.transform_point(Point2::new(10.0, 0.0));
        let west = view.transform_point(Point2::new(-10.0, 0.0));
        assert!(has_dark_neighbor(&pixmap, east.x() as u32, east.y() as u32));
        assert!(!has_dark_neighbor(&pixmap, west.x() as u32, west.y() as u32));
    }

    #[test]
    fn point_marker_renders_as_filled_dot() {
        let mut doc = Document::new();
        doc.add_line(Point2::new(0.0, 0.0), Point2::new(100.0, 0.0), "0");
        doc.add_point(Point2::new(50.0, 50.0), "0");
        let flattened = flatten(&doc).expect("flatten");

        let mut pixmap = Pixmap::new(120, 120).expect("pixmap");
        render_into(&mut pixmap, &flattened, &unit_fit(), None).expect("render");
        assert!(has_dark_neighbor(&pixmap, 60, 60));
    }

    #[test]
    fn zero_direction_infinite_line_is_skipped() {
        let mut doc = Document::new();
        doc.add_line(Point2::new(0.0, 0.0), Point2::new(100.0, 0.0), "0");
        doc.add_xline(Point2::new(50.0, 50.0), dxsnap_core::geometry::Vector2::new(0.0, 0.0), "0");
        let flattened = flatten(&doc).expect("flatten");

        let mut pixmap = Pixmap::new(120, 120).expect("pixmap");
        // 不 panic 即可；零方向实体直接跳过。
        render_into(&mut pixmap, &flattened, &unit_fit(), None).expect("render");
    }

    fn compute_bounds_for_test(entities: &[FlattenedEntity<'_>]) -> Bounds2D {
        crate::bounds::compute_bounds(entities).expect("bounds")
    }
}
