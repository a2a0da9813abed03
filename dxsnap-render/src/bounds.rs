use dxsnap_core::geometry::Bounds2D;

use crate::errors::RenderError;
use crate::flatten::FlattenedEntity;

/// 对展开后的图元序列做一次 O(n) 最小/最大折叠，得到整体范围。
///
/// 每个图元的局部控制点（见 `Entity::control_points`）先经其累积实例
/// 变换映射到图纸坐标再吸收。序列为空或没有任何可吸收的点时返回
/// [`RenderError::EmptyGeometry`]，转换在栅格化之前终止。
pub fn compute_bounds(entities: &[FlattenedEntity<'_>]) -> Result<Bounds2D, RenderError> {
    let mut bounds = Bounds2D::empty();
    for flattened in entities {
        for point in flattened.entity.control_points() {
            bounds.include_point(flattened.transform.transform_point(point));
        }
    }
    if bounds.is_empty() {
        Err(RenderError::EmptyGeometry)
    } else {
        Ok(bounds)
    }
}

#[cfg(test)]
mod tests {
    use dxsnap_core::document::Document;
    use dxsnap_core::geometry::{Point2, Vector2};

    use super::*;
    use crate::errors::RenderError;
    use crate::flatten::flatten;

    #[test]
    fn empty_document_reports_empty_geometry() {
        let doc = Document::new();
        let flattened = flatten(&doc).expect("flatten empty document");
        assert!(matches!(
            compute_bounds(&flattened),
            Err(RenderError::EmptyGeometry)
        ));
    }

    #[test]
    fn bounds_ordering_invariant_holds() {
        let mut doc = Document::new();
        doc.add_circle(Point2::new(-5.0, 3.0), 2.0, "0");
        doc.add_line(Point2::new(10.0, -4.0), Point2::new(12.0, 8.0), "0");

        let flattened = flatten(&doc).expect("flatten");
        let bounds = compute_bounds(&flattened).expect("bounds");
        assert!(bounds.min().x() <= bounds.max().x());
        assert!(bounds.min().y() <= bounds.max().y());
        assert!((bounds.min().x() + 7.0).abs() < 1e-9);
        assert!((bounds.max().x() - 12.0).abs() < 1e-9);
        assert!((bounds.min().y() + 4.0).abs() < 1e-9);
        assert!((bounds.max().y() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn transformed_insert_expands_bounds() {
        let mut doc = Document::new();
        doc.add_block_definition(dxsnap_core::document::BlockDefinition {
            name: "DISK".to_string(),
            base_point: Point2::new(0.0, 0.0),
            entities: vec![dxsnap_core::document::Entity::Circle(
                dxsnap_core::document::Circle {
                    center: Point2::new(0.0, 0.0),
                    radius: 1.0,
                    layer: "0".to_string(),
                },
            )],
        });
        doc.add_block_reference(
            "DISK",
            Point2::new(100.0, 50.0),
            Vector2::new(3.0, 3.0),
            0.0,
            "0",
        );

        let flattened = flatten(&doc).expect("flatten");
        let bounds = compute_bounds(&flattened).expect("bounds");
        // 单位圆经 3 倍缩放 + 平移：范围 (97, 47) — (103, 53)。
        assert!((bounds.min().x() - 97.0).abs() < 1e-9);
        assert!((bounds.min().y() - 47.0).abs() < 1e-9);
        assert!((bounds.max().x() - 103.0).abs() < 1e-9);
        assert!((bounds.max().y() - 53.0).abs() < 1e-9);
    }

    #[test]
    fn infinite_direction_does_not_leak_into_bounds() {
        let mut doc = Document::new();
        doc.add_xline(Point2::new(1.0, 2.0), Vector2::new(1.0, 0.0), "0");
        doc.add_ray(Point2::new(-3.0, 0.5), Vector2::new(0.0, 1.0), "0");

        let flattened = flatten(&doc).expect("flatten");
        let bounds = compute_bounds(&flattened).expect("bounds");
        assert!((bounds.max().x() - 1.0).abs() < 1e-9);
        assert!((bounds.min().x() + 3.0).abs() < 1e-9);
        assert!((bounds.max().y() - 2.0).abs() < 1e-9);
        assert!((bounds.min().y() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn ellipse_contributes_semi_axis_extents() {
        let mut doc = Document::new();
        doc.add_ellipse(
            Point2::new(0.0, 0.0),
            Vector2::new(5.0, 0.0),
            2.0,
            0.0,
            360.0,
            "0",
        );

        let flattened = flatten(&doc).expect("flatten");
        let bounds = compute_bounds(&flattened).expect("bounds");
        assert!((bounds.width() - 10.0).abs() < 1e-9);
        assert!((bounds.height() - 4.0).abs() < 1e-9);
    }
}
