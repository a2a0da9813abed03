pub mod geometry {
    use glam::{DMat3, DVec2, DVec3};
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示，保证与 DXF 的双精度坐标一致。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量，用于方向、主轴与缩放因子。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_points(start: Point2, end: Point2) -> Self {
            Self(end.0 - start.0)
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        /// 归一化为单位向量。零向量返回 None。
        #[inline]
        pub fn normalize(self) -> Option<Self> {
            let len = self.0.length();
            if len <= f64::EPSILON {
                None
            } else {
                Some(Self(self.0 / len))
            }
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 三维点。SOLID 等实体在 DXF 中携带 Z 坐标，渲染时投影到 XY 平面。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point3(pub DVec3);

    impl Point3 {
        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        /// 丢弃 Z 分量，投影到 XY 平面。
        #[inline]
        pub fn xy(self) -> Point2 {
            Point2::new(self.0.x, self.0.y)
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }
    }

    impl From<DVec3> for Point3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 二维仿射变换，内部以齐次 `glam::DMat3` 表示。
    ///
    /// 组合遵循矩阵乘法语义：`a * b` 表示先应用 `b` 再应用 `a`，
    /// 与块参照嵌套时「内层先变换、外层后变换」的展开顺序一致。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Transform2D(pub DMat3);

    impl Transform2D {
        pub const IDENTITY: Self = Self(DMat3::IDENTITY);

        #[inline]
        pub fn identity() -> Self {
            Self::IDENTITY
        }

        #[inline]
        pub fn from_translation(offset: Vector2) -> Self {
            Self(DMat3::from_translation(offset.0))
        }

        /// 旋转变换，角度以度为单位（DXF 约定，逆时针为正）。
        #[inline]
        pub fn from_rotation_degrees(degrees: f64) -> Self {
            Self(DMat3::from_angle(degrees.to_radians()))
        }

        #[inline]
        pub fn from_scale(sx: f64, sy: f64) -> Self {
            Self(DMat3::from_scale(DVec2::new(sx, sy)))
        }

        #[inline]
        pub fn transform_point(self, point: Point2) -> Point2 {
            Point2(self.0.transform_point2(point.0))
        }

        #[inline]
        pub fn transform_vector(self, vector: Vector2) -> Vector2 {
            Vector2(self.0.transform_vector2(vector.0))
        }

        /// 线性部分的等效均匀缩放因子（√|det|）。
        /// 半径、文字高度等标量在非均匀缩放下按此值近似。
        pub fn uniform_scale(self) -> f64 {
            let det = self.0.x_axis.x * self.0.y_axis.y - self.0.y_axis.x * self.0.x_axis.y;
            det.abs().sqrt()
        }
    }

    impl Default for Transform2D {
        fn default() -> Self {
            Self::IDENTITY
        }
    }

    impl std::ops::Mul for Transform2D {
        type Output = Transform2D;

        #[inline]
        fn mul(self, rhs: Transform2D) -> Transform2D {
            Transform2D(self.0 * rhs.0)
        }
    }

    /// 轴对齐边界框，用于估算文档/实体范围。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn width(&self) -> f64 {
            self.max.x() - self.min.x()
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.max.y() - self.min.y()
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let min_vec = self.min.as_vec2();
            let max_vec = self.max.as_vec2();
            let center = (min_vec + max_vec) * 0.5;
            Point2::from_vec(center)
        }
    }

}

pub mod document {
    use std::collections::HashMap;

    use serde::{Deserialize, Serialize};

    use crate::geometry::{Bounds2D, Point2, Point3, Vector2};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Layer {
        pub name: String,
        pub is_visible: bool,
    }

    impl Layer {
        #[inline]
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                is_visible: true,
            }
        }
    }

    /// 可渲染实体的标签联合。渲染分派与控制点计算均对其穷尽匹配。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub enum Entity {
        Line(Line),
        Circle(Circle),
        Arc(Arc),
        Ellipse(Ellipse),
        Text(Text),
        XLine(XLine),
        Ray(Ray),
        Leader(Leader),
        MLine(MLine),
        Point(PointMarker),
        Solid(Solid),
        BlockReference(BlockReference),
    }

    impl Entity {
        #[inline]
        pub fn layer_name(&self) -> &str {
            match self {
                Entity::Line(line) => &line.layer,
                Entity::Circle(circle) => &circle.layer,
                Entity::Arc(arc) => &arc.layer,
                Entity::Ellipse(ellipse) => &ellipse.layer,
                Entity::Text(text) => &text.layer,
                Entity::XLine(xline) => &xline.layer,
                Entity::Ray(ray) => &ray.layer,
                Entity::Leader(leader) => &leader.layer,
                Entity::MLine(mline) => &mline.layer,
                Entity::Point(point) => &point.layer,
                Entity::Solid(solid) => &solid.layer,
                Entity::BlockReference(reference) => &reference.layer,
            }
        }

        /// 参与范围估算的控制点（实体局部坐标）。
        ///
        /// 圆 / 圆弧按圆心 ± 半径取包络角点；椭圆按主轴长度与短轴半径取包络；
        /// XLINE / RAY 只有锚点保证落在画布内，无限延伸方向不参与范围。
        pub fn control_points(&self) -> Vec<Point2> {
            match self {
                Entity::Line(line) => vec![line.start, line.end],
                Entity::Circle(circle) => {
                    radial_corners(circle.center, circle.radius.abs(), circle.radius.abs())
                }
                Entity::Arc(arc) => radial_corners(arc.center, arc.radius.abs(), arc.radius.abs()),
                Entity::Ellipse(ellipse) => radial_corners(
                    ellipse.center,
                    ellipse.major_axis.length(),
                    ellipse.minor_radius.abs(),
                ),
                Entity::Text(text) => vec![text.insert],
                Entity::XLine(xline) => vec![xline.origin],
                Entity::Ray(ray) => vec![ray.origin],
                Entity::Leader(leader) => leader.vertices.clone(),
                Entity::MLine(mline) => mline.vertices.clone(),
                Entity::Point(point) => vec![point.position],
                Entity::Solid(solid) => solid.corners.iter().map(|corner| corner.xy()).collect(),
                Entity::BlockReference(reference) => vec![reference.insert],
            }
        }

        /// 实体在局部坐标下的轴对齐范围。无控制点的实体返回 None。
        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            for point in self.control_points() {
                bounds.include_point(point);
            }
            if bounds.is_empty() { None } else { Some(bounds) }
        }
    }

    fn radial_corners(center: Point2, extent_x: f64, extent_y: f64) -> Vec<Point2> {
        vec![
            Point2::new(center.x() - extent_x, center.y() - extent_y),
            Point2::new(center.x() + extent_x, center.y() - extent_y),
            Point2::new(center.x() - extent_x, center.y() + extent_y),
            Point2::new(center.x() + extent_x, center.y() + extent_y),
        ]
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point2,
        pub radius: f64,
        pub layer: String,
    }

    /// 圆弧实体，角度以度为单位（DXF 组码约定，逆时针为正）。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Arc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
        pub layer: String,
    }

    /// 椭圆实体。主轴以向量记录，短轴以半径长度记录（几何意义上的半短轴）。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Ellipse {
        pub center: Point2,
        pub major_axis: Vector2,
        pub minor_radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Text {
        pub insert: Point2,
        pub content: String,
        pub height: f64,
        pub rotation: f64,
        /// 字体族名称。None 时由渲染端选择默认字体。
        pub font: Option<String>,
        pub layer: String,
    }

    /// 构造线（双向无限直线）。渲染时按固定长度截断。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct XLine {
        pub origin: Point2,
        pub direction: Vector2,
        pub layer: String,
    }

    /// 射线（单向无限直线），截断策略与 XLINE 相同。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Ray {
        pub origin: Point2,
        pub direction: Vector2,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Leader {
        pub vertices: Vec<Point2>,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MLine {
        pub vertices: Vec<Point2>,
        pub layer: String,
    }

    /// POINT 实体，渲染为固定半径的实心点。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PointMarker {
        pub position: Point2,
        pub layer: String,
    }

    /// SOLID 实体：四个角点围成的实心四边形。角点携带 Z 坐标，渲染投影到 XY。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Solid {
        pub corners: [Point3; 4],
        pub layer: String,
    }

    /// 块参照（INSERT）。行列阵列参数仅随数据保留，展开时按单实例处理。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct BlockReference {
        pub name: String,
        pub insert: Point2,
        pub scale: Vector2,
        /// 旋转角，单位为度。
        pub rotation: f64,
        #[serde(default = "default_array_count")]
        pub column_count: i32,
        #[serde(default = "default_array_count")]
        pub row_count: i32,
        #[serde(default)]
        pub column_spacing: f64,
        #[serde(default)]
        pub row_spacing: f64,
        pub layer: String,
    }

    fn default_array_count() -> i32 {
        1
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct BlockDefinition {
        pub name: String,
        pub base_point: Point2,
        pub entities: Vec<Entity>,
    }

    /// 文档：有序的顶层实体列表 + 按名称索引的块定义。
    /// 顶层顺序即绘制顺序（画家算法），展开与渲染都必须保持。
    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct Document {
        layers: HashMap<String, Layer>,
        entities: Vec<(EntityId, Entity)>,
        next_entity_id: u64,
        blocks: HashMap<String, BlockDefinition>,
    }

    impl Document {
        pub fn new() -> Self {
            let mut doc = Self::default();
            doc.ensure_layer("0");
            doc
        }

        pub fn ensure_layer(&mut self, name: impl AsRef<str>) {
            let key = name.as_ref();
            self.layers
                .entry(key.to_string())
                .or_insert_with(|| Layer::new(key));
        }

        pub fn add_line(
            &mut self,
            start: Point2,
            end: Point2,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let id = self.next_id();
            self.entities
                .push((id, Entity::Line(Line { start, end, layer })));
            id
        }

        pub fn add_circle(
            &mut self,
            center: Point2,
            radius: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let id = self.next_id();
            self.entities.push((
                id,
                Entity::Circle(Circle {
                    center,
                    radius,
                    layer,
                }),
            ));
            id
        }

        pub fn add_arc(
            &mut self,
            center: Point2,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let id = self.next_id();
            self.entities.push((
                id,
                Entity::Arc(Arc {
                    center,
                    radius,
                    start_angle,
                    end_angle,
                    layer,
                }),
            ));
            id
        }

        pub fn add_ellipse(
            &mut self,
            center: Point2,
            major_axis: Vector2,
            minor_radius: f64,
            start_angle: f64,
            end_angle: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let id = self.next_id();
            self.entities.push((
                id,
                Entity::Ellipse(Ellipse {
                    center,
                    major_axis,
                    minor_radius,
                    start_angle,
                    end_angle,
                    layer,
                }),
            ));
            id
        }

        pub fn add_text(
            &mut self,
            insert: Point2,
            content: impl Into<String>,
            height: f64,
            rotation: f64,
            font: Option<String>,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let id = self.next_id();
            self.entities.push((
                id,
                Entity::Text(Text {
                    insert,
                    content: content.into(),
                    height,
                    rotation,
                    font,
                    layer,
                }),
            ));
            id
        }

        pub fn add_xline(
            &mut self,
            origin: Point2,
            direction: Vector2,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let id = self.next_id();
            self.entities.push((
                id,
                Entity::XLine(XLine {
                    origin,
                    direction,
                    layer,
                }),
            ));
            id
        }

        pub fn add_ray(
            &mut self,
            origin: Point2,
            direction: Vector2,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let id = self.next_id();
            self.entities.push((
                id,
                Entity::Ray(Ray {
                    origin,
                    direction,
                    layer,
                }),
            ));
            id
        }

        pub fn add_leader(&mut self, vertices: Vec<Point2>, layer: impl Into<String>) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let id = self.next_id();
            self.entities
                .push((id, Entity::Leader(Leader { vertices, layer })));
            id
        }

        pub fn add_mline(&mut self, vertices: Vec<Point2>, layer: impl Into<String>) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let id = self.next_id();
            self.entities
                .push((id, Entity::MLine(MLine { vertices, layer })));
            id
        }

        pub fn add_point(&mut self, position: Point2, layer: impl Into<String>) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let id = self.next_id();
            self.entities
                .push((id, Entity::Point(PointMarker { position, layer })));
            id
        }

        pub fn add_solid(&mut self, corners: [Point3; 4], layer: impl Into<String>) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let id = self.next_id();
            self.entities
                .push((id, Entity::Solid(Solid { corners, layer })));
            id
        }

        pub fn add_block_reference(
            &mut self,
            name: impl Into<String>,
            insert: Point2,
            scale: Vector2,
            rotation: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_block_reference_with_array(
                name, insert, scale, rotation, 1, 1, 0.0, 0.0, layer,
            )
        }

        #[allow(clippy::too_many_arguments)]
        pub fn add_block_reference_with_array(
            &mut self,
            name: impl Into<String>,
            insert: Point2,
            scale: Vector2,
            rotation: f64,
            column_count: i32,
            row_count: i32,
            column_spacing: f64,
            row_spacing: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let id = self.next_id();
            self.entities.push((
                id,
                Entity::BlockReference(BlockReference {
                    name: name.into(),
                    insert,
                    scale,
                    rotation,
                    column_count,
                    row_count,
                    column_spacing,
                    row_spacing,
                    layer,
                }),
            ));
            id
        }

        pub fn add_entity(&mut self, entity: Entity) -> EntityId {
            self.ensure_layer(entity.layer_name().to_string());
            let id = self.next_id();
            self.entities.push((id, entity));
            id
        }

        pub fn add_block_definition(&mut self, definition: BlockDefinition) {
            for entity in &definition.entities {
                self.ensure_layer(entity.layer_name());
            }
            self.blocks.insert(definition.name.clone(), definition);
        }

        #[inline]
        pub fn layers(&self) -> impl Iterator<Item = &Layer> {
            self.layers.values()
        }

        #[inline]
        pub fn entities(&self) -> impl Iterator<Item = &(EntityId, Entity)> {
            self.entities.iter()
        }

        #[inline]
        pub fn entity_count(&self) -> usize {
            self.entities.len()
        }

        #[inline]
        pub fn block(&self, name: &str) -> Option<&BlockDefinition> {
            self.blocks.get(name)
        }

        #[inline]
        pub fn blocks(&self) -> impl Iterator<Item = &BlockDefinition> {
            self.blocks.values()
        }

        #[inline]
        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.entities.iter().find_map(|(entity_id, entity)| {
                if entity_id.get() == id.get() {
                    Some(entity)
                } else {
                    None
                }
            })
        }

        #[inline]
        pub fn entity_bounds(&self, id: EntityId) -> Option<Bounds2D> {
            self.entity(id).and_then(Entity::bounds)
        }

        /// 顶层实体（未展开块参照）的局部范围，块参照退化为插入点。
        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            let mut has = false;
            for (_, entity) in &self.entities {
                if let Some(entity_bounds) = entity.bounds() {
                    bounds.include_bounds(&entity_bounds);
                    has = true;
                }
            }
            if has { Some(bounds) } else { None }
        }

        #[inline]
        fn next_id(&mut self) -> EntityId {
            let id = self.next_entity_id;
            self.next_entity_id += 1;
            EntityId(id)
        }
    }

}
