use dxsnap_core::document::{BlockReference, Document, Entity};
use dxsnap_core::geometry::{Transform2D, Vector2};
use tracing::warn;

use crate::errors::RenderError;

/// 块参照的最大嵌套深度。超过视为参照链异常。
pub const MAX_INSERT_DEPTH: usize = 64;

/// 展开结果：图元 + 自外向内累乘的实例变换。
/// 序列顺序即文档顺序（画家算法的绘制顺序）。
#[derive(Debug, Clone, Copy)]
pub struct FlattenedEntity<'a> {
    pub entity: &'a Entity,
    pub transform: Transform2D,
}

/// 将文档顶层实体按文档顺序展开为扁平图元序列。
///
/// 块参照递归展开；指向缺失块的参照仅记录警告并跳过（部分有效的
/// 文档很常见，不视为致命错误）。当前展开路径上重复出现同名块，
/// 或嵌套深度超过 [`MAX_INSERT_DEPTH`] 时，整次转换以
/// [`RenderError::CyclicReference`] 终止。
pub fn flatten(document: &Document) -> Result<Vec<FlattenedEntity<'_>>, RenderError> {
    let mut flattened = Vec::new();
    let mut active_blocks = Vec::new();
    for (_, entity) in document.entities() {
        push_entity(
            document,
            entity,
            Transform2D::IDENTITY,
            0,
            &mut active_blocks,
            &mut flattened,
        )?;
    }
    Ok(flattened)
}

/// 单个块参照的实例变换：平移 ∘ 旋转 ∘ 非均匀缩放。
/// 行列阵列参数不参与——展开仅覆盖单实例语义。
pub fn insert_transform(reference: &BlockReference) -> Transform2D {
    Transform2D::from_translation(Vector2::new(reference.insert.x(), reference.insert.y()))
        * Transform2D::from_rotation_degrees(reference.rotation)
        * Transform2D::from_scale(reference.scale.x(), reference.scale.y())
}

fn push_entity<'a>(
    document: &'a Document,
    entity: &'a Entity,
    transform: Transform2D,
    depth: usize,
    active_blocks: &mut Vec<String>,
    flattened: &mut Vec<FlattenedEntity<'a>>,
) -> Result<(), RenderError> {
    let Entity::BlockReference(reference) = entity else {
        flattened.push(FlattenedEntity { entity, transform });
        return Ok(());
    };

    // 循环检测针对当前展开路径：同一个块在兄弟参照中出现多次是合法的。
    if depth >= MAX_INSERT_DEPTH || active_blocks.iter().any(|name| name == &reference.name) {
        return Err(RenderError::CyclicReference {
            block: reference.name.clone(),
        });
    }

    let Some(block) = document.block(&reference.name) else {
        warn!(block = %reference.name, "块参照指向不存在的块定义，跳过");
        return Ok(());
    };

    let composed = transform * insert_transform(reference);
    active_blocks.push(reference.name.clone());
    for child in &block.entities {
        push_entity(document, child, composed, depth + 1, active_blocks, flattened)?;
    }
    active_blocks.pop();
    Ok(())
}
