//! 引用规范化
//!
//! 将描述中的符号 `ObjectId` 标记改写为原生引用类型，
//! 并把 `validateExistance` 标志替换为存在性验证器

use super::description::{FieldEntry, FieldSpec, SchemaDescription, TypeMarker};
use super::validators::{ExistenceValidator, FieldValidator};
use crate::connector::Decorations;
use rat_logger::debug;

/// 就地规范化模式描述，返回改写的字段规格数量
///
/// 被引用的模型此时不必已注册，解析推迟到验证器运行时
pub fn normalize_references(decorations: &Decorations, schema: &mut SchemaDescription) -> usize {
    let mut rewritten = 0;
    for (name, entry) in schema.iter_mut() {
        match entry {
            FieldEntry::Single(spec) => {
                if normalize_spec(decorations, name, spec) {
                    rewritten += 1;
                }
            }
            FieldEntry::Array(specs) => {
                for spec in specs.iter_mut() {
                    if normalize_spec(decorations, name, spec) {
                        rewritten += 1;
                    }
                }
            }
        }
    }
    rewritten
}

fn normalize_spec(decorations: &Decorations, name: &str, spec: &mut FieldSpec) -> bool {
    if spec.field_type != TypeMarker::ObjectId {
        return false;
    }
    spec.field_type = TypeMarker::Reference;

    if spec.validate_existence {
        spec.validate_existence = false;
        // 没有 ref 时保留标志为 false，由原生模式构建阶段报告
        match &spec.reference {
            Some(target) => {
                debug!("字段 {} 添加存在性验证器 -> {}", name, target);
                spec.validators.push(FieldValidator::Existence(ExistenceValidator::new(
                    target,
                    decorations.clone(),
                )));
            }
            None => {
                spec.validate_existence = true;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Connection, MemoryStore};
    use std::sync::Arc;

    fn decorations() -> Decorations {
        Decorations::new(Connection::from_store("memory://test", Arc::new(MemoryStore::new("test"))))
    }

    fn sample() -> SchemaDescription {
        SchemaDescription::new()
            .field("title", FieldSpec::string().required())
            .field("author", FieldSpec::object_id("Account").validate_existence())
            .field("editor", FieldSpec::object_id("Account"))
            .array("posts", FieldSpec::object_id("Post").validate_existence())
    }

    #[test]
    fn test_rewrites_object_id_markers() {
        let mut desc = sample();
        let rewritten = normalize_references(&decorations(), &mut desc);
        assert_eq!(rewritten, 3);

        let FieldEntry::Single(author) = desc.get("author").unwrap() else {
            panic!("author should be single");
        };
        assert_eq!(author.field_type, TypeMarker::Reference);
        assert!(!author.validate_existence);
        assert!(author.has_existence_validator());

        let FieldEntry::Single(editor) = desc.get("editor").unwrap() else {
            panic!("editor should be single");
        };
        assert_eq!(editor.field_type, TypeMarker::Reference);
        assert!(!editor.has_existence_validator());
    }

    #[test]
    fn test_array_elements_normalized_independently() {
        let mut desc = SchemaDescription::new();
        desc.insert(
            "links",
            vec![
                FieldSpec::object_id("Post").validate_existence(),
                FieldSpec::string(),
            ],
        );
        normalize_references(&decorations(), &mut desc);

        let FieldEntry::Array(items) = desc.get("links").unwrap() else {
            panic!("links should be an array");
        };
        assert_eq!(items[0].field_type, TypeMarker::Reference);
        assert!(items[0].has_existence_validator());
        assert_eq!(items[1].field_type, TypeMarker::String);
        assert!(items[1].validators.is_empty());
    }

    #[test]
    fn test_non_reference_fields_untouched() {
        let mut desc = sample();
        normalize_references(&decorations(), &mut desc);
        let FieldEntry::Single(title) = desc.get("title").unwrap() else {
            panic!("title should be single");
        };
        assert_eq!(title.field_type, TypeMarker::String);
        assert!(title.required);
        assert!(title.validators.is_empty());
    }

    #[test]
    fn test_missing_ref_keeps_flag_for_schema_stage() {
        let mut desc = SchemaDescription::new()
            .field("owner", FieldSpec::new(TypeMarker::ObjectId).validate_existence());
        normalize_references(&decorations(), &mut desc);
        let FieldEntry::Single(owner) = desc.get("owner").unwrap() else {
            panic!("owner should be single");
        };
        assert_eq!(owner.field_type, TypeMarker::Reference);
        assert!(owner.validate_existence);
    }
}
