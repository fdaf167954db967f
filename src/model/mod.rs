//! 模型模块
//!
//! 模型定义、模型类、已编译模型与文档记录

pub mod class;
pub mod compiled;
pub mod definition;
pub mod record;

pub use class::{ModelClass, SimpleClass};
pub use compiled::CompiledModel;
pub use definition::ModelDefinition;
pub use record::{Record, ToObjectOptions};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document;
    use crate::schema::{FieldSpec, HookEvent, Schema, SchemaDescription, SchemaOptions};
    use crate::store::{Connection, MemoryStore};
    use crate::types::{DataValue, Document};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn account_model(options: SchemaOptions) -> Arc<CompiledModel> {
        let desc = SchemaDescription::new()
            .field("username", FieldSpec::string())
            .field("password", FieldSpec::string().select(false).required())
            .field("email", FieldSpec::string().unique().required())
            .field("visits", FieldSpec::number().default_value(serde_json::json!(0)));
        let mut schema = Schema::from_description(&desc, options).unwrap();
        schema.load_class(
            &SimpleClass::new("AccountClass")
                .getter("handle", |doc: &Document| {
                    DataValue::from(format!("@{}", doc.get("username").map(|v| v.to_string()).unwrap_or_default()))
                })
                .method("greet", |doc: &Document, args: &[DataValue]| {
                    let who = args.first().map(|v| v.to_string()).unwrap_or_default();
                    Ok(DataValue::from(format!("{} greets {}", doc["username"], who)))
                }),
        );
        let connection = Connection::from_store("memory://test", Arc::new(MemoryStore::new("test")));
        Arc::new(CompiledModel::new("Account", "accounts", schema, connection))
    }

    #[tokio::test]
    async fn test_create_and_find_applies_projection() {
        let model = account_model(SchemaOptions::default());
        let created = model
            .create(document! { "username" => "test", "password" => "pass", "email" => "test@example.com" })
            .await
            .unwrap();
        assert!(!created.is_new());
        assert_eq!(created.get("visits"), Some(DataValue::Int(0)));

        let found = model.find_by_id(&created.id()).await.unwrap().unwrap();
        assert_eq!(found.get("username"), Some(DataValue::from("test")));
        assert!(found.get("password").is_none());

        let hidden = model.find_by_id_with_hidden(&created.id()).await.unwrap().unwrap();
        assert_eq!(hidden.get("password"), Some(DataValue::from("pass")));

        let by_email = model.find_one(document! { "email" => "test@example.com" }).await.unwrap();
        assert_eq!(by_email.unwrap().id(), created.id());
    }

    #[tokio::test]
    async fn test_resave_projected_record_keeps_hidden_field() {
        let model = account_model(SchemaOptions::default());
        let created = model
            .create(document! { "username" => "test", "password" => "pass", "email" => "a@bb.cc" })
            .await
            .unwrap();

        let mut found = model.find_by_id(&created.id()).await.unwrap().unwrap();
        found.set("username", "renamed").unwrap();
        found.save().await.unwrap();
        assert!(found.get("password").is_none());

        let hidden = model.find_by_id_with_hidden(&created.id()).await.unwrap().unwrap();
        assert_eq!(hidden.get("password"), Some(DataValue::from("pass")));
        assert_eq!(hidden.get("username"), Some(DataValue::from("renamed")));
    }

    #[tokio::test]
    async fn test_validation_failure_does_not_persist() {
        let model = account_model(SchemaOptions::default());
        let err = model
            .create(document! { "username" => "test", "email" => "a@bb.cc" })
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("password"));
        assert_eq!(model.count(Document::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_virtuals_and_methods() {
        let model = account_model(SchemaOptions::default());
        let record = model
            .new_document(document! { "username" => "test", "password" => "pass", "email" => "a@bb.cc" })
            .unwrap();

        let plain = record.to_object(ToObjectOptions::default());
        assert!(plain.get("handle").is_none());
        assert!(plain.get("id").is_none());

        let with_virtuals = record.to_object(ToObjectOptions::with_virtuals());
        assert_eq!(with_virtuals["handle"], "@test");
        assert_eq!(with_virtuals["id"], record.id().to_hex());
        assert_eq!(
            record.call("greet", &[DataValue::from("you")]).unwrap(),
            DataValue::from("test greets you")
        );
        assert!(record.call("missing", &[]).is_err());
    }

    #[tokio::test]
    async fn test_timestamps_and_delete() {
        let model = account_model(SchemaOptions {
            timestamps: true,
            ..Default::default()
        });

        let record = model
            .create(document! { "password" => "pass", "email" => "a@bb.cc" })
            .await
            .unwrap();
        assert!(matches!(record.get("createdAt"), Some(DataValue::DateTime(_))));
        assert!(matches!(record.get("updatedAt"), Some(DataValue::DateTime(_))));

        assert!(record.delete().await.unwrap());
        assert!(!model.exists(&record.id()).await.unwrap());
        assert!(!model.delete_by_id(&record.id()).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_hooks_run_around_delete() {
        let desc = SchemaDescription::new().field("title", FieldSpec::string());
        let mut schema = Schema::from_description(&desc, SchemaOptions::default()).unwrap();
        let removed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&removed);
        schema.post(
            HookEvent::Remove,
            Arc::new(move |_doc: &Document| -> crate::error::ConnectorResult<()> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
        let connection = Connection::from_store("memory://test", Arc::new(MemoryStore::new("test")));
        let model = Arc::new(CompiledModel::new("Post", "posts", schema, connection));

        let post = model.create(document! { "title" => "hello" }).await.unwrap();
        assert!(model.delete_by_id(&post.id()).await.unwrap());
        assert_eq!(removed.load(Ordering::SeqCst), 1);
    }
}
