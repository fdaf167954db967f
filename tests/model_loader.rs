//! 模型目录加载测试

use rat_mongo_connector::{
    BehaviorRegistry, CollisionPolicy, ConnectorError, ConnectorOptions, DataValue, Document,
    FieldSpec, ModelDefinition, SchemaDescription, connect, document, load_models,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(dir: &Path, relative: &str, content: &str) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn model_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "posts.toml",
        r#"
name = "posts"
alias = "Post"

[schema.title]
type = "String"
required = true

[schema.slug]
type = "String"

[pre]
save = "slugify"
validate = "notRegistered"
"#,
    );
    write(
        dir.path(),
        "nested/accounts.json",
        r#"{
            "name": "accounts",
            "alias": "Account",
            "schema": {
                "email": { "type": "String", "required": true, "unique": true }
            },
            "post": { "save": "alsoNotRegistered" }
        }"#,
    );
    write(dir.path(), "README.txt", "not a model");
    dir
}

fn behaviors() -> BehaviorRegistry {
    BehaviorRegistry::new().pre("slugify", |doc: &mut Document| {
        let slug = doc
            .get("title")
            .map(|t| t.to_string().to_lowercase().replace(' ', "-"))
            .unwrap_or_default();
        doc.insert("slug".to_string(), DataValue::from(slug));
        Ok(())
    })
}

#[test]
fn test_load_models_walks_directory_in_order() {
    let dir = model_dir();
    let definitions = load_models(dir.path(), &behaviors()).unwrap();
    let names: Vec<_> = definitions.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["accounts", "posts"]);
    assert_eq!(definitions[1].alias.as_deref(), Some("Post"));
}

#[test]
fn test_missing_directory_and_bad_manifest() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent");
    assert!(matches!(
        load_models(&missing, &BehaviorRegistry::new()),
        Err(ConnectorError::IoError(_))
    ));

    write(dir.path(), "broken.toml", "name = ");
    let err = load_models(dir.path(), &BehaviorRegistry::new()).unwrap_err();
    assert!(matches!(err, ConnectorError::ConfigError { .. }));
    assert!(err.to_string().contains("broken.toml"));
}

#[tokio::test]
async fn test_directory_models_register_with_unresolved_hooks_skipped() {
    let dir = model_dir();
    let options = ConnectorOptions::builder()
        .uri("memory://test")
        .use_name_and_alias(true)
        .model_dir_path(dir.path())
        .behaviors(behaviors())
        .build()
        .unwrap();
    let decorations = connect(options).await.unwrap();

    let posts = decorations.model("Post").unwrap();
    assert_eq!(posts.collection_name(), "posts");
    let post = posts.create(document! { "title" => "Hello World" }).await.unwrap();
    assert_eq!(post.get("slug"), Some(DataValue::from("hello-world")));

    let accounts = decorations.model("Account").unwrap();
    accounts
        .create(document! { "email" => "test@example.com" })
        .await
        .unwrap();
    let duplicate = accounts
        .create(document! { "email" => "test@example.com" })
        .await
        .unwrap_err();
    assert!(matches!(duplicate, ConnectorError::QueryError { .. }));

    decorations.close().await.unwrap();
}

#[tokio::test]
async fn test_explicit_model_overrides_directory_model() {
    let dir = model_dir();
    let explicit = ModelDefinition::new(
        "posts",
        SchemaDescription::new()
            .field("title", FieldSpec::string())
            .field("subtitle", FieldSpec::string()),
    )
    .alias("Post");

    let options = ConnectorOptions::builder()
        .uri("memory://test")
        .use_name_and_alias(true)
        .model_dir_path(dir.path())
        .behaviors(behaviors())
        .model(explicit.clone())
        .build()
        .unwrap();
    let decorations = connect(options).await.unwrap();
    let posts = decorations.model("Post").unwrap();
    assert!(posts.schema().path("subtitle").is_some());
    assert!(posts.schema().path("slug").is_none());
    decorations.close().await.unwrap();

    let options = ConnectorOptions::builder()
        .uri("memory://test")
        .use_name_and_alias(true)
        .model_dir_path(dir.path())
        .behaviors(behaviors())
        .collision_policy(CollisionPolicy::Reject)
        .model(explicit)
        .build()
        .unwrap();
    let err = connect(options).await.unwrap_err();
    assert!(matches!(err, ConnectorError::ConfigError { .. }));
    assert!(err.to_string().contains("posts"));
}
