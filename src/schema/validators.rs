//! 字段验证器
//!
//! 自定义验证器与引用存在性验证器

use crate::connector::Decorations;
use crate::error::{ConnectorError, ConnectorResult};
use crate::types::DataValue;
use async_trait::async_trait;
use rat_logger::debug;
use std::sync::Arc;

/// 值验证器
///
/// 返回 `Ok(false)` 表示值不合法；返回错误时错误原样向上传递
#[async_trait]
pub trait ValueValidator: Send + Sync {
    async fn validate(&self, value: &DataValue) -> ConnectorResult<bool>;
}

#[async_trait]
impl<F> ValueValidator for F
where
    F: Fn(&DataValue) -> bool + Send + Sync,
{
    async fn validate(&self, value: &DataValue) -> ConnectorResult<bool> {
        Ok((self)(value))
    }
}

/// 自定义验证器及其错误消息模板
#[derive(Clone)]
pub struct CustomValidator {
    pub check: Arc<dyn ValueValidator>,
    pub message: Option<String>,
}

impl CustomValidator {
    fn render_message(&self, path: &str, value: &DataValue) -> String {
        match &self.message {
            Some(template) => template
                .replace("{PATH}", path)
                .replace("{VALUE}", &value.to_string()),
            None => format!("Validator failed for path `{}` with value `{}`", path, value),
        }
    }
}

/// 引用存在性验证器
///
/// 验证时才解析被引用的模型，允许引用稍后注册的模型。
/// 持有装饰对象，调用方只保留模型句柄时引用仍可解析
#[derive(Clone)]
pub struct ExistenceValidator {
    pub target: String,
    pub(crate) decorations: Decorations,
}

impl ExistenceValidator {
    pub(crate) fn new(target: &str, decorations: Decorations) -> Self {
        Self {
            target: target.to_string(),
            decorations,
        }
    }

    fn not_found(&self, path: &str, id: &str) -> ConnectorError {
        ConnectorError::ValidationError {
            field: path.to_string(),
            message: crate::i18n::message(
                "error.reference_not_found",
                &[("model", &self.target), ("id", id)],
            ),
        }
    }

    async fn check(&self, path: &str, value: &DataValue) -> ConnectorResult<()> {
        let Some(id) = value.as_object_id() else {
            return Err(self.not_found(path, &value.to_string()));
        };

        let model = match self.decorations.model(&self.target) {
            Ok(model) => model,
            Err(e) => {
                debug!("引用模型 {} 不可用: {}", self.target, e);
                return Err(self.not_found(path, &id.to_hex()));
            }
        };

        match model.exists(&id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(self.not_found(path, &id.to_hex())),
            Err(e) => {
                debug!("查询引用 {} {} 失败: {}", self.target, id, e);
                Err(self.not_found(path, &id.to_hex()))
            }
        }
    }
}

/// 字段验证器
#[derive(Clone)]
pub enum FieldValidator {
    /// 调用方提供的验证函数
    Custom(CustomValidator),
    /// 引用存在性检查
    Existence(ExistenceValidator),
}

impl std::fmt::Debug for FieldValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValidator::Custom(v) => write!(f, "Custom({:?})", v.message),
            FieldValidator::Existence(v) => write!(f, "Existence({})", v.target),
        }
    }
}

impl FieldValidator {
    /// 对非空值执行验证
    pub async fn run(&self, path: &str, value: &DataValue) -> ConnectorResult<()> {
        match self {
            FieldValidator::Custom(custom) => {
                if custom.check.validate(value).await? {
                    Ok(())
                } else {
                    Err(ConnectorError::ValidationError {
                        field: path.to_string(),
                        message: custom.render_message(path, value),
                    })
                }
            }
            FieldValidator::Existence(existence) => existence.check(path, value).await,
        }
    }
}
