//! 多语言错误消息模块
//!
//! 使用rat_embed_lang框架提供统一的错误消息多语言支持

use rat_embed_lang::register_translations;
use std::collections::HashMap;
use std::sync::Once;

static REGISTER: Once = Once::new();

/// (键, zh-CN, en-US, ja-JP)
const TRANSLATIONS: &[(&str, &str, &str, &str)] = &[
    (
        "error.alias_required",
        "启用名称与别名策略时，模型 '{name}' 必须提供别名",
        "Model '{name}' must provide an alias when the name-and-alias policy is enabled",
        "名前とエイリアスのポリシーが有効な場合、モデル '{name}' にはエイリアスが必要です",
    ),
    (
        "error.reference_not_found",
        "{model} 中不存在 id 为 {id} 的文档",
        "{model} with id {id} does not exist",
        "{model} に id {id} のドキュメントが存在しません",
    ),
    (
        "error.required",
        "字段 {field} 为必填项",
        "Path `{field}` is required",
        "フィールド {field} は必須です",
    ),
    (
        "error.model_file",
        "解析模型文件失败 {path}: {message}",
        "Failed to parse model file {path}: {message}",
        "モデルファイルの解析に失敗しました {path}: {message}",
    ),
    (
        "error.duplicate_model",
        "模型名称 '{name}' 重复",
        "Duplicate model name '{name}'",
        "モデル名 '{name}' が重複しています",
    ),
    (
        "error.duplicate_key",
        "集合 {collection} 的唯一字段 {field} 存在重复值: {value}",
        "Duplicate key in {collection}.{field}: {value}",
        "{collection} の一意フィールド {field} に重複値があります: {value}",
    ),
];

/// 错误消息翻译注册器
pub struct ErrorMessageI18n;

impl ErrorMessageI18n {
    /// 注册所有错误消息翻译
    pub fn register_all_translations() {
        REGISTER.call_once(|| {
            let mut translations = HashMap::new();
            for (key, zh, en, ja) in TRANSLATIONS {
                let mut entry = HashMap::new();
                entry.insert("zh-CN".to_string(), zh.to_string());
                entry.insert("en-US".to_string(), en.to_string());
                entry.insert("ja-JP".to_string(), ja.to_string());
                translations.insert(key.to_string(), entry);
            }
            register_translations(translations);
        });
    }

    /// 初始化错误消息多语言支持
    pub fn init() {
        Self::register_all_translations();

        // 从环境变量获取语言设置，默认为zh-CN
        let lang = std::env::var("RAT_LANG")
            .or_else(|_| std::env::var("LANG"))
            .unwrap_or_else(|_| "zh-CN".to_string());

        use rat_embed_lang::normalize_language_code;
        let normalized_lang = normalize_language_code(&lang);
        set_language(&normalized_lang);
    }
}

/// 按当前语言格式化消息
///
/// 翻译结果缺少任一参数时回退到内置的 en-US 模板
pub fn message(key: &str, args: &[(&str, &str)]) -> String {
    ErrorMessageI18n::register_all_translations();
    let translated = tf(key, args);
    if translated != key && args.iter().all(|(_, value)| translated.contains(value)) {
        return translated;
    }

    let template = TRANSLATIONS
        .iter()
        .find(|(k, ..)| *k == key)
        .map(|(_, _, en, _)| *en)
        .unwrap_or(key);
    let mut out = template.to_string();
    for (name, value) in args {
        out = out.replace(&format!("{{{}}}", name), value);
    }
    out
}

/// 重新导出rat_embed_lang的核心函数
pub use rat_embed_lang::{current_language, set_language, t, tf};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_contains_arguments() {
        let msg = message(
            "error.reference_not_found",
            &[("model", "Account"), ("id", "65f1c0ffee0000000000beef")],
        );
        assert!(msg.contains("Account"));
        assert!(msg.contains("65f1c0ffee0000000000beef"));
    }
}
