//! 全局错误类型定义

use regex::Error as RegexError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RsbuiltwithError {
    // 规则目录相关错误
    #[error("规则目录结构无效：{0}")]
    MalformedCatalogError(String),
    #[error("规则编译失败：技术={tech}，字段={field}，原因={source}")]
    MalformedRuleError {
        tech: String,
        field: &'static str,
        #[source]
        source: RegexError,
    },

    // 检测相关错误
    #[error("未知分类：{0}")]
    UnknownCategoryError(String),

    // 序列化/反序列化错误
    #[error("JSON解析失败：{0}")]
    JsonError(#[from] SerdeJsonError),
}

// 全局Result类型
pub type RbwResult<T> = Result<T, RsbuiltwithError>;
