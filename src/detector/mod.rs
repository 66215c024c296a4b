//! 检测模块：技术检测核心逻辑
pub mod analyzer;
pub mod detector;

// 导出核心接口
pub use self::analyzer::{evaluate_technology, BodyAnalyzer, HeaderAnalyzer, UrlAnalyzer};
pub use self::detector::TechDetector;
