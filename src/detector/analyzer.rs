//! 检测分析器：负责单个技术在各证据维度上的求值
//! 证据优先级固定为 Header > HTML正文 > URL，命中任一维度即短路

use rustc_hash::FxHashMap;

use crate::compiler::CompiledTechnology;
use crate::rule::model::PageSignals;

/// Header分析器
pub struct HeaderAnalyzer;

impl HeaderAnalyzer {
    /// Header证据求值：任一Header模式命中其对应头值即成立
    pub fn matches(
        tech: &CompiledTechnology,
        headers: Option<&FxHashMap<String, String>>,
    ) -> bool {
        let (Some(header_patterns), Some(headers)) = (tech.header_patterns.as_ref(), headers)
        else {
            return false;
        };

        for (header_name, patterns) in header_patterns {
            // Header键已在调用侧统一转为小写
            let Some(value) = headers.get(header_name) else {
                continue;
            };
            if let Some(rule) = patterns.first_match(value) {
                log::debug!(
                    "Header匹配成功：技术={}，Header={}，规则={}",
                    tech.name,
                    header_name,
                    rule.as_str()
                );
                return true;
            }
        }
        false
    }
}

/// HTML正文分析器
pub struct BodyAnalyzer;

impl BodyAnalyzer {
    /// 正文证据求值（html/script/meta合并后的匹配器）
    pub fn matches(tech: &CompiledTechnology, html: Option<&str>) -> bool {
        let (Some(body_patterns), Some(html)) = (tech.body_patterns.as_ref(), html) else {
            return false;
        };
        if let Some(rule) = body_patterns.first_match(html) {
            log::debug!("正文匹配成功：技术={}，规则={}", tech.name, rule.as_str());
            return true;
        }
        false
    }
}

/// URL分析器
pub struct UrlAnalyzer;

impl UrlAnalyzer {
    /// URL证据求值
    pub fn matches(tech: &CompiledTechnology, url: Option<&str>) -> bool {
        let (Some(url_patterns), Some(url)) = (tech.url_patterns.as_ref(), url) else {
            return false;
        };
        if let Some(rule) = url_patterns.first_match(url) {
            log::debug!("URL匹配成功：技术={}，规则={}", tech.name, rule.as_str());
            return true;
        }
        false
    }
}

/// 单技术求值：按证据优先级依次尝试，首个命中维度即定论
pub fn evaluate_technology(
    tech: &CompiledTechnology,
    signals: &PageSignals<'_>,
    lowered_headers: Option<&FxHashMap<String, String>>,
) -> bool {
    HeaderAnalyzer::matches(tech, lowered_headers)
        || BodyAnalyzer::matches(tech, signals.html)
        || UrlAnalyzer::matches(tech, signals.url)
}
