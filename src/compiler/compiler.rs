//! 规则编译器核心
//! 仅负责将单个技术的原始规则编译为可执行的匹配器

use regex::{Regex, RegexBuilder};
use rustc_hash::FxHashMap;
use serde_json::Value;

use super::pattern::{normalize, strip_pattern_noise, CompiledTechnology, PatternSet};
use crate::config::EngineConfig;
use crate::error::{RbwResult, RsbuiltwithError};
use crate::rule::model::TechRule;

/// 规则编译器
pub struct RuleCompiler;

impl RuleCompiler {
    /// 编译单个技术规则
    pub fn compile(
        tech_name: &str,
        tech_rule: &TechRule,
        config: &EngineConfig,
        stats: &mut CompileStats,
    ) -> RbwResult<CompiledTechnology> {
        let mut body_patterns = PatternSet::default();

        // 1. html模式直接进入正文匹配器
        for raw in Self::coerce_patterns(tech_name, "html", tech_rule.html.as_ref())? {
            let pattern = normalize(strip_pattern_noise(&raw));
            body_patterns.push(Self::compile_regex(tech_name, "html", &pattern, config)?);
            stats.html_count += 1;
        }

        // 2. script模式套用<script src>模板后进入正文匹配器
        for raw in Self::coerce_script_patterns(tech_name, tech_rule)? {
            let template = Self::script_src_template(&normalize(strip_pattern_noise(&raw)));
            body_patterns.push(Self::compile_regex(tech_name, "script", &template, config)?);
            stats.script_count += 1;
        }

        // 3. meta模式套用<meta>模板后进入正文匹配器
        if let Some(meta) = tech_rule.meta.as_ref() {
            for (meta_name, value) in meta {
                for raw in Self::coerce_patterns(tech_name, "meta", Some(value))? {
                    let template =
                        Self::meta_template(meta_name, &normalize(strip_pattern_noise(&raw)));
                    body_patterns.push(Self::compile_regex(tech_name, "meta", &template, config)?);
                    stats.meta_count += 1;
                }
            }
        }

        // 4. Header模式按小写Header名归并存放，同名不同大小写的键合并
        let mut header_patterns: FxHashMap<String, PatternSet> = FxHashMap::default();
        if let Some(headers) = tech_rule.headers.as_ref() {
            for (header_name, value) in headers {
                let raws = Self::coerce_patterns(tech_name, "headers", Some(value))?;
                if raws.is_empty() {
                    continue;
                }
                let set = header_patterns.entry(header_name.to_lowercase()).or_default();
                for raw in raws {
                    let pattern = normalize(strip_pattern_noise(&raw));
                    set.push(Self::compile_regex(tech_name, "headers", &pattern, config)?);
                    stats.header_count += 1;
                }
            }
        }

        // 5. URL模式独立存放
        let mut url_patterns = PatternSet::default();
        for raw in Self::coerce_patterns(tech_name, "url", tech_rule.url.as_ref())? {
            let pattern = normalize(strip_pattern_noise(&raw));
            url_patterns.push(Self::compile_regex(tech_name, "url", &pattern, config)?);
            stats.url_count += 1;
        }

        let body_patterns = if body_patterns.is_empty() {
            None
        } else {
            Some(body_patterns)
        };
        let url_patterns = if url_patterns.is_empty() {
            None
        } else {
            Some(url_patterns)
        };
        let header_patterns = if header_patterns.is_empty() {
            None
        } else {
            Some(header_patterns)
        };

        Ok(CompiledTechnology {
            name: tech_name.to_string(),
            body_patterns,
            url_patterns,
            header_patterns,
            multi_category: tech_rule.category_ids.len() > 1,
        })
    }

    /// 将规则字段值整理为有序模式列表（裸字符串视作单元素列表）
    fn coerce_patterns(
        tech_name: &str,
        field: &'static str,
        value: Option<&Value>,
    ) -> RbwResult<Vec<String>> {
        let Some(value) = value else {
            return Ok(Vec::new());
        };

        match value {
            Value::Null => Ok(Vec::new()),
            Value::String(s) => Ok(vec![s.clone()]),
            Value::Array(items) => {
                let mut patterns = Vec::with_capacity(items.len());
                for item in items {
                    if let Value::String(s) = item {
                        patterns.push(s.clone());
                    } else {
                        log::warn!(
                            "技术「{}」{}字段包含非字符串元素，已跳过：{}",
                            tech_name,
                            field,
                            item
                        );
                    }
                }
                Ok(patterns)
            }
            other => Err(RsbuiltwithError::MalformedCatalogError(format!(
                "技术「{}」{}字段形态不支持：{}",
                tech_name, field, other
            ))),
        }
    }

    /// 合并script与scriptSrc两个字段的模式（兼容不同目录方言）
    fn coerce_script_patterns(tech_name: &str, tech_rule: &TechRule) -> RbwResult<Vec<String>> {
        let mut patterns = Self::coerce_patterns(tech_name, "script", tech_rule.script.as_ref())?;
        patterns.extend(Self::coerce_patterns(
            tech_name,
            "script",
            tech_rule.script_src.as_ref(),
        )?);
        Ok(patterns)
    }

    /// <script>模板：src属性值中包含模式即命中
    fn script_src_template(pattern: &str) -> String {
        format!(r#"<script[^>]+src=["']?[^>"']*{}"#, pattern)
    }

    /// <meta>模板：name属性等于键且content属性值中包含模式
    /// name与content前要求空白或引号边界，data-name等同缀属性不参与匹配
    /// 仅识别name在前、content在后的属性顺序，反序的标签不命中
    fn meta_template(meta_name: &str, pattern: &str) -> String {
        format!(
            r#"<meta[^>]*["'\s]name=["']?{}["'\s](?:[^>]*["'\s])?content=["']?[^>"']*{}"#,
            regex::escape(meta_name),
            pattern
        )
    }

    /// 正则编译公共逻辑（大小写不敏感、点号跨行、体积受限）
    fn compile_regex(
        tech_name: &str,
        field: &'static str,
        pattern: &str,
        config: &EngineConfig,
    ) -> RbwResult<Regex> {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .size_limit(config.regex_size_limit)
            .build()
            .map_err(|source| RsbuiltwithError::MalformedRuleError {
                tech: tech_name.to_string(),
                field,
                source,
            })
    }
}

/// 编译统计信息
#[derive(Debug, Clone, Default)]
pub struct CompileStats {
    pub url_count: usize,
    pub html_count: usize,
    pub script_count: usize,
    pub header_count: usize,
    pub meta_count: usize,
}

impl CompileStats {
    /// 已编译的模式总数
    pub fn total(&self) -> usize {
        self.url_count + self.html_count + self.script_count + self.header_count + self.meta_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigManager;
    use serde_json::json;

    fn compile(tech_name: &str, rule: Value) -> RbwResult<CompiledTechnology> {
        let tech_rule: TechRule = serde_json::from_value(rule).unwrap();
        let config = ConfigManager::get_default();
        let mut stats = CompileStats::default();
        RuleCompiler::compile(tech_name, &tech_rule, &config, &mut stats)
    }

    #[test]
    fn test_compile_html_string_and_list() {
        // 测试场景：裸字符串与列表两种html字段形态
        let tech = compile("WordPress", json!({"cats": [1], "html": "wp-content"})).unwrap();
        let body = tech.body_patterns.unwrap();
        assert_eq!(body.len(), 1);
        assert!(body.is_match("<link href=\"/WP-Content/a.css\">"));

        let tech = compile(
            "WordPress",
            json!({"cats": [1], "html": ["wp-content", "wp-includes"]}),
        )
        .unwrap();
        assert_eq!(tech.body_patterns.unwrap().len(), 2);
    }

    #[test]
    fn test_compile_script_template_matches_src_attribute() {
        // 测试场景：script模式仅命中<script src>形态的外链引用
        let tech = compile("jQuery", json!({"cats": [12], "script": "jquery.*\\.js"})).unwrap();
        let body = tech.body_patterns.unwrap();
        assert!(body.is_match(
            r#"<script type="text/javascript" src="/assets/jquery-3.7.1.min.js"></script>"#
        ));
        assert!(!body.is_match("We talk about jquery and main.js in prose"));
    }

    #[test]
    fn test_compile_scripts_alias_and_script_src_merged() {
        // 测试场景：scripts别名与scriptSrc字段合并进正文匹配器
        let tech = compile(
            "Vue",
            json!({"cats": [12], "scripts": ["vue(\\.min)?\\.js"], "scriptSrc": ["cdn\\.vuejs\\.org"]}),
        )
        .unwrap();
        let body = tech.body_patterns.unwrap();
        assert_eq!(body.len(), 2);
        assert!(body.is_match(r#"<script src="https://cdn.vuejs.org/v3/vue.global.js">"#));
    }

    #[test]
    fn test_compile_meta_template_name_before_content_only() {
        // 测试场景：meta仅识别name在前content在后的属性顺序
        let tech = compile("WordPress", json!({"cats": [1], "meta": {"generator": "WordPress"}}))
            .unwrap();
        let body = tech.body_patterns.unwrap();
        assert!(body.is_match(r#"<meta name="generator" content="WordPress 6.4">"#));
        // 反序属性按既定限制不命中
        assert!(!body.is_match(r#"<meta content="WordPress 6.4" name="generator">"#));
        // name属性必须整体等于键，前缀相同不算
        assert!(!body.is_match(r#"<meta name="generatorX" content="WordPress 6.4">"#));
    }

    #[test]
    fn test_compile_meta_template_requires_real_attribute_names() {
        // 测试场景：data-name/data-content等同缀属性不得冒充name/content
        let tech = compile("WordPress", json!({"cats": [1], "meta": {"generator": "WordPress"}}))
            .unwrap();
        let body = tech.body_patterns.unwrap();
        assert!(!body.is_match(r#"<meta data-name="generator" content="WordPress 6.4">"#));
        assert!(!body.is_match(r#"<meta name="generator" data-content="WordPress 6.4">"#));
        // 前置其他属性与无空格的引号邻接形态仍然命中
        assert!(body.is_match(r#"<meta charset="utf-8" name="generator" content="WordPress 6.4">"#));
        assert!(body.is_match(r#"<meta name="generator"content="WordPress 6.4">"#));
    }

    #[test]
    fn test_compile_meta_list_value() {
        // 测试场景：meta内容模式为列表时逐条展开
        let tech = compile(
            "Drupal",
            json!({"cats": [1], "meta": {"generator": ["Drupal", "drupal \\d"]}}),
        )
        .unwrap();
        assert_eq!(tech.body_patterns.unwrap().len(), 2);
    }

    #[test]
    fn test_compile_headers_keys_lowercased() {
        // 测试场景：Header名以小写键存放
        let tech = compile(
            "Express",
            json!({"cats": [18], "headers": {"X-Powered-By": "Express"}}),
        )
        .unwrap();
        let headers = tech.header_patterns.unwrap();
        assert!(headers.contains_key("x-powered-by"));
        assert!(headers["x-powered-by"].is_match("Express 4.18"));
    }

    #[test]
    fn test_compile_header_keys_merge_case_variants() {
        // 测试场景：同名不同大小写的Header键合并为一个小写键，模式全部保留
        let tech = compile(
            "Mixed",
            json!({"cats": [1], "headers": {"Server": "nginx", "server": "openresty"}}),
        )
        .unwrap();
        let headers = tech.header_patterns.unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers["server"].len(), 2);
        assert!(headers["server"].is_match("nginx/1.25.3"));
        assert!(headers["server"].is_match("openresty/1.25.3.1"));
    }

    #[test]
    fn test_compile_empty_header_pattern_matches_presence() {
        // 测试场景：空模式编译为全匹配，等价于Header存在性检测
        let tech = compile(
            "Drupal",
            json!({"cats": [1], "headers": {"X-Drupal-Cache": ""}}),
        )
        .unwrap();
        let headers = tech.header_patterns.unwrap();
        assert!(headers["x-drupal-cache"].is_match("HIT"));
        assert!(headers["x-drupal-cache"].is_match(""));
    }

    #[test]
    fn test_compile_url_patterns() {
        // 测试场景：url模式独立存放，其余匹配器保持缺席
        let tech = compile(
            "Shopify",
            json!({"cats": [6], "url": ["myshopify\\.com", "cdn\\.shopify"]}),
        )
        .unwrap();
        let urls = tech.url_patterns.unwrap();
        assert!(urls.is_match("https://store.MyShopify.com/products"));
        assert!(tech.body_patterns.is_none());
        assert!(tech.header_patterns.is_none());
    }

    #[test]
    fn test_compile_multi_category_flag() {
        // 测试场景：声明的分类ID数量决定multi_category
        let multi = compile(
            "Squarespace",
            json!({"cats": [1, 6], "html": "squarespace"}),
        )
        .unwrap();
        assert!(multi.multi_category);
        let single = compile("Ghost", json!({"cats": [11], "html": "ghost"})).unwrap();
        assert!(!single.multi_category);
    }

    #[test]
    fn test_compile_invalid_pattern_reports_tech_and_field() {
        // 测试场景：无效正则报错并携带技术名与字段上下文
        let err = compile("Broken", json!({"cats": [1], "html": "foo(bar"})).unwrap_err();
        match err {
            RsbuiltwithError::MalformedRuleError { tech, field, .. } => {
                assert_eq!(tech, "Broken");
                assert_eq!(field, "html");
            }
            other => panic!("意外的错误类型：{:?}", other),
        }
    }

    #[test]
    fn test_compile_version_noise_stripped_before_compile() {
        // 测试场景：\;version:尾缀剥离后正常编译
        let tech = compile(
            "Nginx",
            json!({"cats": [18], "headers": {"Server": "nginx(?:/([\\d.]+))?\\;version:\\1"}}),
        )
        .unwrap();
        let headers = tech.header_patterns.unwrap();
        assert!(headers["server"].is_match("nginx/1.25.3"));
    }

    #[test]
    fn test_compile_unsupported_field_shape_is_structural_error() {
        // 测试场景：模式字段为对象等不支持形态时判定为目录结构错误
        let err = compile("Odd", json!({"cats": [1], "html": {"nested": true}})).unwrap_err();
        assert!(matches!(err, RsbuiltwithError::MalformedCatalogError(_)));
    }

    #[test]
    fn test_compile_non_string_list_items_skipped() {
        // 测试场景：列表中的非字符串元素跳过，不影响其余模式
        let tech = compile("Mixed", json!({"cats": [1], "html": ["valid", 42]})).unwrap();
        assert_eq!(tech.body_patterns.unwrap().len(), 1);
    }

    #[test]
    fn test_compile_dot_spans_lines() {
        // 测试场景：点号可跨行，模式能覆盖整页HTML
        let tech = compile(
            "Angular",
            json!({"cats": [12], "html": "ng-app.*ng-controller"}),
        )
        .unwrap();
        let body = tech.body_patterns.unwrap();
        assert!(body.is_match("<div ng-app=\"demo\">\n  <div ng-controller=\"main\">"));
    }
}
