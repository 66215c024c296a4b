//! Header格式转换工具
//! 不同Header形态与大小写之间的转换

use rustc_hash::FxHashMap;

/// Header转换工具
pub struct HeaderConverter;

impl HeaderConverter {
    /// 将Header键统一转为小写（值保持原样）
    pub fn to_lowercase_keys(headers: &FxHashMap<String, String>) -> FxHashMap<String, String> {
        headers
            .iter()
            .map(|(key, value)| (key.to_ascii_lowercase(), value.clone()))
            .collect()
    }

    /// 将多值Header映射折叠为单值（取首个非空值），键转小写
    pub fn to_single_value(headers: &FxHashMap<String, Vec<String>>) -> FxHashMap<String, String> {
        let mut single = FxHashMap::default();
        for (key, values) in headers {
            if let Some(first) = values.iter().find(|value| !value.is_empty()) {
                single.insert(key.to_ascii_lowercase(), first.clone());
            }
        }
        single
    }
}
