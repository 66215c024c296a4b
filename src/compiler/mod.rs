//! 编译模块：将原始规则编译为可执行的匹配器
pub mod pattern;
pub mod compiler;

pub use self::pattern::{normalize, strip_pattern_noise, CategoryIndex, CompiledTechnology, PatternSet};
pub use self::compiler::{CompileStats, RuleCompiler};
