//! 规则配置表面
//!
//! 匹配器与规则以结构化配置（serde）描述，由外部配置加载器提供；
//! 这里只负责把描述物化为 [`RuleSetBuilder`]。
//! 非法的匹配器描述在构建时立刻失败，先于任何扫描。

use serde::{Deserialize, Serialize};
use wyvern_aop::{ConfigError, InterceptionRule, InterceptorRegistry, MethodMatcher, RuleSet, RuleSetBuilder};
use wyvern_classfile::flags;

/// 匹配器描述
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MatcherSpec {
    /// 匹配所有方法
    All,

    /// 方法名模式（`*` 通配符）
    Name { pattern: String },

    /// 方法名正则
    NameRegex { pattern: String },

    /// 注解类型名模式（点分形式）
    Annotation { name: String },

    /// 所属类型名模式
    DeclaringType { pattern: String },

    /// 所属类型名正则
    TypeRegex { pattern: String },

    /// 类型 + 方法名组合
    Execution {
        type_pattern: String,
        method_pattern: String,
    },

    /// 修饰符组合，名称见 [`flags::flag_by_name`]
    Modifiers {
        #[serde(default)]
        required: Vec<String>,
        #[serde(default)]
        forbidden: Vec<String>,
    },

    /// 与：全部子匹配器命中
    And { all: Vec<MatcherSpec> },

    /// 或：任一子匹配器命中
    Or { any: Vec<MatcherSpec> },

    /// 非
    Not { inner: Box<MatcherSpec> },
}

impl MatcherSpec {
    /// 物化为匹配器
    pub fn build(&self) -> Result<MethodMatcher, ConfigError> {
        match self {
            MatcherSpec::All => Ok(MethodMatcher::All),
            MatcherSpec::Name { pattern } => Ok(MethodMatcher::Name(pattern.clone())),
            MatcherSpec::NameRegex { pattern } => MethodMatcher::name_regex(pattern),
            MatcherSpec::Annotation { name } => Ok(MethodMatcher::Annotation(name.clone())),
            MatcherSpec::DeclaringType { pattern } => {
                Ok(MethodMatcher::DeclaringType(pattern.clone()))
            }
            MatcherSpec::TypeRegex { pattern } => MethodMatcher::type_regex(pattern),
            MatcherSpec::Execution { type_pattern, method_pattern } => {
                Ok(MethodMatcher::Execution {
                    type_pattern: type_pattern.clone(),
                    method_pattern: method_pattern.clone(),
                })
            }
            MatcherSpec::Modifiers { required, forbidden } => Ok(MethodMatcher::Modifiers {
                required: parse_flags(required)?,
                forbidden: parse_flags(forbidden)?,
            }),
            MatcherSpec::And { all } => combine(all, MethodMatcher::and),
            MatcherSpec::Or { any } => combine(any, MethodMatcher::or),
            MatcherSpec::Not { inner } => Ok(inner.build()?.not()),
        }
    }
}

fn combine(
    specs: &[MatcherSpec],
    op: fn(MethodMatcher, MethodMatcher) -> MethodMatcher,
) -> Result<MethodMatcher, ConfigError> {
    let mut iter = specs.iter();
    let first = iter
        .next()
        .ok_or_else(|| ConfigError::InvalidMatcher {
            reason: "empty combinator".to_string(),
        })?
        .build()?;
    iter.try_fold(first, |acc, spec| Ok(op(acc, spec.build()?)))
}

fn parse_flags(names: &[String]) -> Result<u16, ConfigError> {
    let mut mask = 0u16;
    for name in names {
        let flag = flags::flag_by_name(name).ok_or_else(|| ConfigError::InvalidMatcher {
            reason: format!("unknown modifier '{}'", name),
        })?;
        mask |= flag;
    }
    Ok(mask)
}

/// 一条规则的配置描述
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub matcher: MatcherSpec,
    pub interceptors: Vec<String>,
    #[serde(default)]
    pub match_synthetic: bool,
}

/// 完整的织入配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeaveConfig {
    pub rules: Vec<RuleSpec>,
}

impl WeaveConfig {
    /// 从 JSON 文本解析
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })
    }

    /// 物化为规则集构建器
    pub fn into_builder(self) -> Result<RuleSetBuilder, ConfigError> {
        let mut builder = RuleSetBuilder::new();
        for spec in self.rules {
            let mut rule = InterceptionRule::new(spec.matcher.build()?, spec.interceptors);
            if spec.match_synthetic {
                rule = rule.with_synthetic();
            }
            builder.add(rule);
        }
        Ok(builder)
    }

    /// 物化并冻结为规则集
    pub fn build(self, registry: &InterceptorRegistry) -> Result<RuleSet, ConfigError> {
        self.into_builder()?.freeze(registry)
    }
}
