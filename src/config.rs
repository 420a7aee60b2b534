use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;

/// 配置值的枚举表示，用于承载处理器配置中未被识别的自定义键。
///
/// # 设计背景（Why）
/// - 规格要求“未知配置键被原样保留，绝不导致失败”；借鉴
///   `spark_core::configuration::value::ConfigValue` 的做法，用一个封闭但覆盖常见标量/
///   容器形态的枚举承载任意用户自定义配置，而不是强绑定某种序列化格式。
///
/// # 契约说明（What）
/// - 所有变体均可 `Clone`，便于在多个处理器描述符之间共享同一份不可变配置快照。
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(Cow<'static, str>),
    Duration(Duration),
    List(Vec<ConfigValue>),
}

/// 处理器配置：一份不可变的键值表，识别规格中列出的固定键，并保留任意自定义键。
///
/// # 契约说明（What）
/// - 识别键：`priority`（默认 0）、`disallow_subtypes`（默认 false）、`exclusive`
///   （默认 false）、`silent`（默认 false）、`ignore_sticky`（默认 false）、
///   `name`（可选字符串）。
/// - 未识别键被原样保留在 `extra` 中，读取方式与识别键一致（`get`/`get_or_default`）。
/// - 引擎只读取配置，从不修改；因此该类型不对外暴露任何可变方法，构造后即不可变。
#[derive(Clone, Debug, PartialEq)]
pub struct EventConfiguration {
    priority: i32,
    disallow_subtypes: bool,
    exclusive: bool,
    silent: bool,
    ignore_sticky: bool,
    name: Option<Cow<'static, str>>,
    extra: HashMap<Cow<'static, str>, ConfigValue>,
}

impl Default for EventConfiguration {
    fn default() -> Self {
        Self {
            priority: 0,
            disallow_subtypes: false,
            exclusive: false,
            silent: false,
            ignore_sticky: false,
            name: None,
            extra: HashMap::new(),
        }
    }
}

impl EventConfiguration {
    pub fn builder() -> EventConfigurationBuilder {
        EventConfigurationBuilder::default()
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn disallow_subtypes(&self) -> bool {
        self.disallow_subtypes
    }

    pub fn exclusive(&self) -> bool {
        self.exclusive
    }

    pub fn silent(&self) -> bool {
        self.silent
    }

    pub fn ignore_sticky(&self) -> bool {
        self.ignore_sticky
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// 读取自定义键，未设置时返回 `None`。
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.extra.get(key)
    }

    /// 读取自定义键，未设置时返回调用方提供的默认值的克隆。
    pub fn get_or_default(&self, key: &str, default: ConfigValue) -> ConfigValue {
        self.extra.get(key).cloned().unwrap_or(default)
    }
}

/// 构造 [`EventConfiguration`] 的构建器，镜像规格外部适配器组装描述符的方式。
#[derive(Default)]
pub struct EventConfigurationBuilder {
    inner: EventConfiguration,
}

impl EventConfigurationBuilder {
    pub fn priority(mut self, priority: i32) -> Self {
        self.inner.priority = priority;
        self
    }

    pub fn disallow_subtypes(mut self, value: bool) -> Self {
        self.inner.disallow_subtypes = value;
        self
    }

    pub fn exclusive(mut self, value: bool) -> Self {
        self.inner.exclusive = value;
        self
    }

    pub fn silent(mut self, value: bool) -> Self {
        self.inner.silent = value;
        self
    }

    pub fn ignore_sticky(mut self, value: bool) -> Self {
        self.inner.ignore_sticky = value;
        self
    }

    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.inner.name = Some(name.into());
        self
    }

    pub fn set(mut self, key: impl Into<Cow<'static, str>>, value: ConfigValue) -> Self {
        self.inner.extra.insert(key.into(), value);
        self
    }

    pub fn build(self) -> EventConfiguration {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = EventConfiguration::default();
        assert_eq!(cfg.priority(), 0);
        assert!(!cfg.disallow_subtypes());
        assert!(!cfg.exclusive());
        assert!(!cfg.silent());
        assert!(!cfg.ignore_sticky());
        assert_eq!(cfg.name(), None);
    }

    #[test]
    fn unknown_keys_are_preserved() {
        let cfg = EventConfiguration::builder()
            .set("retries", ConfigValue::Integer(3))
            .build();
        assert_eq!(cfg.get("retries"), Some(&ConfigValue::Integer(3)));
        assert_eq!(cfg.get("missing"), None);
        assert_eq!(
            cfg.get_or_default("missing", ConfigValue::Boolean(true)),
            ConfigValue::Boolean(true)
        );
    }

    #[test]
    fn builder_sets_recognized_keys() {
        let cfg = EventConfiguration::builder()
            .priority(100)
            .exclusive(true)
            .silent(true)
            .ignore_sticky(true)
            .disallow_subtypes(true)
            .name("handler-a")
            .build();
        assert_eq!(cfg.priority(), 100);
        assert!(cfg.exclusive());
        assert!(cfg.silent());
        assert!(cfg.ignore_sticky());
        assert!(cfg.disallow_subtypes());
        assert_eq!(cfg.name(), Some("handler-a"));
    }
}
