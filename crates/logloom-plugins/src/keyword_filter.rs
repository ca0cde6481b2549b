//! Drops records whose message contains a configured keyword.

use std::sync::RwLock;

use logloom_plugin::prelude::*;

/// Plugin name and factory id.
pub const NAME: &str = "keyword_filter";

const DEFAULT_KEYWORDS: &[&str] = &["ERROR"];

#[derive(Debug, Default)]
struct Rules {
    keywords: Vec<String>,
    case_sensitive: bool,
}

/// Keyword filter.
///
/// Settings: `keywords` (string list, default `["ERROR"]`) and
/// `case_sensitive` (bool, default false).
#[derive(Debug)]
pub struct KeywordFilter {
    descriptor: PluginDescriptor,
    rules: RwLock<Rules>,
}

impl KeywordFilter {
    /// Creates the filter with the default keyword list.
    pub fn new() -> Self {
        Self {
            descriptor: plugin_descriptor!(
                name: NAME,
                plugin_type: PluginType::Filter,
                version: "1.0.0",
                author: "Logloom Team",
                description: "Skips records whose message contains a keyword"
            ),
            rules: RwLock::new(Rules {
                keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
                case_sensitive: false,
            }),
        }
    }

    fn matches(&self, message: &str) -> Result<bool, PluginError> {
        let rules = self
            .rules
            .read()
            .map_err(|_| PluginError::process(NAME, "keyword rules lock poisoned"))?;
        if rules.case_sensitive {
            return Ok(rules.keywords.iter().any(|k| message.contains(k.as_str())));
        }
        let message = message.to_lowercase();
        Ok(rules
            .keywords
            .iter()
            .any(|k| message.contains(&k.to_lowercase())))
    }
}

impl Default for KeywordFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl LogPlugin for KeywordFilter {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn init(&self, helpers: &PluginHelpers) -> Result<(), PluginError> {
        let config = helpers.scoped(NAME);
        let mut keywords: Vec<String> = config
            .get_string_list("keywords", DEFAULT_KEYWORDS)
            .into_iter()
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.is_empty() {
            keywords = DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect();
        }
        let rules = Rules {
            keywords,
            case_sensitive: config.get_bool("case_sensitive", false),
        };
        tracing::info!(
            plugin = NAME,
            keywords = ?rules.keywords,
            case_sensitive = rules.case_sensitive,
            "Keyword filter initialized"
        );

        *self
            .rules
            .write()
            .map_err(|_| PluginError::init(NAME, "keyword rules lock poisoned"))? = rules;
        Ok(())
    }

    fn process(&self, record: &LogRecord) -> Result<ProcessResult, PluginError> {
        if self.matches(&record.message)? {
            return Ok(ProcessResult::Skip);
        }
        Ok(ProcessResult::Ok)
    }

    fn shutdown(&self) -> Result<(), PluginError> {
        Ok(())
    }
}
