// Queue Domain Model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Queue category (closed set: one grouped queue and one worker pool each)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueCategory {
    Message,
    Import,
    Export,
}

impl QueueCategory {
    /// Every category, in status-report order
    pub const ALL: [QueueCategory; 3] = [
        QueueCategory::Message,
        QueueCategory::Import,
        QueueCategory::Export,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueCategory::Message => "message",
            QueueCategory::Import => "import",
            QueueCategory::Export => "export",
        }
    }

    /// Human readable name used in logs and status output
    pub fn display_name(&self) -> &'static str {
        match self {
            QueueCategory::Message => "Message Queue",
            QueueCategory::Import => "Importations Queue",
            QueueCategory::Export => "Exportations Queue",
        }
    }
}

impl fmt::Display for QueueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "message" | "messages" => Ok(QueueCategory::Message),
            "import" | "importations" => Ok(QueueCategory::Import),
            "export" | "exportations" => Ok(QueueCategory::Export),
            _ => Err(AppError::UnknownCategory(s.to_string())),
        }
    }
}

/// One value per category.
///
/// Each category is a named field, so lookups are an exhaustive `match`
/// instead of a map probe that could miss.
#[derive(Debug, Clone, Default)]
pub struct PerCategory<T> {
    pub message: T,
    pub import: T,
    pub export: T,
}

impl<T> PerCategory<T> {
    /// Build every slot from the category it belongs to
    pub fn from_fn(mut f: impl FnMut(QueueCategory) -> T) -> Self {
        Self {
            message: f(QueueCategory::Message),
            import: f(QueueCategory::Import),
            export: f(QueueCategory::Export),
        }
    }

    pub fn get(&self, category: QueueCategory) -> &T {
        match category {
            QueueCategory::Message => &self.message,
            QueueCategory::Import => &self.import,
            QueueCategory::Export => &self.export,
        }
    }

    pub fn get_mut(&mut self, category: QueueCategory) -> &mut T {
        match category {
            QueueCategory::Message => &mut self.message,
            QueueCategory::Import => &mut self.import,
            QueueCategory::Export => &mut self.export,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (QueueCategory, &T)> {
        QueueCategory::ALL.into_iter().map(move |c| (c, self.get(c)))
    }

    /// Fallible variant of `from_fn`, stopping at the first error
    pub fn try_from_fn<E>(
        mut f: impl FnMut(QueueCategory) -> Result<T, E>,
    ) -> Result<Self, E> {
        Ok(Self {
            message: f(QueueCategory::Message)?,
            import: f(QueueCategory::Import)?,
            export: f(QueueCategory::Export)?,
        })
    }
}

/// Static per-category tuning, loaded once at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    pub category: QueueCategory,
    /// Distinct groups processed at the same time by this category's pool
    pub concurrency: usize,
    pub keep_completed: usize,
    pub keep_failed: usize,
}

impl QueueConfig {
    pub fn new(category: QueueCategory, concurrency: usize) -> Self {
        Self {
            category,
            concurrency,
            keep_completed: DEFAULT_KEEP_JOBS,
            keep_failed: DEFAULT_KEEP_JOBS,
        }
    }

    /// Built-in defaults (message 5, import/export 3)
    pub fn default_for(category: QueueCategory) -> Self {
        let concurrency = match category {
            QueueCategory::Message => 5,
            QueueCategory::Import | QueueCategory::Export => 3,
        };
        Self::new(category, concurrency)
    }

    pub fn with_retention(mut self, keep_completed: usize, keep_failed: usize) -> Self {
        self.keep_completed = keep_completed;
        self.keep_failed = keep_failed;
        self
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.concurrency == 0 {
            return Err(AppError::Config(format!(
                "concurrency for queue \"{}\" must be at least 1",
                self.category
            )));
        }
        Ok(())
    }
}

/// Retention applied when no override is configured
pub const DEFAULT_KEEP_JOBS: usize = 1000;

/// Job counts by state for one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub delayed: u64,
}

impl QueueCounts {
    /// Jobs not yet finished (waiting, delayed or active)
    pub fn outstanding(&self) -> u64 {
        self.waiting + self.delayed + self.active
    }
}

/// Status API entry: counts plus the static config they run under
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryStatus {
    pub category: QueueCategory,
    pub display_name: String,
    pub concurrency: usize,
    pub counts: QueueCounts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parses_aliases() {
        assert_eq!("message".parse::<QueueCategory>().unwrap(), QueueCategory::Message);
        assert_eq!("importations".parse::<QueueCategory>().unwrap(), QueueCategory::Import);
        assert_eq!("EXPORT".parse::<QueueCategory>().unwrap(), QueueCategory::Export);
    }

    #[test]
    fn test_unknown_category_rejected() {
        let err = "billing".parse::<QueueCategory>().unwrap_err();
        assert!(matches!(err, AppError::UnknownCategory(ref c) if c == "billing"));
    }

    #[test]
    fn test_per_category_lookup_matches_slot() {
        let map = PerCategory::from_fn(|c| c.as_str().len());
        assert_eq!(*map.get(QueueCategory::Message), 7);
        assert_eq!(*map.get(QueueCategory::Export), 6);
        let order: Vec<_> = map.iter().map(|(c, _)| c).collect();
        assert_eq!(order, QueueCategory::ALL.to_vec());
    }

    #[test]
    fn test_zero_concurrency_is_config_error() {
        let config = QueueConfig::new(QueueCategory::Import, 0);
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
        assert!(QueueConfig::default_for(QueueCategory::Import).validate().is_ok());
    }
}
