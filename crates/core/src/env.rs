//! Thoth and Thamos environment variables injected into patched builds.

/// Prefixes of process variables that are forwarded to build configs.
pub const FORWARDED_PREFIXES: &[&str] = &["THOTH_", "THAMOS_"];

/// Default variables, in insertion order.
pub const THOTH_ENV_DEFAULTS: &[(&str, &str)] = &[
    ("UPGRADE_PIP_TO_LATEST", ""),
    ("DISABLE_SETUP_PY_PROCESSING", ""),
    ("THOTH_DRY_RUN", "0"),
    ("THOTH_ADVISE", "1"),
    ("THOTH_ASSEMBLE_DEBUG", "1"),
    ("THOTH_FROM_MASTER", "0"),
    ("THOTH_ERROR_FALLBACK", "1"),
    ("THAMOS_VERBOSE", "0"),
    ("THAMOS_FORCE", "0"),
    ("THAMOS_DEBUG", "0"),
    ("THAMOS_CONFIG_EXPAND_ENV", "0"),
    ("THAMOS_NO_PROGRESSBAR", "1"),
    ("THAMOS_NO_INTERACTIVE", "1"),
    ("THAMOS_REQUIREMENTS_FORMAT", "pipenv"),
    ("THAMOS_DEV", "0"),
];

/// Ordered, immutable table of environment variables for the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThothEnvTable {
    entries: Vec<(String, String)>,
}

impl Default for ThothEnvTable {
    fn default() -> Self {
        Self::defaults()
    }
}

impl ThothEnvTable {
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }

    pub fn defaults() -> Self {
        Self::new(
            THOTH_ENV_DEFAULTS
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        )
    }

    /// Apply `THOTH_*`/`THAMOS_*` overrides.
    ///
    /// Known names keep their position; new names are appended sorted by name.
    /// Variables without a forwarded prefix are ignored.
    pub fn with_overrides(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut appended: Vec<(String, String)> = Vec::new();
        for (name, value) in vars {
            if !FORWARDED_PREFIXES.iter().any(|prefix| name.starts_with(prefix)) {
                continue;
            }
            match self.entries.iter_mut().find(|(known, _)| *known == name) {
                Some(entry) => entry.1 = value,
                None => match appended.iter_mut().find(|(known, _)| *known == name) {
                    Some(entry) => entry.1 = value,
                    None => appended.push((name, value)),
                },
            }
        }
        appended.sort_by(|a, b| a.0.cmp(&b.0));
        self.entries.extend(appended);
        self
    }

    /// Defaults overridden by the current process environment.
    pub fn from_process_env() -> Self {
        Self::defaults().with_overrides(std::env::vars())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(known, _)| known == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
