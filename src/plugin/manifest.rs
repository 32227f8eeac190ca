//! Plugin manifests and the descriptors built from them
use crate::config::{self, ProtocolConfig};
use crate::error::{Result as RflaunchResult, RflaunchError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MANIFEST_FILE_NAME: &str = "plugin.json";

/// Keyword value that matches every query.
pub const GLOBAL_KEYWORD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Keyword {
    /// Matches every query. The empty keyword is treated the same way.
    Global,
    Named(String),
}

impl Keyword {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == GLOBAL_KEYWORD {
            Keyword::Global
        } else {
            Keyword::Named(trimmed.to_string())
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Keyword::Global)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Keyword::Global => GLOBAL_KEYWORD,
            Keyword::Named(name) => name,
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Keyword {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Execution strategy declared by the manifest `language` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Shared library loaded into the host process.
    Native,
    /// Script run through the configured Python interpreter.
    Python,
    /// Standalone program run directly.
    Executable,
}

impl Language {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "native" => Some(Language::Native),
            "python" => Some(Language::Python),
            "executable" => Some(Language::Executable),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Native => write!(f, "native"),
            Language::Python => write!(f, "python"),
            Language::Executable => write!(f, "executable"),
        }
    }
}

/// On-disk manifest. Accepts camelCase keys and the PascalCase spelling used
/// by existing plugins.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PluginManifest {
    #[serde(alias = "ID", alias = "Id")]
    pub id: String,
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Version")]
    pub version: String,
    #[serde(alias = "Author")]
    pub author: String,
    #[serde(alias = "Description")]
    pub description: String,
    #[serde(alias = "Language")]
    pub language: String,
    #[serde(rename = "executeFileName", alias = "ExecuteFileName")]
    pub execute_file_name: String,
    #[serde(rename = "actionKeyword", alias = "ActionKeyword")]
    pub action_keyword: Option<String>,
    #[serde(rename = "actionKeywords", alias = "ActionKeywords")]
    pub action_keywords: Vec<String>,
    #[serde(alias = "Disabled")]
    pub disabled: bool,
    #[serde(rename = "icoPath", alias = "IcoPath")]
    pub ico_path: Option<String>,
    #[serde(rename = "keepResultRawScore", alias = "KeepResultRawScore")]
    pub keep_result_raw_score: bool,
    #[serde(alias = "Exclusive")]
    pub exclusive: bool,
    #[serde(rename = "timeoutMs", alias = "TimeoutMs")]
    pub timeout_ms: Option<u64>,
}

impl PluginManifest {
    pub fn from_file(path: &Path) -> RflaunchResult<Self> {
        let raw = fs::read_to_string(path).map_err(|e| RflaunchError::Manifest {
            path: path.to_path_buf(),
            reason: format!("read failed: {e}"),
        })?;
        serde_json::from_str(&raw).map_err(|e| RflaunchError::Manifest {
            path: path.to_path_buf(),
            reason: format!("invalid json: {e}"),
        })
    }

    /// Ordered, de-duplicated keyword set. No keyword at all means global.
    pub fn keywords(&self) -> Vec<Keyword> {
        let mut keywords: Vec<Keyword> = Vec::new();
        let declared = self
            .action_keyword
            .iter()
            .chain(self.action_keywords.iter());
        for raw in declared {
            let keyword = Keyword::parse(raw);
            if !keywords.contains(&keyword) {
                keywords.push(keyword);
            }
        }
        if keywords.is_empty() {
            keywords.push(Keyword::Global);
        }
        keywords
    }
}

/// Identity and routing data of one loaded plugin.
#[derive(Debug, Clone, Serialize)]
pub struct PluginDescriptor {
    pub id: String,
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub language: Language,
    pub directory: PathBuf,
    pub executable_path: PathBuf,
    pub icon_path: Option<PathBuf>,
    pub action_keywords: Vec<Keyword>,
    pub disabled: bool,
    pub keep_raw_score: bool,
    /// Suppress global plugins when one of this plugin's keywords is used.
    pub exclusive: bool,
    /// Overrides the configured process timeout; `0` disables it.
    #[serde(skip)]
    pub timeout_ms: Option<u64>,
}

impl PluginDescriptor {
    /// Reads and validates the manifest in `directory`.
    pub fn load(directory: &Path) -> RflaunchResult<Self> {
        let manifest_path = directory.join(MANIFEST_FILE_NAME);
        if !manifest_path.is_file() {
            return Err(RflaunchError::Manifest {
                path: manifest_path,
                reason: "manifest file is missing".to_string(),
            });
        }
        let manifest = PluginManifest::from_file(&manifest_path)?;
        Self::from_manifest(manifest, directory, &manifest_path)
    }

    pub fn from_manifest(
        manifest: PluginManifest,
        directory: &Path,
        manifest_path: &Path,
    ) -> RflaunchResult<Self> {
        let id = manifest.id.trim().to_string();
        if id.is_empty() {
            return Err(RflaunchError::Manifest {
                path: manifest_path.to_path_buf(),
                reason: "missing plugin id".to_string(),
            });
        }

        let language = Language::parse(&manifest.language).ok_or_else(|| {
            RflaunchError::UnsupportedLanguage {
                language: manifest.language.clone(),
                path: manifest_path.to_path_buf(),
            }
        })?;

        if manifest.execute_file_name.trim().is_empty() {
            return Err(RflaunchError::Manifest {
                path: manifest_path.to_path_buf(),
                reason: "missing executeFileName".to_string(),
            });
        }
        let executable_path = directory.join(manifest.execute_file_name.trim());
        if !executable_path.is_file() {
            return Err(RflaunchError::MissingExecutable(executable_path));
        }

        let name = if manifest.name.trim().is_empty() {
            id.clone()
        } else {
            manifest.name.trim().to_string()
        };

        Ok(Self {
            action_keywords: manifest.keywords(),
            id,
            name,
            version: manifest.version,
            author: manifest.author,
            description: manifest.description,
            language,
            directory: directory.to_path_buf(),
            executable_path,
            icon_path: manifest
                .ico_path
                .filter(|p| !p.trim().is_empty())
                .map(|p| directory.join(p.trim())),
            disabled: manifest.disabled,
            keep_raw_score: manifest.keep_result_raw_score,
            exclusive: manifest.exclusive,
            timeout_ms: manifest.timeout_ms,
        })
    }

    /// Descriptor for a plugin registered in code rather than from disk.
    pub fn native(id: &str, name: &str, keywords: &[&str]) -> Self {
        let mut action_keywords: Vec<Keyword> = Vec::new();
        for raw in keywords {
            let keyword = Keyword::parse(raw);
            if !action_keywords.contains(&keyword) {
                action_keywords.push(keyword);
            }
        }
        if action_keywords.is_empty() {
            action_keywords.push(Keyword::Global);
        }
        Self {
            id: id.to_string(),
            name: name.to_string(),
            version: String::new(),
            author: String::new(),
            description: String::new(),
            language: Language::Native,
            directory: PathBuf::new(),
            executable_path: PathBuf::new(),
            icon_path: None,
            action_keywords,
            disabled: false,
            keep_raw_score: false,
            exclusive: false,
            timeout_ms: None,
        }
    }

    /// Process timeout for this plugin: its own setting if it has one, the
    /// configured default otherwise.
    pub fn timeout(&self, protocol: &ProtocolConfig) -> Option<Duration> {
        match self.timeout_ms {
            Some(millis) => config::timeout_from_millis(millis),
            None => protocol.timeout(),
        }
    }

    pub fn is_global(&self) -> bool {
        self.action_keywords.iter().any(Keyword::is_global)
    }

    pub fn named_keywords(&self) -> impl Iterator<Item = &str> {
        self.action_keywords
            .iter()
            .filter_map(|keyword| match keyword {
                Keyword::Named(name) => Some(name.as_str()),
                Keyword::Global => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_plugin(dir: &Path, manifest: &str, exe: Option<&str>) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(MANIFEST_FILE_NAME), manifest).unwrap();
        if let Some(exe) = exe {
            fs::write(dir.join(exe), "#!/bin/sh\n").unwrap();
        }
    }

    #[test]
    fn keyword_parsing_treats_empty_as_global() {
        assert_eq!(Keyword::parse(""), Keyword::Global);
        assert_eq!(Keyword::parse("*"), Keyword::Global);
        assert_eq!(Keyword::parse(" g "), Keyword::Named("g".into()));
    }

    #[test]
    fn pascal_case_manifest_is_accepted() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("web");
        write_plugin(
            &dir,
            r#"{"ID":"web","Name":"Web","Language":"python","ExecuteFileName":"main.py",
                "ActionKeyword":"g","ActionKeywords":["g","wiki"],"IcoPath":"icon.png",
                "KeepResultRawScore":true}"#,
            Some("main.py"),
        );

        let descriptor = PluginDescriptor::load(&dir).unwrap();
        assert_eq!(descriptor.id, "web");
        assert_eq!(descriptor.language, Language::Python);
        assert_eq!(
            descriptor.named_keywords().collect::<Vec<_>>(),
            vec!["g", "wiki"]
        );
        assert!(!descriptor.is_global());
        assert!(descriptor.keep_raw_score);
        assert_eq!(descriptor.icon_path, Some(dir.join("icon.png")));
    }

    #[test]
    fn missing_keywords_default_to_global() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("calc");
        write_plugin(
            &dir,
            r#"{"id":"calc","language":"executable","executeFileName":"calc"}"#,
            Some("calc"),
        );
        let descriptor = PluginDescriptor::load(&dir).unwrap();
        assert_eq!(descriptor.action_keywords, vec![Keyword::Global]);
        assert_eq!(descriptor.name, "calc");
    }

    #[test]
    fn manifest_timeout_overrides_config_and_zero_disables() {
        let tmp = TempDir::new().unwrap();
        let protocol = ProtocolConfig::default();
        let load = |name: &str, extra: &str| {
            let dir = tmp.path().join(name);
            write_plugin(
                &dir,
                &format!(
                    r#"{{"id":"{name}","language":"executable","executeFileName":"run"{extra}}}"#
                ),
                Some("run"),
            );
            PluginDescriptor::load(&dir).unwrap()
        };

        assert_eq!(load("inherit", "").timeout(&protocol), protocol.timeout());
        assert_eq!(
            load("short", r#","timeoutMs":250"#).timeout(&protocol),
            Some(Duration::from_millis(250))
        );
        assert_eq!(load("unbounded", r#","timeoutMs":0"#).timeout(&protocol), None);
    }

    #[test]
    fn unsupported_language_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("cs");
        write_plugin(
            &dir,
            r#"{"id":"cs","language":"fsharp","executeFileName":"x.dll"}"#,
            Some("x.dll"),
        );
        assert!(matches!(
            PluginDescriptor::load(&dir),
            Err(RflaunchError::UnsupportedLanguage { .. })
        ));
    }

    #[test]
    fn missing_executable_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("gone");
        write_plugin(
            &dir,
            r#"{"id":"gone","language":"python","executeFileName":"main.py"}"#,
            None,
        );
        assert!(matches!(
            PluginDescriptor::load(&dir),
            Err(RflaunchError::MissingExecutable(_))
        ));
    }
}
