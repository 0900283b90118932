//! Configuration of the transformation pipeline.
//!
//! A configuration document declares which transformation groups run and
//! in which order. Two shapes exist: a *root* configuration is complete
//! on its own; an *extension* amends the default root configuration by
//! overwriting parameters, replacing the transformation sets when it
//! declares any, and replacing the group order when it declares any.
//!
//! Group declarations live in transformation *set* documents resolved
//! relative to the configuration path. The document version must be at
//! least the engine version on (major, minor).

use crate::directive::DirectiveKind;
use crate::utils::errors::{ConfigError, ConfigErrorKind};
use crate::utils::version;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// File name of the default root configuration.
pub const DEFAULT_CONFIG_FILE: &str = "looptran-default.json";

/// Parameter key for the default target architecture.
pub const DEFAULT_TARGET: &str = "default_target";
/// Parameter key for the default accelerator directive language.
pub const DEFAULT_DIRECTIVE: &str = "default_directive";
/// Parameter key for the maximum output column.
pub const MAX_COLUMNS: &str = "max_columns";
/// Prefix of accelerator-family parameters.
pub const ACC_PARAM_PREFIX: &str = "acc_";

const ROOT_CONF_TYPE: &str = "root";
const EXT_CONF_TYPE: &str = "extension";

/// Classification of a transformation group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// Instances cooperate in pairs
    Dependent,
    /// Instances apply one by one
    Independent,
}

/// What causes instances of a group to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// One instance per matching directive
    Directive,
    /// One instance per translation unit
    TranslationUnit,
}

/// Transformation classes known to the engine.
///
/// A configuration references classes by path; the path must resolve here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformationClass {
    /// Loop fusion
    LoopFusion,
    /// Loop extraction
    LoopExtraction,
    /// Loop interchange
    LoopInterchange,
    /// Accelerator directive insertion
    Parallelize,
    /// Block statement removal
    Remove,
}

impl TransformationClass {
    /// Resolve a class path string.
    pub fn from_path(path: &str) -> Option<TransformationClass> {
        match path {
            "looptran::engine::fusion::LoopFusion" => Some(TransformationClass::LoopFusion),
            "looptran::engine::extraction::LoopExtraction" => {
                Some(TransformationClass::LoopExtraction)
            }
            "looptran::engine::interchange::LoopInterchange" => {
                Some(TransformationClass::LoopInterchange)
            }
            "looptran::engine::accelerator::Parallelize" => {
                Some(TransformationClass::Parallelize)
            }
            "looptran::engine::block::Remove" => Some(TransformationClass::Remove),
            _ => None,
        }
    }

    /// Class path string for this class.
    pub fn path(&self) -> &'static str {
        match self {
            TransformationClass::LoopFusion => "looptran::engine::fusion::LoopFusion",
            TransformationClass::LoopExtraction => {
                "looptran::engine::extraction::LoopExtraction"
            }
            TransformationClass::LoopInterchange => {
                "looptran::engine::interchange::LoopInterchange"
            }
            TransformationClass::Parallelize => "looptran::engine::accelerator::Parallelize",
            TransformationClass::Remove => "looptran::engine::block::Remove",
        }
    }

    /// Whether this class is a block transformation (start/end delimited).
    pub fn is_block(&self) -> bool {
        matches!(self, TransformationClass::Remove)
    }
}

/// One activated transformation group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupConfiguration {
    /// Name of the set the group was declared in
    pub set: String,
    /// Group name, matching the directive keyword it reacts to
    pub name: String,
    /// Dependent or independent
    pub kind: GroupKind,
    /// Directive- or translation-unit-triggered
    pub trigger: TriggerKind,
    /// Declared class path
    pub class_path: String,
    /// Resolved transformation class
    pub class: TransformationClass,
}

/// Accelerator-family parameters of a configuration.
#[derive(Debug, Clone, Default)]
pub struct AcceleratorConfiguration {
    params: HashMap<String, String>,
}

impl AcceleratorConfiguration {
    fn from_parameters(parameters: &HashMap<String, String>) -> Self {
        let params = parameters
            .iter()
            .filter(|(k, _)| k.starts_with(ACC_PARAM_PREFIX))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self { params }
    }

    /// Value of an accelerator parameter.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|v| v.as_str())
    }

    /// Number of accelerator parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether no accelerator parameter is set.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Serialized document shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigDocument {
    version: String,
    global: GlobalSection,
    #[serde(default)]
    sets: Vec<String>,
    #[serde(default)]
    groups: Vec<GroupRef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GlobalSection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    parameters: Vec<Parameter>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Parameter {
    key: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupRef {
    #[allow(dead_code)]
    set: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SetDocument {
    #[serde(default)]
    #[allow(dead_code)]
    version: Option<String>,
    transformations: Vec<TransformationDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TransformationDecl {
    name: String,
    class: String,
    #[serde(rename = "type")]
    kind: String,
    trigger: String,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// The resolved configuration threaded through the pipeline.
#[derive(Debug, Clone)]
pub struct Configuration {
    parameters: HashMap<String, String>,
    groups: Vec<GroupConfiguration>,
    available: HashMap<String, GroupConfiguration>,
}

impl Configuration {
    /// The built-in configuration: the standard groups in standard order.
    pub fn builtin() -> Self {
        let mut config = Self {
            parameters: HashMap::new(),
            groups: Vec::new(),
            available: HashMap::new(),
        };
        let standard = [
            ("loop-extract", GroupKind::Independent, TransformationClass::LoopExtraction),
            ("loop-fusion", GroupKind::Dependent, TransformationClass::LoopFusion),
            ("loop-interchange", GroupKind::Independent, TransformationClass::LoopInterchange),
            ("parallelize", GroupKind::Independent, TransformationClass::Parallelize),
            ("remove", GroupKind::Independent, TransformationClass::Remove),
        ];
        for (name, kind, class) in standard {
            let group = GroupConfiguration {
                set: "builtin".to_string(),
                name: name.to_string(),
                kind,
                trigger: TriggerKind::Directive,
                class_path: class.path().to_string(),
                class,
            };
            config.available.insert(group.name.clone(), group.clone());
            config.groups.push(group);
        }
        config
    }

    /// Load a configuration from the filesystem.
    ///
    /// `config_path` holds the default root configuration and the set
    /// documents; `user_config` optionally names a root or extension
    /// document. Without any document on disk the built-in configuration
    /// is used, amended by a user extension when given.
    pub fn load(config_path: &Path, user_config: Option<&Path>) -> Result<Self, ConfigError> {
        let resolver = |set: &str| -> Option<String> {
            std::fs::read_to_string(config_path.join(format!("{}.json", set))).ok()
        };
        let user_text = match user_config {
            Some(path) => Some(std::fs::read_to_string(path).map_err(|e| {
                ConfigError::new(
                    ConfigErrorKind::Malformed,
                    format!("cannot read configuration {}: {}", path.display(), e),
                )
            })?),
            None => None,
        };
        let default_path = config_path.join(DEFAULT_CONFIG_FILE);
        let default_text = std::fs::read_to_string(&default_path).ok();
        Self::from_documents(
            default_text.as_deref(),
            user_text.as_deref(),
            &resolver,
            crate::VERSION,
        )
    }

    /// Resolve a configuration from in-memory documents.
    ///
    /// `default_root` is the default root document (absent falls back to
    /// the built-in configuration), `user` an optional root or extension
    /// document, and `resolver` maps set names to set documents.
    pub fn from_documents(
        default_root: Option<&str>,
        user: Option<&str>,
        resolver: &dyn Fn(&str) -> Option<String>,
        engine_version: &str,
    ) -> Result<Self, ConfigError> {
        let user_doc = user.map(|text| parse_document(text, engine_version)).transpose()?;
        let default = |resolver: &dyn Fn(&str) -> Option<String>| match default_root {
            Some(text) => Self::from_root(parse_document(text, engine_version)?, resolver),
            None => Ok(Self::builtin()),
        };

        let config = match user_doc {
            Some(doc) if doc.global.kind == EXT_CONF_TYPE => {
                let mut base = default(resolver)?;
                base.apply_extension(&doc, resolver)?;
                base
            }
            Some(doc) => Self::from_root(doc, resolver)?,
            None => default(resolver)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn from_root(
        doc: ConfigDocument,
        resolver: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if doc.global.kind != ROOT_CONF_TYPE {
            return Err(ConfigError::new(
                ConfigErrorKind::Malformed,
                format!("expected a root configuration, found '{}'", doc.global.kind),
            ));
        }
        if doc.sets.is_empty() {
            return Err(ConfigError::new(
                ConfigErrorKind::Malformed,
                "root configuration must declare transformation sets",
            ));
        }
        let mut config = Self {
            parameters: HashMap::new(),
            groups: Vec::new(),
            available: HashMap::new(),
        };
        config.read_parameters(&doc.global);
        config.read_sets(&doc.sets, resolver)?;
        config.read_groups(&doc.groups)?;
        Ok(config)
    }

    fn apply_extension(
        &mut self,
        doc: &ConfigDocument,
        resolver: &dyn Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        self.read_parameters(&doc.global);
        if !doc.sets.is_empty() {
            self.available.clear();
            self.read_sets(&doc.sets, resolver)?;
        }
        if !doc.groups.is_empty() {
            self.groups.clear();
            self.read_groups(&doc.groups)?;
        }
        Ok(())
    }

    fn read_parameters(&mut self, global: &GlobalSection) {
        for parameter in &global.parameters {
            self.parameters
                .insert(parameter.key.clone(), parameter.value.clone());
        }
    }

    fn read_sets(
        &mut self,
        sets: &[String],
        resolver: &dyn Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        for set_name in sets {
            let text = resolver(set_name).ok_or_else(|| {
                ConfigError::new(
                    ConfigErrorKind::MissingSet,
                    format!("transformation set '{}' cannot be found", set_name),
                )
            })?;
            let set: SetDocument = serde_json::from_str(&text).map_err(|e| {
                ConfigError::new(
                    ConfigErrorKind::Malformed,
                    format!("transformation set '{}' is not well formatted: {}", set_name, e),
                )
            })?;
            for decl in &set.transformations {
                self.read_transformation(set_name, decl)?;
            }
        }
        Ok(())
    }

    fn read_transformation(
        &mut self,
        set_name: &str,
        decl: &TransformationDecl,
    ) -> Result<(), ConfigError> {
        let kind = match decl.kind.as_str() {
            "dependent" => GroupKind::Dependent,
            "independent" => GroupKind::Independent,
            other => {
                return Err(ConfigError::new(
                    ConfigErrorKind::Malformed,
                    format!("invalid group type '{}' for '{}'", other, decl.name),
                ))
            }
        };
        let trigger = match decl.trigger.as_str() {
            "directive" => TriggerKind::Directive,
            "translation_unit" => TriggerKind::TranslationUnit,
            other => {
                return Err(ConfigError::new(
                    ConfigErrorKind::Malformed,
                    format!("invalid trigger type '{}' for '{}'", other, decl.name),
                ))
            }
        };
        if decl.class.is_empty() {
            return Err(ConfigError::new(
                ConfigErrorKind::Malformed,
                format!("transformation '{}' declares no class", decl.name),
            ));
        }
        let class = TransformationClass::from_path(&decl.class).ok_or_else(|| {
            ConfigError::new(
                ConfigErrorKind::UnknownClass,
                format!("transformation class {} not available", decl.class),
            )
        })?;
        if trigger == TriggerKind::TranslationUnit && class.is_block() {
            return Err(ConfigError::new(
                ConfigErrorKind::InvalidTrigger,
                format!(
                    "translation unit trigger cannot be a block transformation ('{}')",
                    decl.name
                ),
            ));
        }
        if self.available.contains_key(&decl.name) {
            return Err(ConfigError::new(
                ConfigErrorKind::DuplicateGroup,
                format!("transformation '{}' has a name conflict", decl.name),
            ));
        }
        self.available.insert(
            decl.name.clone(),
            GroupConfiguration {
                set: set_name.to_string(),
                name: decl.name.clone(),
                kind,
                trigger,
                class_path: decl.class.clone(),
                class,
            },
        );
        Ok(())
    }

    fn read_groups(&mut self, groups: &[GroupRef]) -> Result<(), ConfigError> {
        for group in groups {
            let available = self.available.get(&group.name).ok_or_else(|| {
                ConfigError::new(
                    ConfigErrorKind::UnknownTransformation,
                    format!(
                        "no transformation found for '{}' in the declared sets",
                        group.name
                    ),
                )
            })?;
            if self.groups.iter().any(|g| g.name == group.name) {
                return Err(ConfigError::new(
                    ConfigErrorKind::DuplicateGroup,
                    format!("duplicated transformation group activation: {}", group.name),
                ));
            }
            self.groups.push(available.clone());
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.groups.is_empty() {
            return Err(ConfigError::new(
                ConfigErrorKind::Malformed,
                "configuration activates no transformation group",
            ));
        }
        Ok(())
    }

    /// Value of a global parameter.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(|v| v.as_str())
    }

    /// Set the user defined target, overriding the configuration file.
    pub fn set_user_target(&mut self, target: Option<&str>) {
        if let Some(target) = target {
            self.parameters
                .insert(DEFAULT_TARGET.to_string(), target.to_string());
        }
    }

    /// Set the user defined directive language, overriding the file.
    pub fn set_user_directive(&mut self, directive: Option<&str>) {
        if let Some(directive) = directive {
            self.parameters
                .insert(DEFAULT_DIRECTIVE.to_string(), directive.to_string());
        }
    }

    /// The maximum output column, 0 when unset.
    pub fn max_columns(&self) -> u32 {
        self.parameter(MAX_COLUMNS)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// Accelerator-family parameters.
    pub fn accelerator(&self) -> AcceleratorConfiguration {
        AcceleratorConfiguration::from_parameters(&self.parameters)
    }

    /// Activated groups, in application order.
    pub fn groups(&self) -> &[GroupConfiguration] {
        &self.groups
    }

    /// The activated group reacting to a directive kind, if any.
    pub fn group_for_directive(&self, kind: DirectiveKind) -> Option<&GroupConfiguration> {
        let name = match kind {
            DirectiveKind::End => return None,
            other => other.keyword(),
        };
        self.groups.iter().find(|g| g.name == name)
    }
}

fn parse_document(text: &str, engine_version: &str) -> Result<ConfigDocument, ConfigError> {
    let doc: ConfigDocument = serde_json::from_str(text).map_err(|e| {
        ConfigError::new(
            ConfigErrorKind::Malformed,
            format!("configuration is not well formatted: {}", e),
        )
    })?;
    version::check_version(&doc.version, engine_version)?;
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SET_DOC: &str = r#"{
        "transformations": [
            {"name": "loop-extract", "class": "looptran::engine::extraction::LoopExtraction",
             "type": "independent", "trigger": "directive"},
            {"name": "loop-fusion", "class": "looptran::engine::fusion::LoopFusion",
             "type": "dependent", "trigger": "directive"},
            {"name": "remove", "class": "looptran::engine::block::Remove",
             "type": "independent", "trigger": "directive"}
        ]
    }"#;

    fn root_doc(version: &str) -> String {
        format!(
            r#"{{
                "version": "{}",
                "global": {{
                    "type": "root",
                    "parameters": [
                        {{"key": "default_target", "value": "gpu"}},
                        {{"key": "acc_num_gangs", "value": "8"}}
                    ]
                }},
                "sets": ["standard"],
                "groups": [
                    {{"set": "standard", "name": "loop-extract"}},
                    {{"set": "standard", "name": "loop-fusion"}}
                ]
            }}"#,
            version
        )
    }

    fn resolver(set: &str) -> Option<String> {
        (set == "standard").then(|| SET_DOC.to_string())
    }

    #[test]
    fn test_builtin_groups() {
        let config = Configuration::builtin();
        let names: Vec<&str> = config.groups().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["loop-extract", "loop-fusion", "loop-interchange", "parallelize", "remove"]
        );
        assert!(config
            .group_for_directive(DirectiveKind::LoopFusion)
            .is_some());
        assert!(config.group_for_directive(DirectiveKind::End).is_none());
    }

    #[test]
    fn test_load_root_document() {
        let root = root_doc("0.9.0");
        let config =
            Configuration::from_documents(Some(&root), None, &resolver, "0.9.0").unwrap();
        assert_eq!(config.parameter(DEFAULT_TARGET), Some("gpu"));
        assert_eq!(config.accelerator().get("acc_num_gangs"), Some("8"));
        assert_eq!(config.groups().len(), 2);
        assert_eq!(config.groups()[0].class, TransformationClass::LoopExtraction);
        assert_eq!(config.groups()[1].kind, GroupKind::Dependent);
    }

    #[test]
    fn test_version_mismatch_is_fatal() {
        let root = root_doc("0.1.0");
        let err = Configuration::from_documents(Some(&root), None, &resolver, "0.9.0")
            .unwrap_err();
        assert_eq!(err.kind, ConfigErrorKind::VersionMismatch);
    }

    #[test]
    fn test_extension_overrides_parameters_and_groups() {
        let root = root_doc("0.9.0");
        let extension = r#"{
            "version": "0.9.0",
            "global": {
                "type": "extension",
                "parameters": [{"key": "default_target", "value": "cpu"}]
            },
            "groups": [{"set": "standard", "name": "loop-fusion"}]
        }"#;
        let config =
            Configuration::from_documents(Some(&root), Some(extension), &resolver, "0.9.0")
                .unwrap();
        assert_eq!(config.parameter(DEFAULT_TARGET), Some("cpu"));
        let names: Vec<&str> = config.groups().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["loop-fusion"]);
    }

    #[test]
    fn test_unknown_class_rejected() {
        let set = r#"{
            "transformations": [
                {"name": "mystery", "class": "looptran::engine::mystery::Mystery",
                 "type": "independent", "trigger": "directive"}
            ]
        }"#;
        let root = root_doc("0.9.0");
        let err = Configuration::from_documents(
            Some(&root),
            None,
            &|_| Some(set.to_string()),
            "0.9.0",
        )
        .unwrap_err();
        assert_eq!(err.kind, ConfigErrorKind::UnknownClass);
    }

    #[test]
    fn test_translation_unit_block_rejected() {
        let set = r#"{
            "transformations": [
                {"name": "remove", "class": "looptran::engine::block::Remove",
                 "type": "independent", "trigger": "translation_unit"}
            ]
        }"#;
        let root = r#"{
            "version": "0.9.0",
            "global": {"type": "root"},
            "sets": ["standard"],
            "groups": [{"set": "standard", "name": "remove"}]
        }"#;
        let err = Configuration::from_documents(
            Some(root),
            None,
            &|_| Some(set.to_string()),
            "0.9.0",
        )
        .unwrap_err();
        assert_eq!(err.kind, ConfigErrorKind::InvalidTrigger);
    }

    #[test]
    fn test_missing_set_rejected() {
        let root = root_doc("0.9.0");
        let err = Configuration::from_documents(Some(&root), None, &|_| None, "0.9.0")
            .unwrap_err();
        assert_eq!(err.kind, ConfigErrorKind::MissingSet);
    }

    #[test]
    fn test_duplicate_group_activation_rejected() {
        let root = r#"{
            "version": "0.9.0",
            "global": {"type": "root"},
            "sets": ["standard"],
            "groups": [
                {"set": "standard", "name": "loop-fusion"},
                {"set": "standard", "name": "loop-fusion"}
            ]
        }"#;
        let err = Configuration::from_documents(Some(root), None, &resolver, "0.9.0")
            .unwrap_err();
        assert_eq!(err.kind, ConfigErrorKind::DuplicateGroup);
    }

    #[test]
    fn test_unknown_group_name_rejected() {
        let root = r#"{
            "version": "0.9.0",
            "global": {"type": "root"},
            "sets": ["standard"],
            "groups": [{"set": "standard", "name": "loop-unroll"}]
        }"#;
        let err = Configuration::from_documents(Some(root), None, &resolver, "0.9.0")
            .unwrap_err();
        assert_eq!(err.kind, ConfigErrorKind::UnknownTransformation);
    }
}
