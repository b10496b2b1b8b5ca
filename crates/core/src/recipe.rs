//! Module recipes: declarative manifests of shell mutations.
//!
//! A recipe file is a YAML manifest naming the modules it requires, the
//! modules it conflicts with, and the shell operations its load performs.
//! An explicit `unload` section is optional: without one, unload replays
//! the `load` operations with the recorder in reverse-operation mode.
//!
//! Parsing a recipe has no side effects; mutation happens only when the
//! environment drives `load` or `unload` against a shell recorder.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::errors::{PreloadError, RecipeError, ShellError};
use crate::shell::{PathCheck, ShellState};

/// Operand of the additive path operations: the component value, the
/// variable it applies to (`PATH` when omitted) and the validation mode.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PathOp {
    pub value: String,
    #[serde(default = "default_path_var")]
    pub var: String,
    #[serde(default)]
    pub check: PathCheck,
}

/// Operand of `remove_path`. Removal takes no check mode; a removed
/// component need not exist on disk.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RemovePathOp {
    pub value: String,
    #[serde(default = "default_path_var")]
    pub var: String,
}

/// Operand of the additive compiler-flags operations. The optional `prefix`
/// is concatenated onto the value before storage (`prefix: "-I"` with
/// `value: /opt/x/include` stores `-I/opt/x/include`); the path check
/// applies to the raw value.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FlagOp {
    pub value: String,
    pub var: String,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub check: PathCheck,
}

/// Operand of `remove_flag`; like removal of a path component, it takes no
/// check mode.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RemoveFlagOp {
    pub value: String,
    pub var: String,
    #[serde(default)]
    pub prefix: Option<String>,
}

/// The operation vocabulary available to recipes, mirroring the shell
/// recorder capability surface one for one.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ShellOp {
    PrependPath(PathOp),
    AppendPath(PathOp),
    RemovePath(RemovePathOp),
    ResetPath { var: String },
    PrependFlag(FlagOp),
    AppendFlag(FlagOp),
    RemoveFlag(RemoveFlagOp),
    ResetFlag { var: String },
    Alias { name: String, command: String },
    RemoveAlias { name: String },
    ShellVariable { name: String, value: String },
    RemoveShellVariable { name: String },
    Env { name: String, value: String },
    RemoveEnv { name: String },
    Message(String),
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
struct Manifest {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    requires: Vec<String>,
    #[serde(default)]
    conflicts: Vec<String>,
    #[serde(default)]
    load: Vec<ShellOp>,
    #[serde(default)]
    unload: Option<Vec<ShellOp>>,
}

/// A named, parsed recipe.
#[derive(Clone, Debug)]
pub struct Recipe {
    name: String,
    manifest: Manifest,
}

impl Recipe {
    /// Read and parse a recipe file. Side-effect-free: this only constructs
    /// the recipe handle.
    pub fn from_path(name: &str, path: &Path) -> Result<Self, RecipeError> {
        let raw = fs::read_to_string(path).map_err(|source| RecipeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest = serde_yaml::from_str(&raw).map_err(|source| RecipeError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            name: name.to_string(),
            manifest,
        })
    }

    /// The recipe's fully-qualified module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.manifest.description.as_deref()
    }

    /// Validate preconditions against the loaded set and return the modules
    /// this recipe depends on. Mutates nothing.
    pub fn preload(&self, loaded: &BTreeSet<String>) -> Result<Vec<String>, PreloadError> {
        for conflict in &self.manifest.conflicts {
            if loaded.contains(conflict) {
                return Err(PreloadError::Conflict {
                    module: self.name.clone(),
                    conflict: conflict.clone(),
                });
            }
        }
        Ok(self.manifest.requires.clone())
    }

    /// Record this recipe's mutations against the shell.
    pub fn load(&self, shell: &mut ShellState) -> Result<(), ShellError> {
        for op in &self.manifest.load {
            apply(op, shell)?;
        }
        Ok(())
    }

    /// Record the inverse mutations: the explicit `unload` operations when
    /// the manifest has them, otherwise the `load` operations replayed in
    /// reverse-operation mode.
    pub fn unload(&self, shell: &mut ShellState) -> Result<(), ShellError> {
        match &self.manifest.unload {
            Some(ops) => {
                for op in ops {
                    apply(op, shell)?;
                }
                Ok(())
            }
            None => self.unload_by_reversal(shell),
        }
    }

    fn unload_by_reversal(&self, shell: &mut ShellState) -> Result<(), ShellError> {
        shell.set_reverse_operation(true);
        let result = self
            .manifest
            .load
            .iter()
            .try_for_each(|op| apply(op, shell));
        shell.set_reverse_operation(false);
        result
    }
}

fn apply(op: &ShellOp, shell: &mut ShellState) -> Result<(), ShellError> {
    match op {
        ShellOp::PrependPath(path) => shell.prepend_path(&path.var, &path.value, path.check),
        ShellOp::AppendPath(path) => shell.append_path(&path.var, &path.value, path.check),
        ShellOp::RemovePath(path) => shell.remove_path(&path.var, &path.value),
        ShellOp::ResetPath { var } => shell.reset_path(var),
        ShellOp::PrependFlag(flag) => {
            shell.prepend_flag(&flag.var, &flag.value, flag.prefix.as_deref(), flag.check)
        }
        ShellOp::AppendFlag(flag) => {
            shell.append_flag(&flag.var, &flag.value, flag.prefix.as_deref(), flag.check)
        }
        ShellOp::RemoveFlag(flag) => {
            shell.remove_flag(&flag.var, &flag.value, flag.prefix.as_deref())
        }
        ShellOp::ResetFlag { var } => shell.reset_flag(var),
        ShellOp::Alias { name, command } => shell.add_alias(name, command),
        ShellOp::RemoveAlias { name } => shell.remove_alias(name),
        ShellOp::ShellVariable { name, value } => shell.add_shell_variable(name, value),
        ShellOp::RemoveShellVariable { name } => shell.remove_shell_variable(name),
        ShellOp::Env { name, value } => shell.add_env(name, value),
        ShellOp::RemoveEnv { name } => shell.remove_env(name),
        ShellOp::Message(message) => shell.write(message),
    }
}

fn default_path_var() -> String {
    "PATH".to_string()
}
