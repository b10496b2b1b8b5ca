//! Shell mutation recorder and command emission.
//!
//! Recipes never touch the parent shell directly. They record intended
//! mutations (search paths, compiler flags, aliases, shell and environment
//! variables, messages) against a [`ShellState`], and the dispatcher emits
//! the recorded state once, at the end of the invocation, as a command
//! script in the selected dialect. The parent shell evaluates that script.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::errors::ShellError;

const PATH_SEPARATOR: char = ':';

/// Target shell dialect for command emission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Bash,
    Tcsh,
    Elisp,
}

impl Dialect {
    /// Convert the dialect to its canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bash => "bash",
            Self::Tcsh => "tcsh",
            Self::Elisp => "elisp",
        }
    }

    fn set_env(self, name: &str, value: &str) -> String {
        match self {
            Self::Bash => format!("export {}={}", name, shell_quote(value)),
            Self::Tcsh => format!("setenv {} {}", name, shell_quote(value)),
            Self::Elisp => format!("(setenv {} {})", elisp_quote(name), elisp_quote(value)),
        }
    }

    fn unset_env(self, name: &str) -> String {
        match self {
            Self::Bash => format!("unset {}", name),
            Self::Tcsh => format!("unsetenv {}", name),
            Self::Elisp => format!("(setenv {})", elisp_quote(name)),
        }
    }

    fn set_shell_variable(self, name: &str, value: &str) -> Option<String> {
        match self {
            Self::Bash => Some(format!("{}={}", name, shell_quote(value))),
            Self::Tcsh => Some(format!("set {}={}", name, shell_quote(value))),
            Self::Elisp => None,
        }
    }

    fn unset_shell_variable(self, name: &str) -> Option<String> {
        match self {
            Self::Bash | Self::Tcsh => Some(format!("unset {}", name)),
            Self::Elisp => None,
        }
    }

    fn set_alias(self, name: &str, command: &str) -> Option<String> {
        match self {
            Self::Bash => Some(format!("alias {}={}", name, shell_quote(command))),
            Self::Tcsh => Some(format!("alias {} {}", name, shell_quote(command))),
            Self::Elisp => None,
        }
    }

    fn unset_alias(self, name: &str) -> Option<String> {
        match self {
            Self::Bash | Self::Tcsh => Some(format!("unalias {}", name)),
            Self::Elisp => None,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bash" => Ok(Self::Bash),
            "tcsh" => Ok(Self::Tcsh),
            "elisp" => Ok(Self::Elisp),
            other => Err(format!("invalid shell dialect: {}", other)),
        }
    }
}

/// Validation applied to path-like values before they are recorded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PathCheck {
    /// Record the value unconditionally.
    #[default]
    None,
    /// Silently skip the operation unless the value is an executable
    /// directory.
    Validate,
    /// Fail the operation unless the value is an executable directory.
    Enforce,
}

impl PathCheck {
    /// Convert the check mode to its canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Validate => "validate",
            Self::Enforce => "enforce",
        }
    }
}

impl FromStr for PathCheck {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "validate" => Ok(Self::Validate),
            "enforce" => Ok(Self::Enforce),
            other => Err(format!(
                "invalid path check: {} (expected none, validate or enforce)",
                other
            )),
        }
    }
}

impl<'de> Deserialize<'de> for PathCheck {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The mutable portion of the recorder, snapshotted by `push`/`pop`.
#[derive(Clone, Debug, Default)]
struct Mutations {
    paths: BTreeMap<String, Vec<String>>,
    flags: BTreeMap<String, Vec<String>>,
    aliases: BTreeMap<String, Option<String>>,
    shell_variables: BTreeMap<String, Option<String>>,
    environment_variables: BTreeMap<String, Option<String>>,
    messages: Vec<String>,
}

/// Accumulates intended shell mutations for one invocation.
pub struct ShellState {
    dialect: Dialect,
    state: Mutations,
    original_paths: BTreeMap<String, Vec<String>>,
    original_flags: BTreeMap<String, Vec<String>>,
    reverse_op: bool,
    snapshots: Vec<Mutations>,
}

impl ShellState {
    /// Build a recorder from the ambient process environment.
    pub fn capture(dialect: Dialect) -> Self {
        Self::from_snapshot(dialect, std::env::vars())
    }

    /// Build a recorder from an explicit environment snapshot. Variables
    /// ending in `PATH` seed the path map (split on `:`); variables ending
    /// in `FLAGS` seed the compiler-flags map (split on whitespace).
    pub fn from_snapshot(
        dialect: Dialect,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let mut paths = BTreeMap::new();
        let mut flags = BTreeMap::new();
        for (name, value) in vars {
            if name.ends_with("PATH") {
                let components = value
                    .split(PATH_SEPARATOR)
                    .map(str::to_string)
                    .collect::<Vec<_>>();
                paths.insert(name, components);
            } else if name.ends_with("FLAGS") {
                let components = value
                    .split_whitespace()
                    .map(str::to_string)
                    .collect::<Vec<_>>();
                flags.insert(name, components);
            }
        }

        Self {
            dialect,
            state: Mutations {
                paths: paths.clone(),
                flags: flags.clone(),
                ..Mutations::default()
            },
            original_paths: paths,
            original_flags: flags,
            reverse_op: false,
            snapshots: Vec::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Toggle reverse-operation mode. While set, additive operations record
    /// their inverse and non-invertible operations fail.
    pub fn set_reverse_operation(&mut self, reverse: bool) {
        self.reverse_op = reverse;
    }

    pub fn reverse_operation(&self) -> bool {
        self.reverse_op
    }

    /// Snapshot the recorded state. A later `pop` discards everything
    /// recorded since; `commit` keeps it.
    pub fn push(&mut self) {
        self.snapshots.push(self.state.clone());
    }

    /// Restore the most recent snapshot, discarding mutations recorded
    /// since the matching `push`. Without a snapshot this is a no-op.
    pub fn pop(&mut self) {
        if let Some(snapshot) = self.snapshots.pop() {
            self.state = snapshot;
        }
    }

    /// Drop the most recent snapshot, keeping the mutations recorded since.
    pub fn commit(&mut self) {
        self.snapshots.pop();
    }

    /// Insert a component at the head of a path variable.
    pub fn prepend_path(
        &mut self,
        var: &str,
        value: &str,
        check: PathCheck,
    ) -> Result<(), ShellError> {
        if self.reverse_op {
            self.take_out(Section::Paths, var, value);
            return Ok(());
        }
        if self.check_path(var, value, check)? {
            self.entry(Section::Paths, var).insert(0, value.to_string());
        }
        Ok(())
    }

    /// Append a component to a path variable.
    pub fn append_path(
        &mut self,
        var: &str,
        value: &str,
        check: PathCheck,
    ) -> Result<(), ShellError> {
        if self.reverse_op {
            self.take_out(Section::Paths, var, value);
            return Ok(());
        }
        if self.check_path(var, value, check)? {
            self.entry(Section::Paths, var).push(value.to_string());
        }
        Ok(())
    }

    /// Remove the first matching component of a path variable; missing
    /// components are a no-op.
    pub fn remove_path(&mut self, var: &str, value: &str) -> Result<(), ShellError> {
        self.guard_reversible("remove_path")?;
        self.take_out(Section::Paths, var, value);
        Ok(())
    }

    /// Clear a path variable.
    pub fn reset_path(&mut self, var: &str) -> Result<(), ShellError> {
        self.guard_reversible("reset_path")?;
        self.entry(Section::Paths, var).clear();
        Ok(())
    }

    /// Insert a flag at the head of a compiler-flags variable. The optional
    /// `prefix` is concatenated onto the value before storage; the path
    /// check applies to the raw value.
    pub fn prepend_flag(
        &mut self,
        var: &str,
        value: &str,
        prefix: Option<&str>,
        check: PathCheck,
    ) -> Result<(), ShellError> {
        if self.reverse_op {
            let flag = prefixed(prefix, value);
            self.take_out(Section::Flags, var, &flag);
            return Ok(());
        }
        if self.check_path(var, value, check)? {
            let flag = prefixed(prefix, value);
            self.entry(Section::Flags, var).insert(0, flag);
        }
        Ok(())
    }

    /// Append a flag to a compiler-flags variable.
    pub fn append_flag(
        &mut self,
        var: &str,
        value: &str,
        prefix: Option<&str>,
        check: PathCheck,
    ) -> Result<(), ShellError> {
        if self.reverse_op {
            let flag = prefixed(prefix, value);
            self.take_out(Section::Flags, var, &flag);
            return Ok(());
        }
        if self.check_path(var, value, check)? {
            let flag = prefixed(prefix, value);
            self.entry(Section::Flags, var).push(flag);
        }
        Ok(())
    }

    /// Remove the first matching flag; missing flags are a no-op.
    pub fn remove_flag(
        &mut self,
        var: &str,
        value: &str,
        prefix: Option<&str>,
    ) -> Result<(), ShellError> {
        self.guard_reversible("remove_flag")?;
        let flag = prefixed(prefix, value);
        self.take_out(Section::Flags, var, &flag);
        Ok(())
    }

    /// Clear a compiler-flags variable.
    pub fn reset_flag(&mut self, var: &str) -> Result<(), ShellError> {
        self.guard_reversible("reset_flag")?;
        self.entry(Section::Flags, var).clear();
        Ok(())
    }

    /// Define an alias.
    pub fn add_alias(&mut self, name: &str, command: &str) -> Result<(), ShellError> {
        if self.reverse_op {
            self.state.aliases.insert(name.to_string(), None);
        } else {
            self.state
                .aliases
                .insert(name.to_string(), Some(command.to_string()));
        }
        Ok(())
    }

    /// Remove an alias: records an unset sentinel so the emission unaliases
    /// it in the parent shell.
    pub fn remove_alias(&mut self, name: &str) -> Result<(), ShellError> {
        self.guard_reversible("remove_alias")?;
        self.state.aliases.insert(name.to_string(), None);
        Ok(())
    }

    /// Set a shell-local (not exported) variable.
    pub fn add_shell_variable(&mut self, name: &str, value: &str) -> Result<(), ShellError> {
        if self.reverse_op {
            self.state.shell_variables.insert(name.to_string(), None);
        } else {
            self.state
                .shell_variables
                .insert(name.to_string(), Some(value.to_string()));
        }
        Ok(())
    }

    /// Unset a shell-local variable.
    pub fn remove_shell_variable(&mut self, name: &str) -> Result<(), ShellError> {
        self.guard_reversible("remove_shell_variable")?;
        self.state.shell_variables.insert(name.to_string(), None);
        Ok(())
    }

    /// Set an exported environment variable.
    pub fn add_env(&mut self, name: &str, value: &str) -> Result<(), ShellError> {
        if self.reverse_op {
            self.state
                .environment_variables
                .insert(name.to_string(), None);
        } else {
            self.state
                .environment_variables
                .insert(name.to_string(), Some(value.to_string()));
        }
        Ok(())
    }

    /// Unset an exported environment variable.
    pub fn remove_env(&mut self, name: &str) -> Result<(), ShellError> {
        self.guard_reversible("remove_env")?;
        self.state
            .environment_variables
            .insert(name.to_string(), None);
        Ok(())
    }

    /// Queue a user-visible message. Messages may span multiple lines.
    pub fn write(&mut self, message: &str) -> Result<(), ShellError> {
        self.guard_reversible("write")?;
        self.state.messages.push(message.to_string());
        Ok(())
    }

    /// Emit the recorded mutations as a command script in the recorder's
    /// dialect. Section order is fixed: paths, flags, aliases, shell
    /// variables, environment variables, messages. Path and flag variables
    /// whose final value equals the startup snapshot are suppressed.
    pub fn dump_state(&self, raw_msg_dump: bool) -> Vec<String> {
        let mut cmds = Vec::new();

        for (var, components) in &self.state.paths {
            if self.original_paths.get(var) == Some(components) {
                continue;
            }
            let joined = components.join(&PATH_SEPARATOR.to_string());
            cmds.push(self.dialect.set_env(var, &joined));
        }

        for (var, components) in &self.state.flags {
            if self.original_flags.get(var) == Some(components) {
                continue;
            }
            let joined = components.join(" ");
            cmds.push(self.dialect.set_env(var, &joined));
        }

        for (name, value) in &self.state.aliases {
            let cmd = match value {
                Some(command) => self.dialect.set_alias(name, command),
                None => self.dialect.unset_alias(name),
            };
            if let Some(cmd) = cmd {
                cmds.push(cmd);
            }
        }

        for (name, value) in &self.state.shell_variables {
            let cmd = match value {
                Some(value) => self.dialect.set_shell_variable(name, value),
                None => self.dialect.unset_shell_variable(name),
            };
            if let Some(cmd) = cmd {
                cmds.push(cmd);
            }
        }

        for (name, value) in &self.state.environment_variables {
            let cmd = match value {
                Some(value) => self.dialect.set_env(name, value),
                None => self.dialect.unset_env(name),
            };
            cmds.push(cmd);
        }

        cmds.extend(self.dump_messages(raw_msg_dump));
        cmds
    }

    fn dump_messages(&self, raw_msg_dump: bool) -> Vec<String> {
        let lines = self
            .state
            .messages
            .iter()
            .flat_map(|message| message.lines())
            .collect::<Vec<_>>();
        if lines.is_empty() {
            return Vec::new();
        }

        match self.dialect {
            Dialect::Bash | Dialect::Tcsh => lines
                .iter()
                .map(|line| format!("echo {}", shell_quote(line)))
                .collect(),
            Dialect::Elisp if raw_msg_dump => {
                lines.iter().map(|line| line.to_string()).collect()
            }
            Dialect::Elisp => {
                vec![format!("(message {})", elisp_quote(&lines.join("\n")))]
            }
        }
    }

    fn guard_reversible(&self, operation: &'static str) -> Result<(), ShellError> {
        if self.reverse_op {
            return Err(ShellError::ReverseOperation(operation));
        }
        Ok(())
    }

    fn entry(&mut self, section: Section, var: &str) -> &mut Vec<String> {
        let map = match section {
            Section::Paths => &mut self.state.paths,
            Section::Flags => &mut self.state.flags,
        };
        map.entry(var.to_string()).or_default()
    }

    fn take_out(&mut self, section: Section, var: &str, value: &str) {
        let map = match section {
            Section::Paths => &mut self.state.paths,
            Section::Flags => &mut self.state.flags,
        };
        if let Some(components) = map.get_mut(var) {
            if let Some(position) = components.iter().position(|component| component == value) {
                components.remove(position);
            }
        }
    }

    /// Returns whether the operation should proceed. Checks are skipped in
    /// reverse mode: the forward operation may already have been skipped,
    /// and removing an absent component is a no-op.
    fn check_path(&self, var: &str, value: &str, check: PathCheck) -> Result<bool, ShellError> {
        match check {
            PathCheck::None => Ok(true),
            PathCheck::Validate => {
                if is_executable_dir(Path::new(value)) {
                    Ok(true)
                } else {
                    log::debug!("skipping {} for {}: not an executable directory", value, var);
                    Ok(false)
                }
            }
            PathCheck::Enforce => {
                if is_executable_dir(Path::new(value)) {
                    Ok(true)
                } else {
                    Err(ShellError::PathCheck(value.to_string()))
                }
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Section {
    Paths,
    Flags,
}

fn prefixed(prefix: Option<&str>, value: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}{}", prefix, value),
        None => value.to_string(),
    }
}

fn is_executable_dir(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(path) {
            Ok(metadata) => metadata.is_dir() && (metadata.permissions().mode() & 0o111 != 0),
            Err(_) => false,
        }
    }

    #[cfg(not(unix))]
    {
        path.is_dir()
    }
}

fn shell_quote(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('\'');
    for ch in raw.chars() {
        if ch == '\'' {
            out.push_str("'\"'\"'");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

fn elisp_quote(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for ch in raw.chars() {
        match ch {
            '"' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bash_shell(vars: &[(&str, &str)]) -> ShellState {
        ShellState::from_snapshot(
            Dialect::Bash,
            vars.iter()
                .map(|(name, value)| (name.to_string(), value.to_string())),
        )
    }

    #[test]
    fn captures_paths_and_flags_from_snapshot() {
        let shell = bash_shell(&[
            ("PATH", "/usr/bin:/bin"),
            ("CPPFLAGS", "-I/usr/include -DNDEBUG"),
            ("HOME", "/home/u"),
        ]);
        assert_eq!(
            shell.original_paths.get("PATH"),
            Some(&vec!["/usr/bin".to_string(), "/bin".to_string()])
        );
        assert_eq!(
            shell.original_flags.get("CPPFLAGS"),
            Some(&vec!["-I/usr/include".to_string(), "-DNDEBUG".to_string()])
        );
        assert!(!shell.original_paths.contains_key("HOME"));
    }

    #[test]
    fn unchanged_state_emits_nothing() {
        let shell = bash_shell(&[("PATH", "/usr/bin:/bin"), ("LDFLAGS", "-L/usr/lib")]);
        assert!(shell.dump_state(false).is_empty());
    }

    #[test]
    fn prepend_path_emits_bash_export() {
        let mut shell = bash_shell(&[("PATH", "/usr/bin:/bin")]);
        shell
            .prepend_path("PATH", "/opt/foo/bin", PathCheck::None)
            .unwrap();
        assert_eq!(
            shell.dump_state(false),
            vec!["export PATH='/opt/foo/bin:/usr/bin:/bin'".to_string()]
        );
    }

    #[test]
    fn remove_then_matching_prepend_suppresses_again() {
        let mut shell = bash_shell(&[("PATH", "/usr/bin:/bin")]);
        shell.remove_path("PATH", "/usr/bin").unwrap();
        shell
            .prepend_path("PATH", "/usr/bin", PathCheck::None)
            .unwrap();
        assert!(shell.dump_state(false).is_empty());
    }

    #[test]
    fn append_and_remove_on_unknown_vars() {
        let mut shell = bash_shell(&[]);
        shell.remove_path("MANPATH", "/usr/share/man").unwrap();
        assert!(shell.dump_state(false).is_empty());

        shell
            .append_path("MANPATH", "/opt/foo/man", PathCheck::None)
            .unwrap();
        assert_eq!(
            shell.dump_state(false),
            vec!["export MANPATH='/opt/foo/man'".to_string()]
        );
    }

    #[test]
    fn flags_join_with_spaces_and_honour_prefix() {
        let mut shell = bash_shell(&[("CPPFLAGS", "-DNDEBUG")]);
        shell
            .append_flag("CPPFLAGS", "/opt/foo/include", Some("-I"), PathCheck::None)
            .unwrap();
        assert_eq!(
            shell.dump_state(false),
            vec!["export CPPFLAGS='-DNDEBUG -I/opt/foo/include'".to_string()]
        );

        shell
            .remove_flag("CPPFLAGS", "/opt/foo/include", Some("-I"))
            .unwrap();
        assert!(shell.dump_state(false).is_empty());
    }

    #[test]
    fn validate_check_skips_missing_directory() {
        let mut shell = bash_shell(&[("PATH", "/usr/bin")]);
        shell
            .prepend_path("PATH", "/nonexistent/bin", PathCheck::Validate)
            .unwrap();
        assert!(shell.dump_state(false).is_empty());
    }

    #[test]
    fn validate_check_accepts_real_directory() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().to_string_lossy().into_owned();
        let mut shell = bash_shell(&[("PATH", "/usr/bin")]);
        shell.prepend_path("PATH", &dir, PathCheck::Validate).unwrap();
        assert_eq!(
            shell.dump_state(false),
            vec![format!("export PATH='{}:/usr/bin'", dir)]
        );
    }

    #[test]
    fn enforce_check_fails_on_missing_directory() {
        let mut shell = bash_shell(&[("PATH", "/usr/bin")]);
        let err = shell
            .prepend_path("PATH", "/nonexistent/bin", PathCheck::Enforce)
            .unwrap_err();
        assert!(matches!(err, ShellError::PathCheck(_)));
    }

    #[test]
    fn section_order_is_paths_flags_aliases_vars_env_messages() {
        let mut shell = bash_shell(&[("PATH", "/usr/bin")]);
        shell.write("hello").unwrap();
        shell.add_env("FOO_HOME", "/opt/foo").unwrap();
        shell.add_shell_variable("FOO_MODE", "fast").unwrap();
        shell.add_alias("foo", "foo --color").unwrap();
        shell
            .append_flag("CPPFLAGS", "-DFOO", None, PathCheck::None)
            .unwrap();
        shell
            .prepend_path("PATH", "/opt/foo/bin", PathCheck::None)
            .unwrap();

        assert_eq!(
            shell.dump_state(false),
            vec![
                "export PATH='/opt/foo/bin:/usr/bin'".to_string(),
                "export CPPFLAGS='-DFOO'".to_string(),
                "alias foo='foo --color'".to_string(),
                "FOO_MODE='fast'".to_string(),
                "export FOO_HOME='/opt/foo'".to_string(),
                "echo 'hello'".to_string(),
            ]
        );
    }

    #[test]
    fn tcsh_emission_matches_dialect_table() {
        let mut shell = ShellState::from_snapshot(Dialect::Tcsh, std::iter::empty::<(String, String)>());
        shell.add_env("K", "V").unwrap();
        shell.remove_env("GONE").unwrap();
        shell.add_shell_variable("S", "W").unwrap();
        shell.remove_shell_variable("T").unwrap();
        shell.add_alias("a", "b c").unwrap();
        shell.remove_alias("z").unwrap();
        shell.write("one\ntwo").unwrap();

        assert_eq!(
            shell.dump_state(false),
            vec![
                "alias a 'b c'".to_string(),
                "unalias z".to_string(),
                "set S='W'".to_string(),
                "unset T".to_string(),
                "unsetenv GONE".to_string(),
                "setenv K 'V'".to_string(),
                "echo 'one'".to_string(),
                "echo 'two'".to_string(),
            ]
        );
    }

    #[test]
    fn elisp_emission_skips_aliases_and_joins_messages() {
        let mut shell = ShellState::from_snapshot(Dialect::Elisp, std::iter::empty::<(String, String)>());
        shell.add_alias("a", "b").unwrap();
        shell.add_shell_variable("S", "W").unwrap();
        shell.add_env("K", "V").unwrap();
        shell.remove_env("GONE").unwrap();
        shell.write("one").unwrap();
        shell.write("two").unwrap();

        assert_eq!(
            shell.dump_state(false),
            vec![
                "(setenv \"GONE\")".to_string(),
                "(setenv \"K\" \"V\")".to_string(),
                "(message \"one\\ntwo\")".to_string(),
            ]
        );
    }

    #[test]
    fn elisp_raw_msg_dump_emits_bare_lines() {
        let mut shell = ShellState::from_snapshot(Dialect::Elisp, std::iter::empty::<(String, String)>());
        shell.write("one\ntwo").unwrap();
        assert_eq!(
            shell.dump_state(true),
            vec!["one".to_string(), "two".to_string()]
        );
    }

    #[test]
    fn quoting_escapes_embedded_single_quotes() {
        let mut shell = bash_shell(&[]);
        shell.write("it's here").unwrap();
        assert_eq!(
            shell.dump_state(false),
            vec!["echo 'it'\"'\"'s here'".to_string()]
        );
    }

    #[test]
    fn reverse_mode_inverts_additive_operations() {
        let mut shell = bash_shell(&[("PATH", "/opt/foo/bin:/usr/bin")]);
        shell.set_reverse_operation(true);
        shell
            .prepend_path("PATH", "/opt/foo/bin", PathCheck::None)
            .unwrap();
        shell.add_alias("foo", "foo --color").unwrap();
        shell.add_env("FOO_HOME", "/opt/foo").unwrap();
        shell.set_reverse_operation(false);

        assert_eq!(
            shell.dump_state(false),
            vec![
                "export PATH='/usr/bin'".to_string(),
                "unalias foo".to_string(),
                "unset FOO_HOME".to_string(),
            ]
        );
    }

    #[test]
    fn reverse_mode_rejects_non_invertible_operations() {
        let mut shell = bash_shell(&[("PATH", "/usr/bin")]);
        shell.set_reverse_operation(true);
        assert!(matches!(
            shell.remove_path("PATH", "/usr/bin"),
            Err(ShellError::ReverseOperation("remove_path"))
        ));
        assert!(matches!(
            shell.reset_flag("CPPFLAGS"),
            Err(ShellError::ReverseOperation("reset_flag"))
        ));
        assert!(matches!(
            shell.write("nope"),
            Err(ShellError::ReverseOperation("write"))
        ));
        assert!(matches!(
            shell.remove_env("K"),
            Err(ShellError::ReverseOperation("remove_env"))
        ));
    }

    #[test]
    fn reversing_a_load_restores_the_original_state() {
        let mut shell = bash_shell(&[("PATH", "/usr/bin"), ("CPPFLAGS", "-DNDEBUG")]);

        let forward = |shell: &mut ShellState| -> Result<(), ShellError> {
            shell.prepend_path("PATH", "/opt/foo/bin", PathCheck::None)?;
            shell.append_flag("CPPFLAGS", "/opt/foo/include", Some("-I"), PathCheck::None)?;
            shell.add_alias("foo", "foo --color")?;
            shell.add_env("FOO_HOME", "/opt/foo")
        };

        forward(&mut shell).unwrap();
        shell.set_reverse_operation(true);
        forward(&mut shell).unwrap();
        shell.set_reverse_operation(false);

        // Paths and flags are back to their originals; the alias and env
        // var carry unset sentinels, which is the inverse mutation.
        assert_eq!(
            shell.dump_state(false),
            vec!["unalias foo".to_string(), "unset FOO_HOME".to_string()]
        );
    }

    #[test]
    fn push_pop_discards_mutations_and_commit_keeps_them() {
        let mut shell = bash_shell(&[("PATH", "/usr/bin")]);

        shell.push();
        shell
            .prepend_path("PATH", "/opt/rollback/bin", PathCheck::None)
            .unwrap();
        shell.write("rolled back").unwrap();
        shell.pop();
        assert!(shell.dump_state(false).is_empty());

        shell.push();
        shell
            .prepend_path("PATH", "/opt/kept/bin", PathCheck::None)
            .unwrap();
        shell.commit();
        assert_eq!(
            shell.dump_state(false),
            vec!["export PATH='/opt/kept/bin:/usr/bin'".to_string()]
        );
    }

    #[test]
    fn parses_dialect_and_path_check_strings() {
        assert_eq!("bash".parse::<Dialect>().unwrap(), Dialect::Bash);
        assert_eq!("TCSH".parse::<Dialect>().unwrap(), Dialect::Tcsh);
        assert!("fish".parse::<Dialect>().is_err());

        assert_eq!("validate".parse::<PathCheck>().unwrap(), PathCheck::Validate);
        assert_eq!("Enforce".parse::<PathCheck>().unwrap(), PathCheck::Enforce);
        assert_eq!(PathCheck::default(), PathCheck::None);
        assert!("perhaps".parse::<PathCheck>().is_err());
    }
}
