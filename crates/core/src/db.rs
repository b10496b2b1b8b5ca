//! Module database: discovery and instantiation of recipes on the search
//! path.
//!
//! Module names are dotted paths (`a.b.c`) mapping bijectively onto recipe
//! files: segments become path components and the leaf gains the recipe
//! suffix, so `compilers.gcc` lives at `<root>/compilers/gcc.yaml`. Earlier
//! search roots shadow later ones.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::errors::RecipeError;
use crate::recipe::Recipe;

/// Colon-separated search path override. Entries are tilde-expanded.
pub const PYENV_PATH_VAR: &str = "PYENV_PATH";

/// Recipe file suffix; one suffix per deployment.
pub const RECIPE_SUFFIX: &str = "yaml";

const PATH_SEPARATOR: char = ':';

/// Discovers recipe files and instantiates recipes by name.
pub struct ModuleDatabase {
    search_path: Vec<PathBuf>,
    cache: HashMap<String, PathBuf>,
}

impl ModuleDatabase {
    /// Build the database from `PYENV_PATH`, falling back to the `modules`
    /// directory under the executable's install prefix.
    pub fn from_env() -> Self {
        let search_path = match env::var(PYENV_PATH_VAR) {
            Ok(raw) if !raw.trim().is_empty() => raw
                .split(PATH_SEPARATOR)
                .filter(|entry| !entry.is_empty())
                .map(|entry| PathBuf::from(shellexpand::tilde(entry).into_owned()))
                .collect(),
            _ => default_search_path(),
        };
        Self::with_search_path(search_path)
    }

    pub fn with_search_path(search_path: Vec<PathBuf>) -> Self {
        Self {
            search_path,
            cache: HashMap::new(),
        }
    }

    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    pub fn reset_cache(&mut self) {
        self.cache.clear();
    }

    /// Walk every search root (following symlinks) and fill the name cache.
    /// Existing cache entries are never overwritten, so earlier roots (and
    /// earlier calls) win. The optional predicate can veto a `(name, path)`
    /// pair before it is cached.
    pub fn populate(&mut self, filter: Option<&dyn Fn(&str, &Path) -> bool>) {
        let roots = self.search_path.clone();
        for root in &roots {
            for entry in WalkDir::new(root).follow_links(true) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        log::debug!("skipping unreadable entry under {}: {}", root.display(), err);
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }

                let file_name = entry.file_name().to_string_lossy();
                let Some(stem) = recipe_stem(&file_name) else {
                    continue;
                };
                if file_name.matches('.').count() > 1 {
                    eprintln!(
                        "Skipping {} because it has more than one . (period) in its filename",
                        entry.path().display()
                    );
                    continue;
                }
                if stem.is_empty() {
                    continue;
                }

                let Ok(relative) = entry.path().strip_prefix(root) else {
                    continue;
                };
                let mut segments = relative
                    .components()
                    .map(|component| component.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>();
                match segments.last_mut() {
                    Some(leaf) => *leaf = stem.to_string(),
                    None => continue,
                }
                let name = segments.join(".");

                if self.cache.contains_key(&name) {
                    continue;
                }
                if let Some(filter) = filter {
                    if !filter(&name, entry.path()) {
                        continue;
                    }
                }
                self.cache.insert(name, entry.path().to_path_buf());
            }
        }
    }

    /// Resolve a module name to its recipe file: cache first, then a probe
    /// of each root at the path derived from the dotted name. Hits are
    /// cached.
    pub fn find_module(&mut self, name: &str) -> Option<PathBuf> {
        if let Some(path) = self.cache.get(name) {
            return Some(path.clone());
        }

        let relative = relative_recipe_path(name);
        let found = self
            .search_path
            .iter()
            .map(|root| root.join(&relative))
            .find(|candidate| candidate.exists());
        if let Some(path) = &found {
            self.cache.insert(name.to_string(), path.clone());
        }
        found
    }

    /// Parse the named recipe. Side-effect-free with respect to the shell
    /// and the environment: this only constructs the recipe handle.
    pub fn load_module(&mut self, name: &str) -> Result<Recipe, RecipeError> {
        let path = self
            .find_module(name)
            .ok_or_else(|| RecipeError::NotFound(name.to_string()))?;
        Recipe::from_path(name, &path)
    }

    /// All known module names, sorted. With `check_syntax`, the cache is
    /// rebuilt keeping only names whose recipe files parse.
    pub fn get_all_modules(&mut self, check_syntax: bool) -> Vec<String> {
        if check_syntax {
            self.reset_cache();
            let parses = |name: &str, path: &Path| Recipe::from_path(name, path).is_ok();
            self.populate(Some(&parses));
        } else {
            self.populate(None);
        }

        let mut names = self.cache.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }
}

/// Strip the recipe suffix (case-insensitively) from a file name.
fn recipe_stem(file_name: &str) -> Option<&str> {
    let suffix_len = RECIPE_SUFFIX.len() + 1;
    let cut = file_name.len().checked_sub(suffix_len)?;
    if !file_name.is_char_boundary(cut) {
        return None;
    }
    let (stem, suffix) = file_name.split_at(cut);
    let dotted = format!(".{}", RECIPE_SUFFIX);
    suffix.eq_ignore_ascii_case(&dotted).then_some(stem)
}

fn relative_recipe_path(name: &str) -> PathBuf {
    let mut path = PathBuf::new();
    for segment in name.split('.') {
        path.push(segment);
    }
    path.set_extension(RECIPE_SUFFIX);
    path
}

fn default_search_path() -> Vec<PathBuf> {
    let Ok(exe) = env::current_exe() else {
        return Vec::new();
    };
    // <prefix>/bin/pyenv -> <prefix>/modules
    match exe.parent().and_then(Path::parent) {
        Some(prefix) => vec![prefix.join("modules")],
        None => Vec::new(),
    }
}
