//! The environment state machine: the loaded-module set and its dependency
//! graph, restored from the persistence slots at construction and written
//! back through the shell recorder at shutdown.
//!
//! The dependency map points from a module to the modules that depend on
//! it, so unloading is refused while dependants remain. Load recursion is
//! guarded by an explicit frontier set, turning dependency cycles into
//! deterministic preload failures instead of unbounded recursion.

use std::collections::{BTreeMap, BTreeSet};
use std::env;

use anyhow::{Context, Result};

use crate::db::ModuleDatabase;
use crate::errors::{LoadError, PreloadError, SwapError, UnloadError};
use crate::recipe::Recipe;
use crate::shell::ShellState;
use crate::state::{self, PersistedState, DEFAULT_CHUNK_SIZE};

/// The loaded-module set and dependency graph for one invocation.
pub struct Environment {
    loaded: BTreeSet<String>,
    dependants: BTreeMap<String, BTreeSet<String>>,
    loading: BTreeSet<String>,
    cleanup_range: usize,
    dirty: bool,
    ready: bool,
}

impl Environment {
    /// Restore the persisted state through `lookup`. A decode failure is
    /// non-fatal: one notice on stderr, an empty state, and no cleanup of
    /// the unreadable slots.
    pub fn restore<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let (payload, slots) = state::read_slots(lookup);
        if slots == 0 {
            return Self::empty();
        }

        match PersistedState::decode(&payload) {
            Ok(persisted) => Self {
                loaded: persisted.loaded,
                dependants: persisted.dependants,
                loading: BTreeSet::new(),
                cleanup_range: slots,
                dirty: false,
                ready: true,
            },
            Err(err) => {
                log::debug!("persisted state decode failed: {}", err);
                eprintln!("Unable to decode prior environment; discarding.");
                Self::empty()
            }
        }
    }

    /// Restore from the ambient process environment.
    pub fn from_process_env() -> Self {
        Self::restore(|name| env::var(name).ok())
    }

    fn empty() -> Self {
        Self {
            loaded: BTreeSet::new(),
            dependants: BTreeMap::new(),
            loading: BTreeSet::new(),
            cleanup_range: 0,
            dirty: false,
            ready: true,
        }
    }

    pub fn loaded_modules(&self) -> &BTreeSet<String> {
        &self.loaded
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains(name)
    }

    pub fn dependants_of(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.dependants.get(name)
    }

    /// Whether an unload of `name` would be accepted right now.
    pub fn okay_to_unload(&self, name: &str) -> bool {
        self.is_loaded(name)
            && self
                .dependants
                .get(name)
                .map_or(true, |dependants| dependants.is_empty())
    }

    /// Load `name`, recursively loading its declared dependencies first.
    /// Records a dependency edge from each dependency to `name`.
    pub fn load_module_by_name(
        &mut self,
        db: &mut ModuleDatabase,
        shell: &mut ShellState,
        name: &str,
        force: bool,
    ) -> Result<(), LoadError> {
        debug_assert!(self.ready);

        if self.loading.contains(name) {
            return Err(PreloadError::Cycle(name.to_string()).into());
        }
        if self.loaded.contains(name) && !force {
            return Err(LoadError::AlreadyLoaded(name.to_string()));
        }

        let recipe = db.load_module(name)?;

        self.loading.insert(name.to_string());
        let result = self.run_load(db, shell, &recipe);
        self.loading.remove(name);
        result
    }

    fn run_load(
        &mut self,
        db: &mut ModuleDatabase,
        shell: &mut ShellState,
        recipe: &Recipe,
    ) -> Result<(), LoadError> {
        let dependencies = recipe.preload(&self.loaded)?;

        for dependency in &dependencies {
            if !self.loaded.contains(dependency) {
                self.load_module_by_name(db, shell, dependency, false)?;
            }
        }

        recipe.load(shell).map_err(|source| LoadError::Shell {
            module: recipe.name().to_string(),
            source,
        })?;

        self.loaded.insert(recipe.name().to_string());
        for dependency in dependencies {
            self.dependants
                .entry(dependency)
                .or_default()
                .insert(recipe.name().to_string());
        }
        self.dirty = true;
        Ok(())
    }

    /// Unload `name`, refusing while other loaded modules depend on it.
    pub fn unload_module_by_name(
        &mut self,
        db: &mut ModuleDatabase,
        shell: &mut ShellState,
        name: &str,
    ) -> Result<(), UnloadError> {
        debug_assert!(self.ready);

        if !self.loaded.contains(name) {
            return Err(UnloadError::NotLoaded(name.to_string()));
        }
        if let Some(dependants) = self.dependants.get(name) {
            if !dependants.is_empty() {
                let listed = dependants.iter().cloned().collect::<Vec<_>>().join(", ");
                return Err(UnloadError::StillNeeded {
                    module: name.to_string(),
                    dependants: listed,
                });
            }
        }

        let recipe = db.load_module(name)?;
        recipe.unload(shell).map_err(|source| UnloadError::Shell {
            module: name.to_string(),
            source,
        })?;

        self.loaded.remove(name);
        self.dependants.remove(name);

        // Collect first: deleting while iterating the map is how the graph
        // gets corrupted.
        let mut emptied = Vec::new();
        for (dependency, dependants) in self.dependants.iter_mut() {
            dependants.remove(name);
            if dependants.is_empty() {
                emptied.push(dependency.clone());
            }
        }
        for dependency in emptied {
            self.dependants.remove(&dependency);
        }

        self.dirty = true;
        Ok(())
    }

    /// Atomically unload `outgoing` and load `incoming`: on any failure the
    /// environment and the recorder are left in their pre-call state.
    pub fn swap_module(
        &mut self,
        db: &mut ModuleDatabase,
        shell: &mut ShellState,
        outgoing: &str,
        incoming: &str,
    ) -> Result<(), SwapError> {
        let loaded = self.loaded.clone();
        let dependants = self.dependants.clone();
        let dirty = self.dirty;

        shell.push();
        let attempt = self
            .unload_module_by_name(db, shell, outgoing)
            .map_err(SwapError::from)
            .and_then(|()| {
                self.load_module_by_name(db, shell, incoming, false)
                    .map_err(SwapError::from)
            });

        match attempt {
            Ok(()) => {
                shell.commit();
                Ok(())
            }
            Err(err) => {
                shell.pop();
                self.loaded = loaded;
                self.dependants = dependants;
                self.dirty = dirty;
                Err(err)
            }
        }
    }

    /// Stop accepting commands and, if anything changed, write the new
    /// persisted state back out through the shell recorder: clear the old
    /// slots, then fill `PYENV_DATA_0..N` with the fresh chunks.
    pub fn shutdown(&mut self, shell: &mut ShellState) -> Result<()> {
        debug_assert!(self.ready);

        if self.dirty {
            for index in 0..self.cleanup_range {
                shell
                    .remove_env(&state::slot_name(index))
                    .context("unable to clear prior environment data")?;
            }

            let persisted = PersistedState {
                loaded: self.loaded.clone(),
                dependants: self.dependants.clone(),
            };
            let encoded = persisted
                .encode()
                .context("unable to serialise environment data")?;
            for (index, chunk) in state::chunk(&encoded, DEFAULT_CHUNK_SIZE).iter().enumerate() {
                shell
                    .add_env(&state::slot_name(index), chunk)
                    .context("unable to record environment data")?;
            }
        }

        self.ready = false;
        Ok(())
    }
}
