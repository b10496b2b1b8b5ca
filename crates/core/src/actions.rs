//! Action dispatch: construct the collaborators, run the selected action,
//! then flush the recorder.
//!
//! Per-module failures are printed to stderr and isolated from the rest of
//! the invocation; only CLI parse failures change the exit code.

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;

use crate::cli::{Action, AvailArgs, Cli, LoadArgs, UnloadArgs};
use crate::db::ModuleDatabase;
use crate::environment::Environment;
use crate::shell::ShellState;

/// Parse the process arguments and run. Returns the process exit code.
pub fn run() -> Result<i32> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Everything clap renders goes to stderr: stdout is reserved
            // for the command script the parent shell evaluates.
            eprint!("{}", err.render());
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            return Ok(code);
        }
    };
    run_with_cli(cli)
}

/// Run against the ambient process environment.
pub fn run_with_cli(cli: Cli) -> Result<i32> {
    let mut shell = ShellState::capture(cli.shell.into());
    let mut db = ModuleDatabase::from_env();
    let mut env = Environment::from_process_env();

    dispatch(&cli.action, &mut env, &mut shell, &mut db)?;

    if !cli.dry_run {
        env.shutdown(&mut shell)?;
    }

    let script = shell.dump_state(cli.raw_msg_dump);
    if cli.dry_run {
        for line in &script {
            eprintln!("{}", line);
        }
    } else {
        for line in &script {
            println!("{}", line);
        }
        if cli.dump {
            for line in &script {
                eprintln!("{}", line);
            }
        }
    }

    Ok(0)
}

/// Run one action against explicit collaborators.
pub fn dispatch(
    action: &Action,
    env: &mut Environment,
    shell: &mut ShellState,
    db: &mut ModuleDatabase,
) -> Result<()> {
    match action {
        Action::Load(args) => load(args, env, shell, db),
        Action::Unload(args) => unload(args, env, shell, db),
        Action::Loaded => loaded(env, shell),
        Action::Avail(args) => avail(args, shell, db),
    }
}

fn load(
    args: &LoadArgs,
    env: &mut Environment,
    shell: &mut ShellState,
    db: &mut ModuleDatabase,
) -> Result<()> {
    for module in &args.modules {
        let name = format!("{}{}", args.prefix, module);
        shell.push();
        match env.load_module_by_name(db, shell, &name, args.force) {
            Ok(()) => shell.commit(),
            Err(err) => {
                eprintln!("{}", err);
                shell.pop();
            }
        }
    }
    Ok(())
}

/// Batch unload by rounds: each round unloads every requested module that is
/// currently unblocked; when a round would unload nothing, one final pass
/// attempts the stragglers unconditionally so each reports its error.
fn unload(
    args: &UnloadArgs,
    env: &mut Environment,
    shell: &mut ShellState,
    db: &mut ModuleDatabase,
) -> Result<()> {
    let mut remaining: Vec<String> = Vec::new();
    for module in &args.modules {
        let name = format!("{}{}", args.prefix, module);
        if !remaining.contains(&name) {
            remaining.push(name);
        }
    }

    loop {
        let round: Vec<String> = remaining
            .iter()
            .filter(|name| env.okay_to_unload(name))
            .cloned()
            .collect();
        if round.is_empty() {
            break;
        }
        for name in &round {
            attempt_unload(env, shell, db, name);
            remaining.retain(|candidate| candidate != name);
        }
    }

    for name in &remaining {
        attempt_unload(env, shell, db, name);
    }
    Ok(())
}

fn attempt_unload(
    env: &mut Environment,
    shell: &mut ShellState,
    db: &mut ModuleDatabase,
    name: &str,
) {
    shell.push();
    match env.unload_module_by_name(db, shell, name) {
        Ok(()) => shell.commit(),
        Err(err) => {
            eprintln!("{}", err);
            shell.pop();
        }
    }
}

fn loaded(env: &Environment, shell: &mut ShellState) -> Result<()> {
    // BTreeSet iteration is already ascending.
    for module in env.loaded_modules() {
        shell.write(module)?;
    }
    Ok(())
}

fn avail(args: &AvailArgs, shell: &mut ShellState, db: &mut ModuleDatabase) -> Result<()> {
    let names = db.get_all_modules(args.check);
    if !names.is_empty() {
        shell.write(&names.join("\n"))?;
    }
    Ok(())
}
