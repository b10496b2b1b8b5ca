use anyhow::Result;

fn main() -> Result<()> {
    // Diagnostics are gated behind RUST_LOG; stdout stays reserved for the
    // command script the parent shell evaluates.
    let _ = env_logger::try_init();
    std::process::exit(pyenv_core::run()?)
}
