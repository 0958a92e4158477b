//! `dockyard list` and `dockyard show`.

use anyhow::Result;

use dockyard_tasks::TaskRegistry;

use crate::GlobalArgs;

pub fn list() -> Result<()> {
    let registry = TaskRegistry::builtin();
    for (namespace, tasks) in registry.by_namespace() {
        println!("{}:", namespace.unwrap_or("root"));
        for task in tasks {
            println!("  {:<24} {}", task.id.to_string(), task.summary);
        }
    }
    Ok(())
}

pub fn show(global: &GlobalArgs, name: &str) -> Result<()> {
    let registry = TaskRegistry::builtin();
    let task = registry.resolve(name)?;
    let settings = super::load_settings(global)?;

    println!("{}: {}", task.id, task.summary);
    for line in task.pipeline(&settings).describe(&settings.env_overlay()) {
        println!("  {}", line);
    }
    Ok(())
}
