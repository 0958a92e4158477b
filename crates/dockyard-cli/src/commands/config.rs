//! `dockyard config`.

use anyhow::Result;

use crate::GlobalArgs;

pub fn show(global: &GlobalArgs) -> Result<()> {
    let settings = super::load_settings(global)?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
