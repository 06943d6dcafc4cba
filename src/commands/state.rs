use super::Workspace;
use crate::Context;
use crate::cli::StateCommand;
use crate::provider::Provider;
use crate::ui;
use anyhow::{Result, bail};

pub fn run(ctx: &Context, cmd: StateCommand) -> Result<()> {
    let ws = Workspace::load_optional(ctx)?;
    match cmd {
        StateCommand::List => list(&ws),
        StateCommand::Show { address } => show(&ws, &address),
    }
}

fn list(ws: &Workspace) -> Result<()> {
    let addresses = ws.state.addresses();
    if addresses.is_empty() {
        ui::info("No resources recorded");
        return Ok(());
    }
    for address in addresses {
        println!("{address}");
    }
    Ok(())
}

fn show(ws: &Workspace, address: &str) -> Result<()> {
    let type_name = address.split_once('.').map_or(address, |(t, _)| t);
    if !Provider::new().has_resource(type_name) {
        bail!("Unknown resource type '{type_name}' in address '{address}'");
    }

    match ws.state.show(address)? {
        Some(rendered) => {
            ui::header(address);
            print!("{rendered}");
            Ok(())
        }
        None => bail!("No recorded instance at '{address}'"),
    }
}
