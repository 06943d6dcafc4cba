use super::{Workspace, emit};
use crate::Context;
use crate::cli::DataCommand;
use crate::data_source::{BcryptHash, BcryptHashArgs, LocalDirectoryData, bcrypt_hash};
use crate::ownership;
use crate::paths;
use anyhow::Result;
use declarative::{ApplyContext, DataSource};

pub fn run(ctx: &Context, cmd: DataCommand) -> Result<()> {
    let apply_ctx = ApplyContext::default().with_cancel(ctx.cancel_token());
    match cmd {
        DataCommand::LocalDirectory { path } => {
            let data = LocalDirectoryData::new(ownership::detect());
            let path = paths::expand(&path.to_string_lossy());
            let outcome = data.read(&apply_ctx, path)?;
            emit(data.type_name(), &outcome)
        }
        DataCommand::BcryptHash { plaintext, cost } => {
            let mut ws = Workspace::load_optional(ctx)?;
            read_bcrypt(&apply_ctx, &mut ws, plaintext, cost)
        }
    }
}

/// Hash `plaintext`, reusing and recording the hash kept in state
fn read_bcrypt(
    apply_ctx: &ApplyContext,
    ws: &mut Workspace,
    plaintext: String,
    cost: Option<u32>,
) -> Result<()> {
    let id = bcrypt_hash::hash_id(&plaintext, cost.unwrap_or(bcrypt_hash::DEFAULT_COST));
    let prior = ws.state.bcrypt_hash.get(&id).cloned();

    let outcome = BcryptHash.read(
        apply_ctx,
        BcryptHashArgs {
            plaintext,
            cost,
            prior,
        },
    )?;

    let recorded = ws.state.bcrypt_hash.get(&outcome.value.id);
    if recorded != Some(&outcome.value.hash) {
        ws.state
            .bcrypt_hash
            .insert(outcome.value.id.clone(), outcome.value.hash.clone());
        ws.save_state()?;
    }

    emit(BcryptHash.type_name(), &outcome)
}
