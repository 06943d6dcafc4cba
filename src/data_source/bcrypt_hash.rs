//! bcrypt hash data source
//!
//! bcrypt salts every hash, so hashing the same plaintext twice gives two
//! different strings. The hash recorded for an id is handed back in as
//! `prior` and reused, which keeps the output stable across runs.

use anyhow::{Context, Result, bail};
use declarative::{ApplyContext, DataSource, Outcome};
use serde::Serialize;

pub const DEFAULT_COST: u32 = 10;
pub const MIN_COST: u32 = 4;
pub const MAX_COST: u32 = 31;

#[derive(Debug, Clone, Default)]
pub struct BcryptHashArgs {
    pub plaintext: String,
    pub cost: Option<u32>,
    /// Hash recorded for the same id on an earlier run
    pub prior: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BcryptHashOutput {
    /// `<plaintext>:<cost>`
    pub id: String,
    pub cost: u32,
    pub hash: String,
}

/// Id under which a hash is recorded
pub fn hash_id(plaintext: &str, cost: u32) -> String {
    format!("{plaintext}:{cost}")
}

pub struct BcryptHash;

impl DataSource for BcryptHash {
    type Args = BcryptHashArgs;
    type Output = BcryptHashOutput;

    fn type_name(&self) -> &'static str {
        crate::provider::BCRYPT_HASH
    }

    fn read(&self, _ctx: &ApplyContext, args: BcryptHashArgs) -> Result<Outcome<BcryptHashOutput>> {
        let cost = args.cost.unwrap_or(DEFAULT_COST);
        if !(MIN_COST..=MAX_COST).contains(&cost) {
            bail!("Invalid Cost Parameter: cost must be between {MIN_COST} and {MAX_COST}, got {cost}");
        }

        let id = hash_id(&args.plaintext, cost);

        let hash = match args.prior.filter(|h| !h.is_empty()) {
            Some(prior) => {
                log::debug!("Reusing recorded bcrypt hash");
                prior
            }
            None => bcrypt::hash(&args.plaintext, cost).context("Bcrypt Hash Generation Failed")?,
        };

        Ok(Outcome::ok(BcryptHashOutput { id, cost, hash }))
    }
}
