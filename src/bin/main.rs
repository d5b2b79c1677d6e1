use anyhow::Context;
use bitcoin::{address::NetworkUnchecked, Address};
use bitcoincore_rpc::Auth;
use clap::Parser;
use spkindex::{
    config::{Command, Options},
    prelude::*,
};

fn rpc_auth(options: &Options) -> Auth {
    match (&options.cookie_file, &options.rpc_user, &options.rpc_pass) {
        (Some(cookie), _, _) => Auth::CookieFile(cookie.clone()),
        (None, Some(user), Some(pass)) => Auth::UserPass(user.clone(), pass.clone()),
        _ => Auth::None,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = Options::parse();
    // An unusable store is the one fatal startup condition.
    let store = SqliteStore::new(&options.db)?;

    match options.command.clone().unwrap_or(Command::Sync) {
        Command::Sync => {
            let source = BitcoindRpc::new(&options.rpc_url, rpc_auth(&options))?;
            Indexer::new(store, source)
                .with_pacing(Pacing::default())
                .run()
                .await
        }
        Command::Lookup { address: raw } => {
            let address = raw
                .parse::<Address<NetworkUnchecked>>()
                .with_context(|| format!("Address was invalid: {raw}"))?
                .require_network(options.chain)
                .with_context(|| format!("Address is not valid on {}: {raw}", options.chain))?;
            let key = OutputKey::from_address(&address);
            log::debug!("{address} -> output key {key}");
            for txid in store.lookup(key).await? {
                println!("{txid}");
            }
            Ok(())
        }
    }
}
