// CLI modules
mod args;
mod op;
mod ops;
mod process;
mod state;

use args::Args;
use clap::{Parser, Subcommand};
use op::Op;
use ops::{Daemon, Identity, Init, Ip, Peer, Room, SendFiles, Version};

command_enum! {
    (Init, Init),
    (Identity, Identity),
    (Peer, Peer),
    (Daemon, Daemon),
    (Send, SendFiles),
    (Room, Room),
    (Ip, Ip),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let ctx = op::OpContext::new(args.config_path, args.user, args.passphrase);

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
