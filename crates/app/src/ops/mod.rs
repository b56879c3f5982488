pub mod daemon;
pub mod identity;
pub mod init;
pub mod ip;
pub mod peer;
pub mod room;
pub mod send;
pub mod version;

pub use daemon::Daemon;
pub use identity::Identity;
pub use init::Init;
pub use ip::Ip;
pub use peer::Peer;
pub use room::Room;
pub use send::SendFiles;
pub use version::Version;
