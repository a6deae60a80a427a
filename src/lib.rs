pub use tern_core::*;

pub mod archive {
    pub use tern_archive::*;
}

pub mod digest {
    pub use tern_digest::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use tern_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use tern_client::*;
}

pub mod prelude {
    pub use tern_core::prelude::*;
    pub use tern_digest::DigestCache;

    #[cfg(feature = "server")]
    pub use tern_server::prelude::*;

    #[cfg(feature = "client")]
    pub use tern_client::{LogNotifier, SyncClient, TernClient};
}
