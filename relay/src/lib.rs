//! Privileged side of the Ontap relay.
//!
//! Pages never touch the network themselves. They post a [`RelayMessage`]
//! through a [`RelayClient`] and the background context answers exactly once
//! with a [`RelayResult`]. The same channel type carries messages the other
//! way, e.g. `TOGGLE_PALETTE` from the background into a page.

pub mod background;
pub mod channel;
pub mod fetch;
pub mod toggle;

pub use background::{spawn_background, BackgroundRelay};
pub use channel::{channel, serve, Envelope, RelayClient, RelayHandler, RelayReceiver, Responder};
pub use fetch::FetchProxy;
pub use ontap_ipc::{FetchRequest, RelayMessage, RelayResult};
pub use toggle::{
    handle_toggle, InjectError, PanelInjector, TabError, TabHost, TabId, TabRegistry,
    ToggleError, ToggleOutcome,
};
