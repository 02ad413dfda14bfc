//! Page side of Ontap: the command palette controller, its persisted thread
//! and the listener that answers relay messages addressed to the page.

pub mod api;
pub mod mount;
pub mod panel;
pub mod session;
pub mod storage;
pub mod thread;

pub use api::{run_command, PanelError};
pub use mount::{mount_listener, ContentScriptInjector, PanelListener};
pub use panel::{KeyChord, Panel, PanelSettings, SubmitOutcome, Visibility};
pub use session::SessionContext;
pub use storage::{FileStorage, InMemoryStorage, Storage, StorageError, StorageRef};
pub use thread::{load_thread, save_thread, ThreadLoadError};
