//! Page renderers.
//!
//! | Renderer | Runs scripts | Use for |
//! |----------|--------------|---------|
//! | [`ChromeRenderer`] | yes | client-side MathJax/KaTeX pages |
//! | [`StaticRenderer`] | no | server-rendered pages, saved snapshots |

pub mod cdp;
pub mod chrome;
pub mod locate;
pub mod snapshot;

pub use chrome::{ChromeOptions, ChromeRenderer};
pub use locate::locate_chrome;
pub use snapshot::{StaticPage, StaticRenderer};
