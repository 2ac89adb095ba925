//! Browser automation for UI-probe
//!
//! The engine drives pages through the [`Driver`] trait.
//!
//! - [`BrowserSession`]: headless Chrome over the DevTools protocol
//! - [`MockDriver`]: in-memory page for tests, built with [`PageBuilder`]
//!
//! # Example
//!
//! ```no_run
//! use probe_browser::{analyze_ui, BrowserSession, Driver};
//! use probe_core::config::BrowserSettings;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = BrowserSession::launch(&BrowserSettings::default()).await?;
//!     session.navigate("https://example.com/login").await?;
//!
//!     let analysis = analyze_ui(&session).await?;
//!     println!("{} forms, {} buttons", analysis.forms.len(), analysis.buttons.len());
//!     Ok(())
//! }
//! ```
//!
//! # Requirements
//!
//! - Chrome or Chromium installed for [`BrowserSession::launch`]
//! - For attaching to a running browser: `chrome --remote-debugging-port=9222`

mod driver;
mod fixture;
mod mock;
pub mod screenshot;
pub mod scripts;
pub mod selector;
mod session;
mod verification;

pub use driver::{decode_script_value, Driver};
pub use fixture::PageBuilder;
pub use mock::{DriverCall, MockDriver, MockFailure};
pub use scripts::{ElementAction, RescueScope};
pub use session::BrowserSession;
pub use verification::{
    analyze_ui, check_text, verify_page, ElementSummary, PageVerification, UiAnalysis,
};
