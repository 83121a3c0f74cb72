//! Remote summarization service integration for pagegist.
//!
//! [`traits::RemoteClient`] is the seam the orchestrator depends on;
//! [`service::ServiceClient`] implements it over HTTP against the
//! `/summarize` and `/crawl` endpoints.
//!
//! # Examples
//! ```no_run
//! use gist_common::{MarkupPayload, PageAddress, Result};
//! use gist_remote::{RemoteClient, ServiceClient};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let client = ServiceClient::new("http://127.0.0.1:5000")?;
//! let summary = client
//!     .summarize(
//!         &MarkupPayload::new("<html>hi</html>"),
//!         &PageAddress::from("https://x.test/a"),
//!     )
//!     .await?;
//! println!("{}", summary.summary);
//! # Ok(())
//! # }
//! ```
pub mod service;
pub mod traits;

pub use service::ServiceClient;
pub use traits::RemoteClient;
