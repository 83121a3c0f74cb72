//! The three pagegist execution contexts as actors, plus the result cache.
//!
//! - [`page::PageActor`]: the page context; answers `getHTML`
//! - [`relay::RelayActor`]: the privileged relay; answers `fetchHTML`
//! - [`surface::SurfaceActor`]: the control surface that orchestrates both
//!
//! They share nothing but messages. The cache is owned by the surface.
pub mod actor;
pub mod builder;
pub mod cache;
pub mod page;
pub mod relay;
pub mod surface;
pub mod system;

pub use cache::{MemoryCache, ResultCache, SqliteCache};
pub use page::{FetchPages, MarkupSource, PageActor, PageMsg, StaticPages};
pub use relay::{RelayActor, RelayMsg};
pub use surface::{
    run_operation, OperationView, RenderSink, SurfaceActor, SurfaceMsg, SurfaceView,
};
