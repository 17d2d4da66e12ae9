pub mod catalog;
pub mod prompt;
pub mod realtime;
pub mod session;

// Re-export commonly used types for convenience
pub use catalog::{Catalog, CatalogError, InMemoryCatalog, Plan, Recipe, RecipeContent};

pub use realtime::{
    RealtimeError, RealtimeProvider, RealtimeResult, UpstreamConnection, UpstreamConnector,
    create_connector, get_supported_realtime_providers,
};

pub use session::{
    ChatRequest, ChatResponse, ChatSession, ClientSink, ClientSource, RequestContext, SeedRequest,
    SeedResolver, SessionError, SessionHandle, SessionPhase, SessionServices,
};
