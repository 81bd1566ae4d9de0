mod middleware;
mod public;

pub use middleware::{GuestSessions, RequestContext, RequestLocale, SessionResolver};
pub use public::{HttpState, build_router};
