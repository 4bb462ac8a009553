mod middleware;
mod public;

pub use middleware::RequestContext;
pub use public::{HttpState, PREVIEW_COOKIE, build_router};

const DATASTAR_REQUEST_HEADER: &str = "datastar-request";
