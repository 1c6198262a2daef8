//! Procedure names answered by every provider.
//!
//! Arguments travel as a JSON array in declaration order; each lifecycle reply is
//! a serialized [`RequestResult`](crate::RequestResult).

/// `(token, type, config) -> RequestResult<CacheId>`
pub const CREATE_CACHE: &str = "cachet_create_cache";
/// `(token, type, config) -> RequestResult<CacheId>`
pub const OPEN_CACHE: &str = "cachet_open_cache";
/// `(token, id) -> RequestResult<bool>`
pub const CLOSE_CACHE: &str = "cachet_close_cache";
/// `(token, id) -> RequestResult<bool>`
pub const DESTROY_CACHE: &str = "cachet_destroy_cache";
/// `(id) -> RequestResult<bool>`
pub const CHECK_CACHE: &str = "cachet_check_cache";
/// `(id)`, one-way.
pub const SAY_HELLO: &str = "cachet_say_hello";
/// `(id, x, y) -> RequestResult<i32>`
pub const COMPUTE_SUM: &str = "cachet_compute_sum";

pub const PROVIDER_PROCEDURES: [&str; 7] = [
    CREATE_CACHE,
    OPEN_CACHE,
    CLOSE_CACHE,
    DESTROY_CACHE,
    CHECK_CACHE,
    SAY_HELLO,
    COMPUTE_SUM,
];
