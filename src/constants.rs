// src/constants.rs
//! Domain constants that define the operational boundaries of the client.

// ---------------------------------------------------------------------------
// Lark API boundaries
// ---------------------------------------------------------------------------

/// Base URL of the open platform when no host is configured.
pub const DEFAULT_API_HOST: &str = "https://open.feishu.cn/open-apis/";

/// How many items a stream asks for per page.
///
/// Set by the engine, never by callers, so deep pagination costs the
/// fewest round-trips the platform allows.
pub const STREAM_PAGE_SIZE: usize = 500;

/// Page size of a collection's bounded "one page" calls when none is given.
pub const DEFAULT_COLLECTION_PAGE_SIZE: usize = 10;

/// Path of the tenant access token issuer, relative to the host.
pub const TENANT_TOKEN_PATH: &str = "auth/v3/tenant_access_token/internal";

// ---------------------------------------------------------------------------
// Transport retries
// ---------------------------------------------------------------------------

/// Attempts made for one request when the transport itself fails.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// First backoff delay in milliseconds; doubled per attempt.
pub const RETRY_INITIAL_DELAY_MS: u64 = 200;

/// Backoff ceiling in milliseconds.
pub const RETRY_MAX_DELAY_MS: u64 = 5_000;

// ---------------------------------------------------------------------------
// Document resolution
// ---------------------------------------------------------------------------

/// Blocks whose references are resolved at the same time.
///
/// Output order does not depend on this; it only bounds how many
/// secondary lookups are in flight during one resolve.
pub const RESOLVE_CONCURRENCY: usize = 8;

/// Iframe component type written when a file block is turned into an embed.
pub const IFRAME_COMPONENT_UNDEFINED: u8 = 7;

/// Tenant host used in generated document links when none is configured.
pub const DEFAULT_DOMAIN: &str = "www.feishu.cn";
