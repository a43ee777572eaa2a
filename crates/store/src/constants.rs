//! File naming used by the store.

/// Extension of every stored template and document payload.
pub const JSON_EXTENSION: &str = "json";

/// Prefix of documents written by a print request.
pub const PRINT_PREFIX: &str = "print";

/// Suffix after the role in a stored signature's file name.
pub const SIGNATURE_SUFFIX: &str = "_signature";

/// Timestamp shown next to search hits.
pub const SEARCH_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// `created` timestamps are written with microseconds.
pub const CREATED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Prefix of the URL a document search hit points at.
pub const DOWNLOAD_PATH_PREFIX: &str = "/api/download/";
