//! API tests
//!
//! - evaluate: fixed-file evaluation service
//! - upload: multipart upload service
