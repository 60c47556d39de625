//! Pure profile rules: weather code mapping, literal fallbacks and the
//! templated blurb. Nothing in here performs I/O.

pub mod fallback;
pub mod weather;
