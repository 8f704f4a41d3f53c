//! Where unfollow candidates come from.
//!
//! Both sources are lazy cursors bounded by a maximum number of items. Fetch
//! failures end a sequence rather than propagating; only a closed session is
//! reported as an error.

pub mod api;
pub mod ui_list;

pub use api::ApiCursor;
pub use ui_list::{ListRow, UiListCursor, open_following_list, probe_list};

/// Extra items a cursor may produce beyond the removal budget, covering
/// candidates that get skipped or fail.
pub const ATTEMPT_HEADROOM: usize = 20;
