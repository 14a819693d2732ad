//! Services shared by the cutout pipeline
//!
//! - `i18n`: translation of user-visible strings
//! - `io`: bitmap loading and the runtime buffer to image resource bridge
//! - `notify`: user-facing notifications

pub mod i18n;
pub mod io;
pub mod notify;

pub use i18n::{FallbackLocalizer, Localizer};
pub use io::{BitmapLoader, UrlBitmapLoader};
pub use notify::{Notices, Notifier, NoOpNotifier, RecordingNotifier, TracingNotifier};
