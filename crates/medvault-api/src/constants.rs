//! HTTP-level constants

/// Restricts a submission to a single slot.
pub const TARGET_SLOT_HEADER: &str = "x-target-slot";

/// `true` confirms that an occupied slot may be replaced.
pub const OVERWRITE_CONFIRMED_HEADER: &str = "x-overwrite-confirmed";

/// Notification that prompted the submission; archived with the write.
pub const SOURCE_NOTIFICATION_HEADER: &str = "x-source-notification";

/// Room for the JSON envelope around the encoded documents of one submission.
pub const REQUEST_BODY_FRAMING_BYTES: usize = 1024 * 1024;

/// Hard ceiling on a request body, whatever the provider accepts per file.
pub const MAX_REQUEST_BODY_BYTES: usize = 700 * 1024 * 1024;
