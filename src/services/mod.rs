pub(crate) mod attempts;
pub(crate) mod certificates;
pub(crate) mod grading;
pub(crate) mod notifications;
