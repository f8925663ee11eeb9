pub(crate) mod attempts;
pub(crate) mod certificates;
pub(crate) mod errors;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod router;
