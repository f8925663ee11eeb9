pub(crate) mod attempts;
pub(crate) mod certificates;
pub(crate) mod courses;
pub(crate) mod enrollments;
pub(crate) mod users;
