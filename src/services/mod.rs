pub(crate) mod flow_descriptor;
pub(crate) mod grading;
pub(crate) mod page_types;
