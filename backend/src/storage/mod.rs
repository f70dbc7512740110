pub mod artifact_namer;
pub mod local_store;
