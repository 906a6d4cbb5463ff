pub mod comment;
pub mod completions;
pub mod volumes;
pub mod xattr;
