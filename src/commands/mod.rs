pub mod evaluate;
pub mod extract_captions;
pub mod status;
