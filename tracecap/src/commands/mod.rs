pub mod capture;
pub mod decode;
pub mod filter;
pub mod info;
pub mod link;
