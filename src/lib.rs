pub mod caps;
pub mod config;
pub mod crypto;
pub mod desc;
pub mod device;
pub mod error;
pub mod ffi;
pub mod flow;
pub mod inl_dev;
pub mod ipsec;
pub mod logger;
pub mod native;
pub mod nix;
pub mod roc;
pub mod vnet;
